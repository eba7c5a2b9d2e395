//! Dynamic Operating Envelope endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use tokio::task;
use serde::Deserialize;
use std::time::Instant;
use validator::{Validate, ValidationError};

use crate::{
    api::{error::ApiError, extract::ApiJson, response::ApiResponse},
    doe::{DoeBatchCalculateResponse, DoeBatchEntry, DoeCalculateResponse},
    domain::{NetworkConfig, ProsumerId, VoltageConstraints},
    state::AppState,
};

/// Request body for a single envelope calculation
#[derive(Debug, Deserialize, Validate)]
pub struct CalculateDoeRequest {
    #[validate(custom(function = "validate_prosumer_id"))]
    pub prosumer_id: ProsumerId,
    pub constraints: VoltageConstraints,
    /// Forecast export (kW) to evaluate instead of the measured flow
    #[serde(default)]
    pub forecast_power_kw: Option<f64>,
}

/// Request body for a batch calculation
#[derive(Debug, Deserialize, Validate)]
pub struct BatchCalculateDoeRequest {
    #[validate(length(min = 1))]
    pub entries: Vec<DoeBatchEntry>,
}

fn validate_prosumer_id(id: &ProsumerId) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::new("empty_prosumer_id"));
    }
    Ok(())
}

/// POST /api/v1/doe/calculate
pub async fn calculate_doe(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CalculateDoeRequest>,
) -> Result<Json<ApiResponse<DoeCalculateResponse>>, ApiError> {
    request.validate()?;

    let response = state.doe.calculate_doe_for_prosumer(
        &request.prosumer_id,
        &request.constraints,
        request.forecast_power_kw,
    )?;

    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/v1/doe/calculate/batch
pub async fn calculate_doe_batch(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BatchCalculateDoeRequest>,
) -> Result<Json<ApiResponse<DoeBatchCalculateResponse>>, ApiError> {
    request.validate()?;

    let max = state.cfg.doe.max_batch_size;
    if request.entries.len() > max {
        return Err(ApiError::BadRequest(format!(
            "batch of {} entries exceeds the maximum of {}",
            request.entries.len(),
            max
        )));
    }

    let start = Instant::now();
    let doe = state.doe.clone();
    let response = task::spawn_blocking(move || doe.calculate_doe_batch(&request.entries))
        .await
        .map_err(|e| ApiError::InternalError(format!("batch worker failed: {e}")))?;
    let duration_ms = start.elapsed().as_millis() as u64;

    tracing::debug!(
        batch_id = %response.batch_id,
        duration_ms,
        "batch request served"
    );

    let count = response.total;
    Ok(Json(
        ApiResponse::success(response)
            .with_count(count)
            .with_duration(duration_ms),
    ))
}

/// GET /api/v1/doe/prosumers
pub async fn list_prosumers(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<NetworkConfig>>> {
    let snapshot = state.doe.topology().get_network_topology();
    let prosumers: Vec<NetworkConfig> = snapshot.prosumers().cloned().collect();
    let count = prosumers.len();
    Json(ApiResponse::success(prosumers).with_count(count))
}

/// GET /api/v1/doe/prosumers/:id
pub async fn get_prosumer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<NetworkConfig>>, ApiError> {
    let config = state
        .doe
        .topology()
        .get_prosumer_config(&ProsumerId::new(id))?;
    Ok(Json(ApiResponse::success(config)))
}
