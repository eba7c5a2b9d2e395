use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    topology: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prosumers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    invalid_prosumers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(prosumers: usize, invalid: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            prosumers: Some(prosumers),
            invalid_prosumers: (invalid > 0).then_some(invalid),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            prosumers: None,
            invalid_prosumers: None,
            error: Some(error),
        }
    }
}

fn check_topology(state: &AppState) -> ComponentHealth {
    let snapshot = state.doe.topology().get_network_topology();
    if snapshot.is_empty() {
        return ComponentHealth::unhealthy("topology has no prosumers".to_string());
    }
    ComponentHealth::healthy(snapshot.len(), snapshot.invalid_prosumers().len())
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let topology_health = check_topology(&state);
    let all_healthy = topology_health.status == "healthy";

    let response = HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            topology: topology_health,
        },
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// GET /health/ready - Readiness probe
///
/// Ready once a non-empty topology is loaded
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.doe.topology().get_network_topology().is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// GET /health/live - Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_health_healthy() {
        let health = ComponentHealth::healthy(5, 0);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.prosumers, Some(5));
        assert!(health.invalid_prosumers.is_none());
        assert!(health.error.is_none());
    }

    #[test]
    fn test_component_health_unhealthy() {
        let health = ComponentHealth::unhealthy("empty".to_string());
        assert_eq!(health.status, "unhealthy");
        assert!(health.prosumers.is_none());
        assert_eq!(health.error, Some("empty".to_string()));
    }
}
