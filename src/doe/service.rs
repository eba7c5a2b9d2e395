use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::batch::evaluate_batch;
use super::{
    DoeBatchCalculateResponse, DoeBatchEntry, DoeCalculator, DoeError, OperatingPoint,
};
use crate::domain::{DoeLimit, DoeStatus, ProsumerId, VoltageConstraints};
use crate::topology::TopologyProvider;

pub const DEFAULT_PARALLEL_BATCH_THRESHOLD: usize = 64;

/// Envelope for one prosumer, echoing the network context it was computed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoeCalculateResponse {
    pub prosumer_id: ProsumerId,
    pub transformer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeder_id: Option<String>,
    pub operating_point: OperatingPoint,
    pub doe: DoeLimit,
}

/// Entry points of the envelope core: topology lookup plus calculation.
pub struct DoeService {
    topology: Arc<dyn TopologyProvider>,
    calculator: DoeCalculator,
    parallel_threshold: usize,
}

impl DoeService {
    pub fn new(topology: Arc<dyn TopologyProvider>, calculator: DoeCalculator) -> Self {
        Self {
            topology,
            calculator,
            parallel_threshold: DEFAULT_PARALLEL_BATCH_THRESHOLD,
        }
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn topology(&self) -> &Arc<dyn TopologyProvider> {
        &self.topology
    }

    pub fn calculator(&self) -> &DoeCalculator {
        &self.calculator
    }

    /// Envelope for a single prosumer. Errors are returned as-is.
    pub fn calculate_doe_for_prosumer(
        &self,
        prosumer_id: &ProsumerId,
        constraints: &VoltageConstraints,
        forecast_power_kw: Option<f64>,
    ) -> Result<DoeCalculateResponse, DoeError> {
        let config = self.topology.get_prosumer_config(prosumer_id)?;
        let snapshot = self.topology.get_network_topology();
        let transformer = snapshot.transformer(&config.transformer_id);

        let (operating_point, doe) = self
            .calculator
            .calculate(&config, constraints, forecast_power_kw, transformer)
            .inspect_err(|e| debug!(%prosumer_id, error = %e, "doe calculation rejected"))?;

        if doe.status == DoeStatus::Critical {
            warn!(
                %prosumer_id,
                limiting_factor = %doe.limiting_factor,
                export_limit_kw = doe.export_limit_kw,
                import_limit_kw = doe.import_limit_kw,
                "critical operating envelope"
            );
        } else {
            debug!(
                %prosumer_id,
                status = %doe.status,
                limiting_factor = %doe.limiting_factor,
                export_limit_kw = doe.export_limit_kw,
                import_limit_kw = doe.import_limit_kw,
                "doe calculated"
            );
        }

        Ok(DoeCalculateResponse {
            prosumer_id: config.prosumer_id,
            transformer_id: config.transformer_id,
            feeder_id: config.feeder_id,
            operating_point,
            doe,
        })
    }

    /// Envelopes for many prosumers over one topology snapshot. Per-entry
    /// failures are reported inline; the batch itself never fails.
    pub fn calculate_doe_batch(&self, entries: &[DoeBatchEntry]) -> DoeBatchCalculateResponse {
        let snapshot = self.topology.get_network_topology();
        let results = evaluate_batch(
            &self.calculator,
            &snapshot,
            entries,
            self.parallel_threshold,
        );
        let response = DoeBatchCalculateResponse::from_results(results);

        info!(
            batch_id = %response.batch_id,
            total = response.total,
            succeeded = response.succeeded,
            failed = response.failed,
            critical = response.status_counts.critical,
            "doe batch calculated"
        );
        response
    }
}
