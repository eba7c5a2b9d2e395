use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::error;

use super::NetworkTopology;
use crate::domain::{NetworkConfig, ProsumerId, TransformerConfig, VoltageBand};

// Phase 1 pilot feeders. Sensitivities come from field measurement
// campaigns, not from a power-flow study.
static PROOF_OF_CONCEPT: Lazy<Arc<NetworkTopology>> = Lazy::new(|| {
    let topology = build_proof_of_concept().unwrap_or_else(|e| {
        error!(error = %e, "built-in topology is inconsistent, serving an empty table");
        NetworkTopology::default()
    });
    Arc::new(topology)
});

fn build_proof_of_concept() -> Result<NetworkTopology, String> {
    let transformers = vec![
        TransformerConfig {
            transformer_id: "TX-001".to_string(),
            capacity_kw: 250.0,
        },
        TransformerConfig {
            transformer_id: "TX-002".to_string(),
            capacity_kw: 500.0,
        },
    ];

    let prosumers = vec![
        connection("PRS-001", 0.02, 100.0, "TX-001", "FDR-01"),
        connection("PRS-002", 0.35, 15.0, "TX-001", "FDR-01"),
        connection("PRS-003", 0.50, 15.0, "TX-001", "FDR-02"),
        connection("PRS-004", 0.015, 60.0, "TX-002", "FDR-03"),
        connection("PRS-005", 0.01, 400.0, "TX-002", "FDR-03"),
    ];

    NetworkTopology::new(prosumers, transformers)
}

fn connection(
    id: &str,
    sensitivity: f64,
    thermal_kw: f64,
    transformer: &str,
    feeder: &str,
) -> NetworkConfig {
    NetworkConfig {
        prosumer_id: ProsumerId::from(id),
        nominal_voltage_v: 230.0,
        voltage_sensitivity: sensitivity,
        thermal_capacity_kw: Some(thermal_kw),
        transformer_id: transformer.to_string(),
        feeder_id: Some(feeder.to_string()),
        voltage_band: VoltageBand::default(),
    }
}

/// Shared snapshot of the proof-of-concept connection points.
pub fn proof_of_concept_topology() -> Arc<NetworkTopology> {
    Arc::clone(&PROOF_OF_CONCEPT)
}
