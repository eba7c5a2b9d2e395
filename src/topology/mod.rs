//! Network topology: the static table of connection points the envelope
//! calculation reads from.
//!
//! The table is loaded once at startup and shared as an immutable snapshot
//! behind [`TopologyProvider`], so calculation code never depends on where the
//! data came from.

pub mod builtin;
pub mod file;

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{TopologyConfig, TopologySource};
use crate::doe::DoeError;
use crate::domain::{NetworkConfig, ProsumerId, TransformerConfig};

/// Immutable snapshot of every known connection point and transformer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkTopology {
    prosumers: BTreeMap<ProsumerId, NetworkConfig>,
    transformers: BTreeMap<String, TransformerConfig>,
}

impl NetworkTopology {
    /// Build a snapshot, rejecting duplicate identifiers.
    pub fn new(
        prosumers: Vec<NetworkConfig>,
        transformers: Vec<TransformerConfig>,
    ) -> Result<Self, String> {
        let mut topology = Self::default();

        for tx in transformers {
            let id = tx.transformer_id.clone();
            if topology.transformers.insert(id.clone(), tx).is_some() {
                return Err(format!("duplicate transformer id: {id}"));
            }
        }

        for cfg in prosumers {
            let id = cfg.prosumer_id.clone();
            if topology.prosumers.insert(id.clone(), cfg).is_some() {
                return Err(format!("duplicate prosumer id: {id}"));
            }
        }

        Ok(topology)
    }

    pub fn get(&self, id: &ProsumerId) -> Option<&NetworkConfig> {
        self.prosumers.get(id)
    }

    pub fn transformer(&self, transformer_id: &str) -> Option<&TransformerConfig> {
        self.transformers.get(transformer_id)
    }

    /// Connection points ordered by id.
    pub fn prosumers(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.prosumers.values()
    }

    pub fn transformers(&self) -> impl Iterator<Item = &TransformerConfig> {
        self.transformers.values()
    }

    pub fn prosumers_on_transformer<'a>(
        &'a self,
        transformer_id: &'a str,
    ) -> impl Iterator<Item = &'a NetworkConfig> + 'a {
        self.prosumers
            .values()
            .filter(move |cfg| cfg.transformer_id == transformer_id)
    }

    pub fn len(&self) -> usize {
        self.prosumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prosumers.is_empty()
    }

    /// Identifiers whose config fails validation. They stay in the snapshot so
    /// that calculations against them report `InvalidConfig`.
    pub fn invalid_prosumers(&self) -> Vec<(ProsumerId, String)> {
        let mut invalid: Vec<(ProsumerId, String)> = self
            .prosumers
            .values()
            .filter_map(|cfg| cfg.validate().err().map(|e| (cfg.prosumer_id.clone(), e)))
            .collect();

        for cfg in self.prosumers.values() {
            if !self.transformers.is_empty() && self.transformer(&cfg.transformer_id).is_none() {
                invalid.push((
                    cfg.prosumer_id.clone(),
                    format!("unknown transformer {}", cfg.transformer_id),
                ));
            }
        }
        invalid
    }
}

/// Source of static network data for the envelope calculation.
#[cfg_attr(test, mockall::automock)]
pub trait TopologyProvider: Send + Sync {
    /// Config for one connection point; `NotFound` when the id is unknown.
    fn get_prosumer_config(&self, id: &ProsumerId) -> Result<NetworkConfig, DoeError>;

    /// The whole table, for callers that look up many ids at once.
    fn get_network_topology(&self) -> Arc<NetworkTopology>;
}

/// Provider over a snapshot fixed at construction time.
#[derive(Debug, Clone)]
pub struct StaticTopologyProvider {
    snapshot: Arc<NetworkTopology>,
}

impl StaticTopologyProvider {
    pub fn new(topology: NetworkTopology) -> Self {
        Self {
            snapshot: Arc::new(topology),
        }
    }

    /// Hard-coded proof-of-concept connection points.
    pub fn proof_of_concept() -> Self {
        Self {
            snapshot: builtin::proof_of_concept_topology(),
        }
    }
}

impl TopologyProvider for StaticTopologyProvider {
    fn get_prosumer_config(&self, id: &ProsumerId) -> Result<NetworkConfig, DoeError> {
        self.snapshot
            .get(id)
            .cloned()
            .ok_or_else(|| DoeError::NotFound(id.clone()))
    }

    fn get_network_topology(&self) -> Arc<NetworkTopology> {
        Arc::clone(&self.snapshot)
    }
}

/// Build the provider selected by configuration.
pub fn load_provider(cfg: &TopologyConfig) -> Result<Arc<dyn TopologyProvider>> {
    let provider = match &cfg.source {
        TopologySource::Builtin => StaticTopologyProvider::proof_of_concept(),
        TopologySource::File { path } => {
            StaticTopologyProvider::new(file::load_topology_file(path)?)
        }
    };

    let snapshot = provider.get_network_topology();
    for (id, reason) in snapshot.invalid_prosumers() {
        warn!(prosumer_id = %id, %reason, "topology entry fails validation");
    }
    info!(
        prosumers = snapshot.len(),
        transformers = snapshot.transformers().count(),
        "network topology loaded"
    );

    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VoltageBand;

    fn cfg(id: &str, tx: &str) -> NetworkConfig {
        NetworkConfig {
            prosumer_id: ProsumerId::from(id),
            nominal_voltage_v: 230.0,
            voltage_sensitivity: 0.1,
            thermal_capacity_kw: Some(10.0),
            transformer_id: tx.to_string(),
            feeder_id: None,
            voltage_band: VoltageBand::default(),
        }
    }

    fn tx(id: &str) -> TransformerConfig {
        TransformerConfig {
            transformer_id: id.to_string(),
            capacity_kw: 100.0,
        }
    }

    #[test]
    fn test_lookup_and_not_found() {
        let provider = StaticTopologyProvider::new(
            NetworkTopology::new(vec![cfg("A", "TX"), cfg("B", "TX")], vec![tx("TX")]).unwrap(),
        );
        assert_eq!(
            provider.get_prosumer_config(&"A".into()).unwrap().prosumer_id,
            ProsumerId::from("A")
        );
        assert_eq!(
            provider.get_prosumer_config(&"Z".into()),
            Err(DoeError::NotFound("Z".into()))
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        assert!(NetworkTopology::new(vec![cfg("A", "TX"), cfg("A", "TX")], vec![]).is_err());
        assert!(NetworkTopology::new(vec![], vec![tx("TX"), tx("TX")]).is_err());
    }

    #[test]
    fn test_shared_transformer_grouping() {
        let topo = NetworkTopology::new(
            vec![cfg("A", "TX1"), cfg("B", "TX1"), cfg("C", "TX2")],
            vec![tx("TX1"), tx("TX2")],
        )
        .unwrap();
        assert_eq!(topo.prosumers_on_transformer("TX1").count(), 2);
        assert_eq!(topo.prosumers_on_transformer("TX2").count(), 1);
    }

    #[test]
    fn test_invalid_entries_are_reported_not_dropped() {
        let mut bad = cfg("BAD", "TX");
        bad.voltage_sensitivity = -1.0;
        let orphan = cfg("ORPHAN", "TX-MISSING");
        let topo =
            NetworkTopology::new(vec![cfg("OK", "TX"), bad, orphan], vec![tx("TX")]).unwrap();

        let invalid = topo.invalid_prosumers();
        assert_eq!(invalid.len(), 2);
        assert_eq!(topo.len(), 3);
    }

    #[test]
    fn test_snapshot_is_shared() {
        let provider = StaticTopologyProvider::proof_of_concept();
        let a = provider.get_network_topology();
        let b = provider.get_network_topology();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
