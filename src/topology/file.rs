use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::NetworkTopology;
use crate::domain::{NetworkConfig, TransformerConfig};

/// On-disk layout of a topology table.
///
/// ```toml
/// [[transformers]]
/// transformer_id = "TX-001"
/// capacity_kw = 250.0
///
/// [[prosumers]]
/// prosumer_id = "PRS-001"
/// nominal_voltage_v = 230.0
/// voltage_sensitivity = 0.02
/// thermal_capacity_kw = 100.0
/// transformer_id = "TX-001"
/// ```
#[derive(Debug, Deserialize)]
struct TopologyFile {
    #[serde(default)]
    transformers: Vec<TransformerConfig>,
    prosumers: Vec<NetworkConfig>,
}

pub fn parse_topology(contents: &str) -> Result<NetworkTopology> {
    let file: TopologyFile = toml::from_str(contents).context("parsing topology TOML")?;

    for tx in &file.transformers {
        tx.validate().map_err(anyhow::Error::msg)?;
    }

    NetworkTopology::new(file.prosumers, file.transformers).map_err(anyhow::Error::msg)
}

pub fn load_topology_file(path: impl AsRef<Path>) -> Result<NetworkTopology> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading topology file {}", path.display()))?;
    parse_topology(&contents).with_context(|| format!("loading topology file {}", path.display()))
}
