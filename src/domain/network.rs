use serde::{Deserialize, Serialize};

use super::ProsumerId;

/// Statutory voltage band used when neither the connection nor the caller
/// supplies one (per-unit of nominal).
pub const DEFAULT_VOLTAGE_MIN_PU: f64 = 0.95;
pub const DEFAULT_VOLTAGE_MAX_PU: f64 = 1.05;

/// Allowed voltage range at a point of connection, in per-unit of nominal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageBand {
    pub min_pu: f64,
    pub max_pu: f64,
}

impl Default for VoltageBand {
    fn default() -> Self {
        Self {
            min_pu: DEFAULT_VOLTAGE_MIN_PU,
            max_pu: DEFAULT_VOLTAGE_MAX_PU,
        }
    }
}

impl VoltageBand {
    pub fn new(min_pu: f64, max_pu: f64) -> Self {
        Self { min_pu, max_pu }
    }

    pub fn width(&self) -> f64 {
        self.max_pu - self.min_pu
    }

    pub fn contains(&self, voltage_pu: f64) -> bool {
        voltage_pu >= self.min_pu && voltage_pu <= self.max_pu
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.min_pu.is_finite() || !self.max_pu.is_finite() {
            return Err(format!(
                "voltage band is not finite: [{}, {}]",
                self.min_pu, self.max_pu
            ));
        }
        if self.min_pu <= 0.0 {
            return Err(format!("voltage band minimum must be positive: {}", self.min_pu));
        }
        if self.min_pu >= self.max_pu {
            return Err(format!(
                "voltage band minimum {} must be below maximum {}",
                self.min_pu, self.max_pu
            ));
        }
        Ok(())
    }
}

/// Static network data for one prosumer's point of connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub prosumer_id: ProsumerId,

    /// Nominal voltage at the point of connection (V)
    pub nominal_voltage_v: f64,

    /// Voltage rise per unit of exported power (% of nominal per kW)
    pub voltage_sensitivity: f64,

    /// Thermal capacity of the service connection (kW). A missing value makes
    /// the connection unusable for envelope calculation.
    #[serde(default)]
    pub thermal_capacity_kw: Option<f64>,

    /// Upstream distribution transformer. Shared by many prosumers.
    pub transformer_id: String,

    #[serde(default)]
    pub feeder_id: Option<String>,

    #[serde(default)]
    pub voltage_band: VoltageBand,
}

impl NetworkConfig {
    /// Sanity checks applied before any envelope is derived from this config.
    pub fn validate(&self) -> Result<(), String> {
        if !self.voltage_sensitivity.is_finite() || self.voltage_sensitivity <= 0.0 {
            return Err(format!(
                "voltage_sensitivity must be positive, got {} for {}",
                self.voltage_sensitivity, self.prosumer_id
            ));
        }

        match self.thermal_capacity_kw {
            None => {
                return Err(format!("thermal_capacity_kw is missing for {}", self.prosumer_id));
            }
            Some(cap) if !cap.is_finite() || cap <= 0.0 => {
                return Err(format!(
                    "thermal_capacity_kw must be positive, got {} for {}",
                    cap, self.prosumer_id
                ));
            }
            Some(_) => {}
        }

        if !self.nominal_voltage_v.is_finite() || self.nominal_voltage_v <= 0.0 {
            return Err(format!(
                "nominal_voltage_v must be positive, got {} for {}",
                self.nominal_voltage_v, self.prosumer_id
            ));
        }

        if self.transformer_id.trim().is_empty() {
            return Err(format!("transformer_id is empty for {}", self.prosumer_id));
        }

        self.voltage_band
            .validate()
            .map_err(|e| format!("{} for {}", e, self.prosumer_id))
    }
}

/// Upstream distribution transformer shared by a group of connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    pub transformer_id: String,

    /// Rated capacity, treated as kW at unity power factor
    pub capacity_kw: f64,
}

impl TransformerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.capacity_kw.is_finite() || self.capacity_kw <= 0.0 {
            return Err(format!(
                "transformer {} capacity must be positive, got {}",
                self.transformer_id, self.capacity_kw
            ));
        }
        Ok(())
    }
}
