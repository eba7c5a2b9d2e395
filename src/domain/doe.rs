use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::VoltageBand;

/// Highest voltage reading accepted as physically meaningful (per-unit).
pub const MAX_PLAUSIBLE_VOLTAGE_PU: f64 = 2.0;

/// Envelope classification for one connection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DoeStatus {
    Normal,
    Constrained,
    Critical,
}

/// Physical constraint that bounds the envelope.
///
/// `Protection` is reserved for the full power-flow model and is not derived
/// by the sensitivity method. `Transformer` is only produced when the caller
/// supplies transformer aggregate loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LimitingFactor {
    Voltage,
    Thermal,
    Protection,
    Transformer,
    None,
}

/// Operating snapshot at the point of connection, supplied per calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageConstraints {
    /// Measured voltage (per-unit of nominal)
    pub current_voltage_pu: f64,

    /// Measured power flow (kW, positive = export)
    pub current_power_kw: f64,

    /// Lower voltage bound; falls back to the connection's band
    #[serde(default)]
    pub voltage_min_pu: Option<f64>,

    /// Upper voltage bound; falls back to the connection's band
    #[serde(default)]
    pub voltage_max_pu: Option<f64>,

    /// Aggregate net reverse flow through the upstream transformer (kW,
    /// positive = export towards the MV network)
    #[serde(default)]
    pub transformer_load_kw: Option<f64>,
}

impl VoltageConstraints {
    pub fn new(current_voltage_pu: f64, current_power_kw: f64) -> Self {
        Self {
            current_voltage_pu,
            current_power_kw,
            voltage_min_pu: None,
            voltage_max_pu: None,
            transformer_load_kw: None,
        }
    }

    pub fn with_band(mut self, min_pu: f64, max_pu: f64) -> Self {
        self.voltage_min_pu = Some(min_pu);
        self.voltage_max_pu = Some(max_pu);
        self
    }

    pub fn with_transformer_load(mut self, load_kw: f64) -> Self {
        self.transformer_load_kw = Some(load_kw);
        self
    }

    /// Effective limit band: caller-supplied bounds override the connection's.
    pub fn band(&self, fallback: VoltageBand) -> VoltageBand {
        VoltageBand {
            min_pu: self.voltage_min_pu.unwrap_or(fallback.min_pu),
            max_pu: self.voltage_max_pu.unwrap_or(fallback.max_pu),
        }
    }

    /// Rejects readings that cannot come from a working meter.
    pub fn validate(&self) -> Result<(), String> {
        if !self.current_voltage_pu.is_finite() {
            return Err(format!(
                "current_voltage_pu is not finite: {}",
                self.current_voltage_pu
            ));
        }
        if self.current_voltage_pu <= 0.0 {
            return Err(format!(
                "current_voltage_pu must be positive, got {}",
                self.current_voltage_pu
            ));
        }
        if self.current_voltage_pu > MAX_PLAUSIBLE_VOLTAGE_PU {
            return Err(format!(
                "current_voltage_pu {} exceeds plausible maximum {}",
                self.current_voltage_pu, MAX_PLAUSIBLE_VOLTAGE_PU
            ));
        }
        if !self.current_power_kw.is_finite() {
            return Err(format!("current_power_kw is not finite: {}", self.current_power_kw));
        }
        if let Some(load) = self.transformer_load_kw {
            if !load.is_finite() {
                return Err(format!("transformer_load_kw is not finite: {}", load));
            }
        }
        Ok(())
    }
}

/// Headroom fractions that fed the classification, per direction.
///
/// Voltage margins are fractions of the band width, thermal and transformer
/// margins are fractions of rated capacity. Zero means the limit is reached or
/// already violated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoeMargins {
    pub voltage_export: f64,
    pub voltage_import: f64,
    pub thermal_export: f64,
    pub thermal_import: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformer_export: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformer_import: Option<f64>,
}

/// Computed envelope for one prosumer at one operating point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoeLimit {
    /// Maximum export at the connection (kW)
    pub export_limit_kw: f64,

    /// Maximum import at the connection (kW, reported as a positive value)
    pub import_limit_kw: f64,

    pub status: DoeStatus,
    pub limiting_factor: LimitingFactor,

    /// Margin of the constraint that set `limiting_factor`; absent when no
    /// constraint binds
    pub binding_margin: Option<f64>,

    pub margins: DoeMargins,

    /// Predicted voltage when exporting at `export_limit_kw` (per-unit)
    pub voltage_at_export_limit_pu: f64,

    /// Predicted voltage when importing at `import_limit_kw` (per-unit)
    pub voltage_at_import_limit_pu: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_string_forms() {
        assert_eq!(DoeStatus::Critical.to_string(), "critical");
        assert_eq!(DoeStatus::from_str("constrained").unwrap(), DoeStatus::Constrained);
        assert_eq!(
            serde_json::to_string(&DoeStatus::Normal).unwrap(),
            "\"normal\""
        );
    }

    #[test]
    fn test_limiting_factor_string_forms() {
        assert_eq!(LimitingFactor::None.to_string(), "none");
        assert_eq!(
            LimitingFactor::from_str("transformer").unwrap(),
            LimitingFactor::Transformer
        );
        assert_eq!(
            serde_json::to_string(&LimitingFactor::Protection).unwrap(),
            "\"protection\""
        );
    }

    #[test]
    fn test_band_override() {
        let fallback = VoltageBand::new(0.94, 1.10);
        let c = VoltageConstraints::new(1.0, 0.0);
        assert_eq!(c.band(fallback), fallback);

        let c = VoltageConstraints {
            voltage_max_pu: Some(1.06),
            ..VoltageConstraints::new(1.0, 0.0)
        };
        assert_eq!(c.band(fallback), VoltageBand::new(0.94, 1.06));
    }

    #[test]
    fn test_validate_rejects_nonsense_readings() {
        assert!(VoltageConstraints::new(-1.0, 0.0).validate().is_err());
        assert!(VoltageConstraints::new(0.0, 0.0).validate().is_err());
        assert!(VoltageConstraints::new(2.5, 0.0).validate().is_err());
        assert!(VoltageConstraints::new(f64::NAN, 0.0).validate().is_err());
        assert!(VoltageConstraints::new(1.0, f64::INFINITY).validate().is_err());
        assert!(VoltageConstraints::new(1.0, 0.0)
            .with_transformer_load(f64::NAN)
            .validate()
            .is_err());
        assert!(VoltageConstraints::new(1.0, -5.0).validate().is_ok());
    }

    #[test]
    fn test_constraints_deserialize_with_defaults() {
        let c: VoltageConstraints =
            serde_json::from_str(r#"{"current_voltage_pu": 1.01, "current_power_kw": 3.5}"#)
                .unwrap();
        assert!(c.voltage_min_pu.is_none());
        assert!(c.transformer_load_kw.is_none());
    }
}
