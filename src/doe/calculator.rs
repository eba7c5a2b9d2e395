//! Voltage-sensitivity envelope calculation.
//!
//! For each direction the envelope is the most restrictive of:
//! - the voltage envelope: power at which `v + s·ΔP/100` reaches the band edge
//! - the thermal envelope: the connection's thermal capacity
//! - the transformer envelope, when aggregate transformer loading is supplied
//!
//! A constraint binds when its envelope falls below the configured ceiling for
//! that direction, or when its margin is below the ample-headroom threshold.
//! The ceiling only caps the reported limit. Everything here is a pure
//! function of its arguments.

use serde::{Deserialize, Serialize};

use super::DoeError;
use crate::domain::{
    DoeLimit, DoeMargins, DoeStatus, LimitingFactor, NetworkConfig, TransformerConfig,
    VoltageBand, VoltageConstraints,
};

pub const DEFAULT_CRITICAL_MARGIN: f64 = 0.05;
pub const DEFAULT_AMPLE_MARGIN: f64 = 0.2;
pub const DEFAULT_MAX_EXPORT_KW: f64 = 200.0;
pub const DEFAULT_MAX_IMPORT_KW: f64 = 200.0;

/// Sensitivities are quoted in % of nominal per kW; voltages are per-unit.
const PERCENT_PER_PU: f64 = 100.0;

/// Classification thresholds and envelope ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoeThresholds {
    /// Binding margin below which the envelope is `critical`
    pub critical_margin: f64,
    /// Margin every constraint must clear for the envelope to be `normal`
    pub ample_margin: f64,
    /// Cap on the reported export limit
    pub max_export_kw: f64,
    /// Cap on the reported import limit
    pub max_import_kw: f64,
}

impl Default for DoeThresholds {
    fn default() -> Self {
        Self {
            critical_margin: DEFAULT_CRITICAL_MARGIN,
            ample_margin: DEFAULT_AMPLE_MARGIN,
            max_export_kw: DEFAULT_MAX_EXPORT_KW,
            max_import_kw: DEFAULT_MAX_IMPORT_KW,
        }
    }
}

impl DoeThresholds {
    pub fn validate(&self) -> Result<(), String> {
        if !self.critical_margin.is_finite() || !(0.0..1.0).contains(&self.critical_margin) {
            return Err(format!(
                "critical_margin must be in [0, 1), got {}",
                self.critical_margin
            ));
        }
        if !self.ample_margin.is_finite()
            || self.ample_margin < self.critical_margin
            || self.ample_margin > 1.0
        {
            return Err(format!(
                "ample_margin must be in [critical_margin, 1], got {}",
                self.ample_margin
            ));
        }
        if !self.max_export_kw.is_finite() || self.max_export_kw <= 0.0 {
            return Err(format!("max_export_kw must be positive, got {}", self.max_export_kw));
        }
        if !self.max_import_kw.is_finite() || self.max_import_kw <= 0.0 {
            return Err(format!("max_import_kw must be positive, got {}", self.max_import_kw));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Export,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingPointSource {
    Measured,
    Forecast,
}

/// Point around which the envelope is linearised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    /// Power flow (kW, positive = export)
    pub power_kw: f64,
    /// Voltage at that power flow (per-unit)
    pub voltage_pu: f64,
    pub source: OperatingPointSource,
}

impl OperatingPoint {
    /// Measured point, or the forecast power with its predicted voltage.
    pub fn resolve(
        constraints: &VoltageConstraints,
        sensitivity: f64,
        forecast_power_kw: Option<f64>,
    ) -> Self {
        match forecast_power_kw {
            Some(power_kw) => Self {
                power_kw,
                voltage_pu: predict_voltage(
                    constraints.current_voltage_pu,
                    sensitivity,
                    power_kw - constraints.current_power_kw,
                ),
                source: OperatingPointSource::Forecast,
            },
            None => Self {
                power_kw: constraints.current_power_kw,
                voltage_pu: constraints.current_voltage_pu,
                source: OperatingPointSource::Measured,
            },
        }
    }

    /// Power flow in `direction`, positive when flowing that way.
    fn flow_kw(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Export => self.power_kw,
            Direction::Import => -self.power_kw,
        }
    }
}

/// `ΔV = s × ΔP`, converted to per-unit.
pub fn predict_voltage(voltage_pu: f64, sensitivity: f64, delta_power_kw: f64) -> f64 {
    voltage_pu + sensitivity * delta_power_kw / PERCENT_PER_PU
}

/// Envelope imposed by a single physical constraint in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintEnvelope {
    pub factor: LimitingFactor,
    /// Largest admissible flow in the direction (kW, never negative)
    pub limit_kw: f64,
    /// Remaining headroom as a fraction, clamped to [0, 1]
    pub margin: f64,
    /// Operating point is already beyond the limit
    pub violated: bool,
}

/// Voltage-only envelope: flow at which the voltage reaches the band edge.
pub fn voltage_envelope(
    op: &OperatingPoint,
    band: VoltageBand,
    sensitivity: f64,
    direction: Direction,
) -> ConstraintEnvelope {
    let headroom_pu = match direction {
        Direction::Export => band.max_pu - op.voltage_pu,
        Direction::Import => op.voltage_pu - band.min_pu,
    };

    if headroom_pu < 0.0 {
        return ConstraintEnvelope {
            factor: LimitingFactor::Voltage,
            limit_kw: 0.0,
            margin: 0.0,
            violated: true,
        };
    }

    let headroom_kw = headroom_pu * PERCENT_PER_PU / sensitivity;
    ConstraintEnvelope {
        factor: LimitingFactor::Voltage,
        limit_kw: (op.flow_kw(direction) + headroom_kw).max(0.0),
        margin: (headroom_pu / band.width()).clamp(0.0, 1.0),
        violated: false,
    }
}

/// Thermal-only envelope of the service connection.
pub fn thermal_envelope(
    op: &OperatingPoint,
    capacity_kw: f64,
    direction: Direction,
) -> ConstraintEnvelope {
    let headroom_kw = capacity_kw - op.flow_kw(direction);
    let violated = headroom_kw < 0.0;
    ConstraintEnvelope {
        factor: LimitingFactor::Thermal,
        limit_kw: if violated { 0.0 } else { capacity_kw },
        margin: (headroom_kw / capacity_kw).clamp(0.0, 1.0),
        violated,
    }
}

/// Envelope left by the upstream transformer given its aggregate loading.
///
/// `aggregate_kw` is the net reverse flow through the transformer with this
/// connection already at `op`.
pub fn transformer_envelope(
    op: &OperatingPoint,
    transformer: &TransformerConfig,
    aggregate_kw: f64,
    direction: Direction,
) -> ConstraintEnvelope {
    let aggregate_flow = match direction {
        Direction::Export => aggregate_kw,
        Direction::Import => -aggregate_kw,
    };
    let headroom_kw = transformer.capacity_kw - aggregate_flow;
    let violated = headroom_kw < 0.0;
    ConstraintEnvelope {
        factor: LimitingFactor::Transformer,
        limit_kw: if violated {
            0.0
        } else {
            (op.flow_kw(direction) + headroom_kw).max(0.0)
        },
        margin: (headroom_kw / transformer.capacity_kw).clamp(0.0, 1.0),
        violated,
    }
}

/// Result for one direction after taking the most restrictive constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DirectionOutcome {
    limit_kw: f64,
    factor: LimitingFactor,
    margin: Option<f64>,
    violated: bool,
}

/// Most restrictive constraint in one direction.
///
/// The reported limit is the smallest envelope capped at `ceiling_kw`. A
/// constraint with a margin under the critical threshold takes precedence as
/// the limiting factor; otherwise the smallest envelope does when it is under
/// the ceiling; otherwise the tightest margin under the ample threshold.
fn resolve_direction(
    candidates: &[ConstraintEnvelope],
    ceiling_kw: f64,
    thresholds: &DoeThresholds,
) -> DirectionOutcome {
    if let Some(hit) = candidates.iter().find(|c| c.violated) {
        return DirectionOutcome {
            limit_kw: 0.0,
            factor: hit.factor,
            margin: Some(0.0),
            violated: true,
        };
    }

    // Earlier candidates win ties: voltage, then thermal, then transformer.
    let smallest_envelope = candidates
        .iter()
        .copied()
        .reduce(|best, c| if c.limit_kw < best.limit_kw { c } else { best });
    let tightest_margin = candidates
        .iter()
        .copied()
        .reduce(|best, c| if c.margin < best.margin { c } else { best });

    let (Some(smallest), Some(tightest)) = (smallest_envelope, tightest_margin) else {
        return DirectionOutcome {
            limit_kw: ceiling_kw,
            factor: LimitingFactor::None,
            margin: None,
            violated: false,
        };
    };

    let limit_kw = smallest.limit_kw.min(ceiling_kw);
    let binding = if tightest.margin < thresholds.critical_margin {
        Some(tightest)
    } else if smallest.limit_kw < ceiling_kw {
        Some(smallest)
    } else if tightest.margin < thresholds.ample_margin {
        Some(tightest)
    } else {
        None
    };

    match binding {
        Some(c) => DirectionOutcome {
            limit_kw,
            factor: c.factor,
            margin: Some(c.margin),
            violated: false,
        },
        None => DirectionOutcome {
            limit_kw,
            factor: LimitingFactor::None,
            margin: None,
            violated: false,
        },
    }
}

/// Stateless envelope calculator.
#[derive(Debug, Clone, Default)]
pub struct DoeCalculator {
    thresholds: DoeThresholds,
}

impl DoeCalculator {
    pub fn new(thresholds: DoeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DoeThresholds {
        &self.thresholds
    }

    /// Envelope for `config` at the measured point, or at the forecast point
    /// when `forecast_power_kw` is given.
    ///
    /// `transformer` is consulted only when `constraints` carries transformer
    /// loading.
    pub fn calculate(
        &self,
        config: &NetworkConfig,
        constraints: &VoltageConstraints,
        forecast_power_kw: Option<f64>,
        transformer: Option<&TransformerConfig>,
    ) -> Result<(OperatingPoint, DoeLimit), DoeError> {
        config.validate().map_err(DoeError::InvalidConfig)?;

        let band = constraints.band(config.voltage_band);
        band.validate().map_err(DoeError::InvalidConfig)?;

        constraints.validate().map_err(DoeError::OutOfRangeInput)?;
        if let Some(p) = forecast_power_kw {
            if !p.is_finite() {
                return Err(DoeError::OutOfRangeInput(format!(
                    "forecast_power_kw is not finite: {p}"
                )));
            }
        }

        let transformer_loading = match constraints.transformer_load_kw {
            Some(load_kw) => {
                let tx = transformer.ok_or_else(|| {
                    DoeError::InvalidConfig(format!(
                        "transformer {} has no capacity data",
                        config.transformer_id
                    ))
                })?;
                tx.validate().map_err(DoeError::InvalidConfig)?;
                Some((tx, load_kw))
            }
            None => None,
        };

        let sensitivity = config.voltage_sensitivity;
        // validate() guarantees presence
        let capacity_kw = config.thermal_capacity_kw.unwrap_or_default();
        let op = OperatingPoint::resolve(constraints, sensitivity, forecast_power_kw);

        let envelopes = |direction: Direction| {
            let mut voltage = voltage_envelope(&op, band, sensitivity, direction);
            // A reading already outside the band wins over the prediction.
            let measured_violation = match direction {
                Direction::Export => constraints.current_voltage_pu > band.max_pu,
                Direction::Import => constraints.current_voltage_pu < band.min_pu,
            };
            if measured_violation {
                voltage.limit_kw = 0.0;
                voltage.margin = 0.0;
                voltage.violated = true;
            }

            let mut out = vec![voltage, thermal_envelope(&op, capacity_kw, direction)];
            if let Some((tx, load_kw)) = transformer_loading {
                let aggregate_kw = load_kw + (op.power_kw - constraints.current_power_kw);
                out.push(transformer_envelope(&op, tx, aggregate_kw, direction));
            }
            out
        };

        let export_env = envelopes(Direction::Export);
        let import_env = envelopes(Direction::Import);

        let export = resolve_direction(&export_env, self.thresholds.max_export_kw, &self.thresholds);
        let import = resolve_direction(&import_env, self.thresholds.max_import_kw, &self.thresholds);

        let (status, limiting_factor, binding_margin) = self.classify(&export, &import);

        let margin_of = |envs: &[ConstraintEnvelope], factor: LimitingFactor| {
            envs.iter().find(|e| e.factor == factor).map(|e| e.margin)
        };
        let margins = DoeMargins {
            voltage_export: margin_of(&export_env, LimitingFactor::Voltage).unwrap_or_default(),
            voltage_import: margin_of(&import_env, LimitingFactor::Voltage).unwrap_or_default(),
            thermal_export: margin_of(&export_env, LimitingFactor::Thermal).unwrap_or_default(),
            thermal_import: margin_of(&import_env, LimitingFactor::Thermal).unwrap_or_default(),
            transformer_export: margin_of(&export_env, LimitingFactor::Transformer),
            transformer_import: margin_of(&import_env, LimitingFactor::Transformer),
        };

        let limit = DoeLimit {
            export_limit_kw: export.limit_kw,
            import_limit_kw: import.limit_kw,
            status,
            limiting_factor,
            binding_margin,
            margins,
            voltage_at_export_limit_pu: predict_voltage(
                op.voltage_pu,
                sensitivity,
                export.limit_kw - op.power_kw,
            ),
            voltage_at_import_limit_pu: predict_voltage(
                op.voltage_pu,
                sensitivity,
                -import.limit_kw - op.power_kw,
            ),
        };

        Ok((op, limit))
    }

    /// Overall status from both directions. A violation anywhere is critical;
    /// otherwise the direction with the smaller binding margin decides.
    fn classify(
        &self,
        export: &DirectionOutcome,
        import: &DirectionOutcome,
    ) -> (DoeStatus, LimitingFactor, Option<f64>) {
        for outcome in [export, import] {
            if outcome.violated {
                return (DoeStatus::Critical, outcome.factor, Some(0.0));
            }
        }

        let decisive = [export, import]
            .into_iter()
            .filter_map(|o| o.margin.map(|m| (o.factor, m)))
            .reduce(|best, c| if c.1 < best.1 { c } else { best });

        match decisive {
            None => (DoeStatus::Normal, LimitingFactor::None, None),
            Some((factor, margin)) if margin < self.thresholds.critical_margin => {
                (DoeStatus::Critical, factor, Some(margin))
            }
            Some((factor, margin)) => (DoeStatus::Constrained, factor, Some(margin)),
        }
    }
}
