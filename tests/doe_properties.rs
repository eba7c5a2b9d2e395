use proptest::prelude::*;
use std::sync::Arc;

use doe_service::{
    doe::{
        calculator::{thermal_envelope, voltage_envelope},
        Direction, DoeBatchEntry, DoeCalculator, DoeError, DoeService, OperatingPoint,
    },
    domain::{
        DoeStatus, LimitingFactor, NetworkConfig, ProsumerId, VoltageBand, VoltageConstraints,
    },
    topology::{NetworkTopology, StaticTopologyProvider},
};

fn config(sensitivity: f64, thermal_kw: f64) -> NetworkConfig {
    NetworkConfig {
        prosumer_id: ProsumerId::from("PRS-P"),
        nominal_voltage_v: 230.0,
        voltage_sensitivity: sensitivity,
        thermal_capacity_kw: Some(thermal_kw),
        transformer_id: "TX-P".to_string(),
        feeder_id: None,
        voltage_band: VoltageBand::default(),
    }
}

fn pilot_service() -> DoeService {
    DoeService::new(
        Arc::new(StaticTopologyProvider::proof_of_concept()),
        DoeCalculator::default(),
    )
}

#[test]
fn thermal_binds_before_voltage_headroom() {
    let (_, doe) = DoeCalculator::default()
        .calculate(&config(0.02, 100.0), &VoltageConstraints::new(1.0, 0.0), None, None)
        .unwrap();

    assert_eq!(doe.export_limit_kw, 100.0);
    assert_eq!(doe.limiting_factor, LimitingFactor::Thermal);
    assert_eq!(doe.status, DoeStatus::Constrained);
}

#[test]
fn voltage_near_upper_limit_is_critical() {
    let (_, doe) = DoeCalculator::default()
        .calculate(&config(0.02, 100.0), &VoltageConstraints::new(1.049, 0.0), None, None)
        .unwrap();

    // 0.001 p.u. of headroom at 0.02 %/kW
    assert!((doe.export_limit_kw - 5.0).abs() < 1e-6);
    assert_eq!(doe.limiting_factor, LimitingFactor::Voltage);
    assert_eq!(doe.status, DoeStatus::Critical);
}

#[test]
fn unknown_prosumer_is_not_found_everywhere() {
    let service = pilot_service();
    let id = ProsumerId::from("PRS-UNKNOWN");
    let constraints = VoltageConstraints::new(1.0, 0.0);

    assert_eq!(
        service.calculate_doe_for_prosumer(&id, &constraints, None),
        Err(DoeError::NotFound(id.clone()))
    );

    let batch = service.calculate_doe_batch(&[DoeBatchEntry::new(id, constraints)]);
    assert_eq!(batch.failed, 1);
    assert_eq!(
        batch.results[0].error.as_ref().map(|e| e.kind),
        Some(doe_service::doe::DoeErrorKind::NotFound)
    );
}

proptest! {
    #[test]
    fn export_limit_is_minimum_of_constraints(
        voltage in 0.951f64..1.049,
        power in -50.0f64..50.0,
        sensitivity in 0.01f64..1.0,
        capacity in 60.0f64..300.0,
    ) {
        let calc = DoeCalculator::default();
        let cfg = config(sensitivity, capacity);
        let constraints = VoltageConstraints::new(voltage, power);
        let (op, doe) = calc.calculate(&cfg, &constraints, None, None).unwrap();

        for (direction, limit, ceiling) in [
            (Direction::Export, doe.export_limit_kw, calc.thresholds().max_export_kw),
            (Direction::Import, doe.import_limit_kw, calc.thresholds().max_import_kw),
        ] {
            let v = voltage_envelope(&op, cfg.voltage_band, sensitivity, direction);
            let t = thermal_envelope(&op, capacity, direction);
            let expected = v.limit_kw.min(t.limit_kw).min(ceiling);
            prop_assert!((limit - expected).abs() < 1e-9);
            prop_assert!(limit >= 0.0);
        }
    }

    #[test]
    fn status_agrees_with_binding_margin(
        voltage in 0.9f64..1.1,
        power in -150.0f64..150.0,
        sensitivity in 0.005f64..1.0,
        capacity in 5.0f64..500.0,
    ) {
        let calc = DoeCalculator::default();
        let (_, doe) = calc
            .calculate(&config(sensitivity, capacity), &VoltageConstraints::new(voltage, power), None, None)
            .unwrap();
        let threshold = calc.thresholds().critical_margin;

        match doe.status {
            DoeStatus::Critical => {
                let margin = doe.binding_margin.unwrap();
                prop_assert!(margin < threshold);
                prop_assert!(doe.limiting_factor != LimitingFactor::None);
            }
            DoeStatus::Constrained => {
                let margin = doe.binding_margin.unwrap();
                prop_assert!(margin >= threshold);
                prop_assert!(doe.limiting_factor != LimitingFactor::None);
            }
            DoeStatus::Normal => {
                prop_assert_eq!(doe.limiting_factor, LimitingFactor::None);
                prop_assert!(doe.binding_margin.is_none());
            }
        }
        prop_assert!(doe.limiting_factor != LimitingFactor::Protection);
        prop_assert!(doe.limiting_factor != LimitingFactor::Transformer);
    }

    #[test]
    fn normal_means_every_margin_is_ample(
        voltage in 0.94f64..1.06,
        loading in -1.05f64..1.05,
        sensitivity in 0.0002f64..0.05,
        capacity in 100.0f64..1000.0,
    ) {
        let calc = DoeCalculator::default();
        let power = loading * capacity;
        let (_, doe) = calc
            .calculate(&config(sensitivity, capacity), &VoltageConstraints::new(voltage, power), None, None)
            .unwrap();
        let ample = calc.thresholds().ample_margin;
        let critical = calc.thresholds().critical_margin;

        let margins = [
            doe.margins.voltage_export,
            doe.margins.voltage_import,
            doe.margins.thermal_export,
            doe.margins.thermal_import,
        ];
        if doe.status == DoeStatus::Normal {
            for m in margins {
                prop_assert!(m >= ample);
            }
        }
        if margins.iter().any(|&m| m < critical) {
            prop_assert_eq!(doe.status, DoeStatus::Critical);
        }
    }

    #[test]
    fn calculation_is_idempotent(
        voltage in 0.9f64..1.1,
        power in -150.0f64..150.0,
        forecast in proptest::option::of(-150.0f64..150.0),
    ) {
        let calc = DoeCalculator::default();
        let cfg = config(0.1, 80.0);
        let constraints = VoltageConstraints::new(voltage, power);

        let first = calc.calculate(&cfg, &constraints, forecast, None).unwrap();
        let second = calc.calculate(&cfg, &constraints, forecast, None).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn forecast_shifts_operating_point_along_sensitivity(
        voltage in 0.96f64..1.04,
        power in -20.0f64..20.0,
        forecast in -20.0f64..20.0,
    ) {
        let constraints = VoltageConstraints::new(voltage, power);
        let op = OperatingPoint::resolve(&constraints, 0.1, Some(forecast));
        let expected = voltage + 0.1 * (forecast - power) / 100.0;
        prop_assert!((op.voltage_pu - expected).abs() < 1e-12);
        prop_assert_eq!(op.power_kw, forecast);
    }

    #[test]
    fn batch_preserves_length_and_order(
        picks in proptest::collection::vec(0usize..7, 0..40),
        threshold in 1usize..8,
    ) {
        let ids = ["PRS-001", "PRS-002", "PRS-003", "PRS-004", "PRS-005", "PRS-X", ""];
        let entries: Vec<DoeBatchEntry> = picks
            .iter()
            .map(|&i| DoeBatchEntry::new(ids[i], VoltageConstraints::new(1.0, 1.0)))
            .collect();

        let service = pilot_service().with_parallel_threshold(threshold);
        let response = service.calculate_doe_batch(&entries);

        prop_assert_eq!(response.total, entries.len());
        prop_assert_eq!(response.results.len(), entries.len());
        prop_assert_eq!(response.succeeded + response.failed, entries.len());
        for (i, (result, entry)) in response.results.iter().zip(&entries).enumerate() {
            prop_assert_eq!(result.index, i);
            prop_assert_eq!(&result.prosumer_id, &entry.prosumer_id);
            prop_assert_eq!(result.success, picks[i] < 5);
        }
    }
}

#[test]
fn single_and_batch_agree() {
    let service = pilot_service();
    let topology: Arc<NetworkTopology> = service.topology().get_network_topology();
    let constraints = VoltageConstraints::new(1.02, -3.0);

    let entries: Vec<DoeBatchEntry> = topology
        .prosumers()
        .map(|cfg| DoeBatchEntry::new(cfg.prosumer_id.clone(), constraints.clone()))
        .collect();
    let batch = service.calculate_doe_batch(&entries);

    for (entry, result) in entries.iter().zip(&batch.results) {
        let single = service
            .calculate_doe_for_prosumer(&entry.prosumer_id, &constraints, None)
            .unwrap();
        assert_eq!(result.result.as_ref(), Some(&single));
    }
}
