use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DoeCalculateResponse, DoeCalculator, DoeError, DoeErrorKind};
use crate::domain::{DoeStatus, ProsumerId, VoltageConstraints};
use crate::topology::NetworkTopology;

/// One input row of a batch calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoeBatchEntry {
    pub prosumer_id: ProsumerId,
    pub constraints: VoltageConstraints,
    #[serde(default)]
    pub forecast_power_kw: Option<f64>,
}

impl DoeBatchEntry {
    pub fn new(prosumer_id: impl Into<ProsumerId>, constraints: VoltageConstraints) -> Self {
        Self {
            prosumer_id: prosumer_id.into(),
            constraints,
            forecast_power_kw: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntryError {
    pub kind: DoeErrorKind,
    pub message: String,
}

impl From<&DoeError> for BatchEntryError {
    fn from(err: &DoeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome for one batch row, correlated to its input by `index` and id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoeBatchResult {
    pub index: usize,
    pub prosumer_id: ProsumerId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DoeCalculateResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchEntryError>,
}

impl DoeBatchResult {
    fn from_outcome(
        index: usize,
        prosumer_id: ProsumerId,
        outcome: Result<DoeCalculateResponse, DoeError>,
    ) -> Self {
        match outcome {
            Ok(result) => Self {
                index,
                prosumer_id,
                success: true,
                result: Some(result),
                error: None,
            },
            Err(err) => Self {
                index,
                prosumer_id,
                success: false,
                result: None,
                error: Some(BatchEntryError::from(&err)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub normal: usize,
    pub constrained: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoeBatchCalculateResponse {
    pub batch_id: Uuid,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub status_counts: StatusCounts,
    pub results: Vec<DoeBatchResult>,
}

impl DoeBatchCalculateResponse {
    pub fn from_results(results: Vec<DoeBatchResult>) -> Self {
        let mut status_counts = StatusCounts::default();
        for r in results.iter().filter_map(|r| r.result.as_ref()) {
            match r.doe.status {
                DoeStatus::Normal => status_counts.normal += 1,
                DoeStatus::Constrained => status_counts.constrained += 1,
                DoeStatus::Critical => status_counts.critical += 1,
            }
        }
        let succeeded = results.iter().filter(|r| r.success).count();

        Self {
            batch_id: Uuid::new_v4(),
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            status_counts,
            results,
        }
    }
}

/// Evaluate every entry against one topology snapshot.
///
/// Output order and length always match `entries`. Batches of at least
/// `parallel_threshold` entries are spread over the rayon pool.
pub fn evaluate_batch(
    calculator: &DoeCalculator,
    topology: &NetworkTopology,
    entries: &[DoeBatchEntry],
    parallel_threshold: usize,
) -> Vec<DoeBatchResult> {
    let evaluate = |(index, entry): (usize, &DoeBatchEntry)| {
        DoeBatchResult::from_outcome(
            index,
            entry.prosumer_id.clone(),
            evaluate_entry(calculator, topology, entry),
        )
    };

    if entries.len() >= parallel_threshold.max(1) {
        entries.par_iter().enumerate().map(evaluate).collect()
    } else {
        entries.iter().enumerate().map(evaluate).collect()
    }
}

fn evaluate_entry(
    calculator: &DoeCalculator,
    topology: &NetworkTopology,
    entry: &DoeBatchEntry,
) -> Result<DoeCalculateResponse, DoeError> {
    let config = topology
        .get(&entry.prosumer_id)
        .ok_or_else(|| DoeError::NotFound(entry.prosumer_id.clone()))?;
    let transformer = topology.transformer(&config.transformer_id);

    let (operating_point, doe) = calculator.calculate(
        config,
        &entry.constraints,
        entry.forecast_power_kw,
        transformer,
    )?;

    Ok(DoeCalculateResponse {
        prosumer_id: config.prosumer_id.clone(),
        transformer_id: config.transformer_id.clone(),
        feeder_id: config.feeder_id.clone(),
        operating_point,
        doe,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::builtin::proof_of_concept_topology;

    fn entries() -> Vec<DoeBatchEntry> {
        vec![
            DoeBatchEntry::new("PRS-001", VoltageConstraints::new(1.0, 0.0)),
            DoeBatchEntry::new("UNKNOWN", VoltageConstraints::new(1.0, 0.0)),
            DoeBatchEntry::new("PRS-002", VoltageConstraints::new(-1.0, 0.0)),
            DoeBatchEntry::new("PRS-001", VoltageConstraints::new(1.049, 0.0)),
        ]
    }

    #[test]
    fn test_failures_are_inline_and_ordered() {
        let topo = proof_of_concept_topology();
        let results = evaluate_batch(&DoeCalculator::default(), &topo, &entries(), 64);

        assert_eq!(results.len(), 4);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.index, i);
        }
        assert!(results[0].success);
        assert_eq!(results[1].error.as_ref().unwrap().kind, DoeErrorKind::NotFound);
        assert_eq!(
            results[2].error.as_ref().unwrap().kind,
            DoeErrorKind::OutOfRangeInput
        );
        assert_eq!(
            results[3].result.as_ref().unwrap().doe.status,
            DoeStatus::Critical
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let topo = proof_of_concept_topology();
        let calc = DoeCalculator::default();
        let many: Vec<DoeBatchEntry> = entries().into_iter().cycle().take(200).collect();

        let sequential = evaluate_batch(&calc, &topo, &many, usize::MAX);
        let parallel = evaluate_batch(&calc, &topo, &many, 1);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_summary_counts() {
        let topo = proof_of_concept_topology();
        let results = evaluate_batch(&DoeCalculator::default(), &topo, &entries(), 64);
        let response = DoeBatchCalculateResponse::from_results(results);

        assert_eq!(response.total, 4);
        assert_eq!(response.succeeded, 2);
        assert_eq!(response.failed, 2);
        assert_eq!(response.status_counts.constrained, 1);
        assert_eq!(response.status_counts.critical, 1);
    }

    #[test]
    fn test_empty_batch() {
        let topo = proof_of_concept_topology();
        let results = evaluate_batch(&DoeCalculator::default(), &topo, &[], 64);
        assert!(results.is_empty());
        assert_eq!(DoeBatchCalculateResponse::from_results(results).total, 0);
    }
}
