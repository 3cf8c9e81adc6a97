//! Replicate collapse and participant × condition pivots
//!
//! Participants perform more than one task per condition. The analysis unit is
//! one value per (participant, condition, metric): the arithmetic mean over
//! that participant's records for the condition.

use crate::types::{Condition, Metric, TaskMetricsRecord};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Per-metric means for one (session, condition)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedObservation {
    pub session_id: String,
    pub condition: Condition,
    /// Metrics with at least one present value in the group
    pub values: BTreeMap<Metric, f64>,
    /// Records collapsed into this observation
    pub replicates: usize,
}

/// Aggregator collapsing replicate tasks
pub struct Aggregator;

impl Aggregator {
    /// Group by (session, condition) and average each metric, skipping absent values.
    /// Output is ordered by session id, then condition.
    pub fn aggregate(records: &[TaskMetricsRecord], metrics: &[Metric]) -> Vec<AggregatedObservation> {
        let mut groups: BTreeMap<(&str, Condition), Vec<&TaskMetricsRecord>> = BTreeMap::new();
        for record in records {
            groups
                .entry((record.session_id.as_str(), record.interface_condition))
                .or_default()
                .push(record);
        }

        groups
            .into_iter()
            .map(|((session_id, condition), group)| {
                let values = metrics
                    .iter()
                    .filter_map(|&metric| {
                        let present: Vec<f64> =
                            group.iter().filter_map(|r| metric.value(r)).collect();
                        if present.is_empty() {
                            None
                        } else {
                            Some((metric, present.iter().mean()))
                        }
                    })
                    .collect();

                AggregatedObservation {
                    session_id: session_id.to_string(),
                    condition,
                    values,
                    replicates: group.len(),
                }
            })
            .collect()
    }
}

/// Participant × condition matrix for one metric
///
/// Columns are the conditions observed for the metric, in canonical order.
/// Participants missing any of those columns are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionMatrix {
    pub metric: Metric,
    pub conditions: Vec<Condition>,
    pub sessions: Vec<String>,
    /// One row per session, aligned with `conditions`
    pub rows: Vec<Vec<f64>>,
}

impl ConditionMatrix {
    pub fn pivot(observations: &[AggregatedObservation], metric: Metric) -> Self {
        let mut by_session: BTreeMap<&str, BTreeMap<Condition, f64>> = BTreeMap::new();
        for obs in observations {
            if let Some(&value) = obs.values.get(&metric) {
                by_session
                    .entry(obs.session_id.as_str())
                    .or_default()
                    .insert(obs.condition, value);
            }
        }

        let conditions: Vec<Condition> = Condition::ALL
            .iter()
            .copied()
            .filter(|c| by_session.values().any(|cells| cells.contains_key(c)))
            .collect();

        let mut sessions = Vec::new();
        let mut rows = Vec::new();
        for (session_id, cells) in by_session {
            let row: Option<Vec<f64>> = conditions.iter().map(|c| cells.get(c).copied()).collect();
            if let Some(row) = row {
                sessions.push(session_id.to_string());
                rows.push(row);
            }
        }

        Self {
            metric,
            conditions,
            sessions,
            rows,
        }
    }

    pub fn n_participants(&self) -> usize {
        self.rows.len()
    }

    pub fn n_conditions(&self) -> usize {
        self.conditions.len()
    }

    /// Values of one condition across participants
    pub fn column(&self, condition: Condition) -> Option<Vec<f64>> {
        let idx = self.conditions.iter().position(|&c| c == condition)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Whether every condition is present with at least one participant
    pub fn is_complete(&self) -> bool {
        self.n_conditions() == Condition::ALL.len() && !self.rows.is_empty()
    }
}
