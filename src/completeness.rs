//! Structural completeness selection
//!
//! Only participants who reached the final survey are eligible. Among those, a
//! session is complete when it has exactly the target number of clean tasks in
//! every condition; complete sessions form the full-participant subset used by
//! the repeated-measures tests.

use crate::schema::StudySession;
use crate::types::{Condition, TaskMetricsRecord};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Selector for eligible and complete sessions
pub struct CompletenessSelector {
    tasks_per_condition: usize,
}

impl CompletenessSelector {
    pub fn new(tasks_per_condition: usize) -> Self {
        Self {
            tasks_per_condition,
        }
    }

    /// Sessions that completed the final survey
    pub fn eligible_sessions(sessions: &[StudySession]) -> BTreeSet<String> {
        sessions
            .iter()
            .filter(|s| s.completed_study)
            .map(|s| s.session_id.clone())
            .collect()
    }

    /// Eligible sessions with exactly the target clean-task count in every condition
    pub fn complete_sessions(
        &self,
        clean: &[TaskMetricsRecord],
        eligible: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut counts: BTreeMap<&str, [usize; 3]> = BTreeMap::new();
        for record in clean {
            if !eligible.contains(&record.session_id) {
                continue;
            }
            let slot = counts.entry(record.session_id.as_str()).or_insert([0; 3]);
            slot[condition_index(record.interface_condition)] += 1;
        }

        let complete: BTreeSet<String> = counts
            .into_iter()
            .filter(|(_, per_condition)| {
                per_condition
                    .iter()
                    .all(|&count| count == self.tasks_per_condition)
            })
            .map(|(session_id, _)| session_id.to_string())
            .collect();

        info!(
            eligible = eligible.len(),
            complete = complete.len(),
            target = self.tasks_per_condition,
            "completeness selection complete"
        );

        complete
    }

    /// Records whose session is in `sessions`, in input order
    pub fn subset(
        records: &[TaskMetricsRecord],
        sessions: &BTreeSet<String>,
    ) -> Vec<TaskMetricsRecord> {
        records
            .iter()
            .filter(|r| sessions.contains(&r.session_id))
            .cloned()
            .collect()
    }
}

fn condition_index(condition: Condition) -> usize {
    match condition {
        Condition::Benchmark => 0,
        Condition::Single => 1,
        Condition::Multi => 2,
    }
}
