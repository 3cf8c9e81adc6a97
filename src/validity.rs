//! Task validity filtering
//!
//! Partitions task records into clean and rejected sets. A record is clean iff
//! it has a completion time, that time lies within the plausible window, an
//! outcome was committed to, and at least one interaction was logged. Every
//! input record ends up in exactly one partition.

use crate::config::AnalysisConfig;
use crate::types::TaskMetricsRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::info;

/// Why a record was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// No `taskStart`/`taskEnd` pair
    MissingCompletionTime,
    /// Completion time outside `[min_duration_sec, max_duration_sec]`
    DurationOutOfRange,
    /// The commit control was never clicked
    NoSelectedOutcome,
    NoInteractions,
}

impl RejectionReason {
    pub const ALL: [RejectionReason; 4] = [
        RejectionReason::MissingCompletionTime,
        RejectionReason::DurationOutOfRange,
        RejectionReason::NoSelectedOutcome,
        RejectionReason::NoInteractions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::MissingCompletionTime => "missing_completion_time",
            RejectionReason::DurationOutOfRange => "duration_out_of_range",
            RejectionReason::NoSelectedOutcome => "no_selected_outcome",
            RejectionReason::NoInteractions => "no_interactions",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected record with every predicate it failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub record: TaskMetricsRecord,
    pub reasons: Vec<RejectionReason>,
}

/// Failure count of one predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateCount {
    pub reason: RejectionReason,
    pub count: usize,
}

/// Result of validity filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityReport {
    pub clean: Vec<TaskMetricsRecord>,
    pub rejected: Vec<RejectedRecord>,
    /// Per-predicate failures; a record failing several predicates counts under each
    pub predicate_counts: Vec<PredicateCount>,
}

impl ValidityReport {
    pub fn total(&self) -> usize {
        self.clean.len() + self.rejected.len()
    }

    /// Up to `limit` rejected rows ordered by (task type, completion time),
    /// missing completion times last
    pub fn rejected_sample(&self, limit: usize) -> Vec<&RejectedRecord> {
        let mut sample: Vec<&RejectedRecord> = self.rejected.iter().collect();
        sample.sort_by(|a, b| {
            a.record
                .task_type
                .cmp(&b.record.task_type)
                .then_with(|| {
                    cmp_missing_last(
                        a.record.completion_time_seconds,
                        b.record.completion_time_seconds,
                    )
                })
        });
        sample.truncate(limit);
        sample
    }
}

fn cmp_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Validity filter over task records
pub struct ValidityFilter {
    min_duration_sec: f64,
    max_duration_sec: f64,
}

impl ValidityFilter {
    pub fn new(min_duration_sec: f64, max_duration_sec: f64) -> Self {
        Self {
            min_duration_sec,
            max_duration_sec,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.min_duration_sec, config.max_duration_sec)
    }

    /// Every predicate `record` fails; empty means clean
    pub fn check(&self, record: &TaskMetricsRecord) -> Vec<RejectionReason> {
        let mut reasons = Vec::new();

        match record.completion_time_seconds {
            None => reasons.push(RejectionReason::MissingCompletionTime),
            Some(t) if !(self.min_duration_sec..=self.max_duration_sec).contains(&t) => {
                reasons.push(RejectionReason::DurationOutOfRange)
            }
            Some(_) => {}
        }
        if record.selected_outcome.is_none() {
            reasons.push(RejectionReason::NoSelectedOutcome);
        }
        if record.total_interactions == 0 {
            reasons.push(RejectionReason::NoInteractions);
        }

        reasons
    }

    /// Partition records into clean and rejected, preserving input order
    pub fn partition(&self, records: &[TaskMetricsRecord]) -> ValidityReport {
        let mut clean = Vec::new();
        let mut rejected = Vec::new();

        for record in records {
            let reasons = self.check(record);
            if reasons.is_empty() {
                clean.push(record.clone());
            } else {
                rejected.push(RejectedRecord {
                    record: record.clone(),
                    reasons,
                });
            }
        }

        let predicate_counts = RejectionReason::ALL
            .iter()
            .map(|&reason| PredicateCount {
                reason,
                count: rejected
                    .iter()
                    .filter(|r| r.reasons.contains(&reason))
                    .count(),
            })
            .collect();

        info!(
            total = records.len(),
            clean = clean.len(),
            rejected = rejected.len(),
            "validity filtering complete"
        );

        ValidityReport {
            clean,
            rejected,
            predicate_counts,
        }
    }
}
