//! Goal task outcome analysis
//!
//! Goal tasks come with explicit criteria (price cap, distance cap, required
//! feature). This module reports how often each interface led to an outcome
//! meeting them and tests outcome quality across interfaces.

use crate::aggregate::{Aggregator, ConditionMatrix};
use crate::analysis::{slice_records, NormalityRow, StatTestResult, StatisticalPipeline};
use crate::config::GoalCriteria;
use crate::descriptive::{DescriptiveStat, DescriptiveStats};
use crate::stats::RepeatedMeasuresEngine;
use crate::types::{Condition, Metric, SelectedOutcome, Slice, TaskMetricsRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Percentage of goal tasks meeting each criterion, per condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSuccessRate {
    pub condition: Condition,
    pub tasks: usize,
    pub price_ok: f64,
    pub distance_ok: f64,
    pub feature_ok: f64,
    /// All three criteria at once
    pub all_ok: f64,
}

/// Goal outcome tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalOutcomeReport {
    pub success_rates: Vec<GoalSuccessRate>,
    /// Shapiro–Wilk per condition over clean goal tasks
    pub normality: Vec<NormalityRow>,
    pub descriptive: Vec<DescriptiveStat>,
    pub tests: Vec<StatTestResult>,
}

/// Goal outcome analysis
pub struct GoalOutcome<'a> {
    criteria: &'a GoalCriteria,
    metrics: &'a [Metric],
}

impl<'a> GoalOutcome<'a> {
    pub fn new(criteria: &'a GoalCriteria, metrics: &'a [Metric]) -> Self {
        Self { criteria, metrics }
    }

    /// Success rates over the goal tasks of `clean`; conditions without goal tasks are left out
    pub fn success_rates(&self, clean: &[TaskMetricsRecord]) -> Vec<GoalSuccessRate> {
        let goals = slice_records(clean, Slice::Goal);

        Condition::ALL
            .iter()
            .filter_map(|&condition| {
                let checks: Vec<[bool; 3]> = goals
                    .iter()
                    .filter(|r| r.interface_condition == condition)
                    .map(|r| self.check(r.selected_outcome.as_ref()))
                    .collect();
                if checks.is_empty() {
                    return None;
                }

                let rate = |pred: &dyn Fn(&[bool; 3]) -> bool| {
                    let hits = checks.iter().filter(|c| pred(c)).count();
                    round1(100.0 * hits as f64 / checks.len() as f64)
                };
                Some(GoalSuccessRate {
                    condition,
                    tasks: checks.len(),
                    price_ok: rate(&|c| c[0]),
                    distance_ok: rate(&|c| c[1]),
                    feature_ok: rate(&|c| c[2]),
                    all_ok: rate(&|c| c.iter().all(|&ok| ok)),
                })
            })
            .collect()
    }

    /// [price ok, distance ok, feature ok]; an absent attribute fails its check
    fn check(&self, outcome: Option<&SelectedOutcome>) -> [bool; 3] {
        let Some(outcome) = outcome else {
            return [false; 3];
        };
        [
            outcome.price.map_or(false, |p| p <= self.criteria.max_price),
            outcome
                .distance
                .map_or(false, |d| d <= self.criteria.max_distance_km),
            outcome.has_feature(&self.criteria.required_feature),
        ]
    }

    /// Success rates, outcome normality, descriptives and repeated-measures tests on the goal slice
    pub fn analyze<E: RepeatedMeasuresEngine>(
        &self,
        clean: &[TaskMetricsRecord],
        full_participants: &[TaskMetricsRecord],
        pipeline: &StatisticalPipeline<E>,
    ) -> GoalOutcomeReport {
        let success_rates = self.success_rates(clean);

        let clean_goals = slice_records(clean, Slice::Goal);
        let normality: Vec<NormalityRow> = self
            .metrics
            .iter()
            .flat_map(|&metric| pipeline.normality(Slice::Goal, &clean_goals, metric))
            .collect();

        let goals = slice_records(full_participants, Slice::Goal);
        let descriptive = DescriptiveStats::by_condition(&goals, self.metrics);

        let observations = Aggregator::aggregate(&goals, self.metrics);
        let tests: Vec<StatTestResult> = self
            .metrics
            .iter()
            .flat_map(|&metric| {
                let matrix = ConditionMatrix::pivot(&observations, metric);
                pipeline.repeated_measures(Slice::Goal, &matrix)
            })
            .collect();

        info!(
            goal_tasks = goals.len(),
            tests = tests.len(),
            "goal outcome analysis complete"
        );

        GoalOutcomeReport {
            success_rates,
            normality,
            descriptive,
            tests,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
