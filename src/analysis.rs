//! Repeated-measures statistical pipeline
//!
//! For every population slice and metric:
//!
//! 1. normality per condition (informational)
//! 2. sphericity on the full-participant matrix (informational)
//! 3. omnibus test on participants with all three conditions
//! 4. pairwise post-hoc tests with per-metric correction, only when the
//!    omnibus test is significant
//!
//! Failures are confined to the smallest unit that produced them and show up
//! as annotated rows. Every (slice, metric) yields at least one row per table.

use crate::aggregate::{AggregatedObservation, Aggregator, ConditionMatrix};
use crate::config::AnalysisConfig;
use crate::stats::{mauchly, shapiro_wilk, RepeatedMeasuresEngine};
use crate::types::{Condition, ConditionPair, Metric, Slice, TaskMetricsRecord};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Outcome label of a normality cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum NormalityVerdict {
    InsufficientData,
    RejectNormality,
    FailToReject,
    Error(String),
}

impl fmt::Display for NormalityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalityVerdict::InsufficientData => f.write_str("Insufficient data"),
            NormalityVerdict::RejectNormality => f.write_str("Reject normality"),
            NormalityVerdict::FailToReject => f.write_str("Fail to reject"),
            NormalityVerdict::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Normality test of one (slice, metric, condition) sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityRow {
    pub slice: Slice,
    pub metric: Metric,
    pub condition: Condition,
    pub n: usize,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub verdict: NormalityVerdict,
}

/// Sphericity test of one (slice, metric)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphericityRow {
    pub slice: Slice,
    pub metric: Metric,
    pub n_participants: usize,
    pub n_conditions: usize,
    pub spherical: Option<bool>,
    pub w: Option<f64>,
    pub chi2: Option<f64>,
    pub dof: Option<f64>,
    pub p_value: Option<f64>,
    pub note: String,
}

/// Which stage of the repeated-measures test produced a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Omnibus,
    PostHoc,
}

/// One omnibus or post-hoc result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatTestResult {
    pub slice: Slice,
    pub metric: Metric,
    pub test_kind: TestKind,
    /// Name of the test run, e.g. `friedman` or `wilcoxon`
    pub test: String,
    pub condition_pair: Option<ConditionPair>,
    pub n: usize,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub correction_method: Option<String>,
    pub corrected_p: Option<f64>,
    pub significant: Option<bool>,
    /// Skip or error annotation
    pub note: Option<String>,
}

impl StatTestResult {
    fn omnibus(slice: Slice, metric: Metric, test: &str, n: usize) -> Self {
        Self {
            slice,
            metric,
            test_kind: TestKind::Omnibus,
            test: test.to_string(),
            condition_pair: None,
            n,
            statistic: None,
            p_value: None,
            correction_method: None,
            corrected_p: None,
            significant: None,
            note: None,
        }
    }

    fn post_hoc(slice: Slice, metric: Metric, test: &str, pair: ConditionPair, n: usize) -> Self {
        Self {
            test_kind: TestKind::PostHoc,
            condition_pair: Some(pair),
            ..Self::omnibus(slice, metric, test, n)
        }
    }
}

/// All statistical tables of one slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceAnalysis {
    pub slice: Slice,
    pub normality: Vec<NormalityRow>,
    pub sphericity: Vec<SphericityRow>,
    pub tests: Vec<StatTestResult>,
}

struct SliceInput {
    slice: Slice,
    normality_records: Vec<TaskMetricsRecord>,
    observations: Vec<AggregatedObservation>,
}

struct MetricAnalysis {
    normality: Vec<NormalityRow>,
    sphericity: SphericityRow,
    tests: Vec<StatTestResult>,
}

/// Statistical pipeline over a repeated-measures engine
pub struct StatisticalPipeline<E: RepeatedMeasuresEngine> {
    engine: E,
    alpha: f64,
    min_normality_sample: usize,
    parallel: bool,
}

impl<E: RepeatedMeasuresEngine> StatisticalPipeline<E> {
    pub fn new(engine: E, config: &AnalysisConfig) -> Self {
        Self {
            engine,
            alpha: config.alpha,
            min_normality_sample: config.min_normality_sample,
            parallel: config.parallel,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run every stage for every slice and metric.
    ///
    /// `normality_records` feeds the per-condition normality checks at task
    /// level; `full_records` (the full-participant subset) is aggregated and
    /// feeds sphericity and the repeated-measures tests.
    pub fn run(
        &self,
        normality_records: &[TaskMetricsRecord],
        full_records: &[TaskMetricsRecord],
        metrics: &[Metric],
    ) -> Vec<SliceAnalysis> {
        let inputs: Vec<SliceInput> = Slice::ALL
            .iter()
            .map(|&slice| SliceInput {
                slice,
                normality_records: slice_records(normality_records, slice),
                observations: Aggregator::aggregate(&slice_records(full_records, slice), metrics),
            })
            .collect();

        let jobs: Vec<(&SliceInput, Metric)> = inputs
            .iter()
            .flat_map(|input| metrics.iter().map(move |&metric| (input, metric)))
            .collect();

        let run_job = |&(input, metric): &(&SliceInput, Metric)| self.analyze_metric(input, metric);
        let results: Vec<MetricAnalysis> = if self.parallel {
            jobs.par_iter().map(run_job).collect()
        } else {
            jobs.iter().map(run_job).collect()
        };

        let mut analyses: Vec<SliceAnalysis> = inputs
            .iter()
            .map(|input| SliceAnalysis {
                slice: input.slice,
                normality: Vec::new(),
                sphericity: Vec::new(),
                tests: Vec::new(),
            })
            .collect();
        for (index, result) in results.into_iter().enumerate() {
            let analysis = &mut analyses[index / metrics.len()];
            analysis.normality.extend(result.normality);
            analysis.sphericity.push(result.sphericity);
            analysis.tests.extend(result.tests);
        }

        info!(
            slices = analyses.len(),
            metrics = metrics.len(),
            parallel = self.parallel,
            "statistical analysis complete"
        );
        analyses
    }

    fn analyze_metric(&self, input: &SliceInput, metric: Metric) -> MetricAnalysis {
        debug!(slice = %input.slice, metric = %metric, "analysing metric");
        let matrix = ConditionMatrix::pivot(&input.observations, metric);
        MetricAnalysis {
            normality: self.normality(input.slice, &input.normality_records, metric),
            sphericity: self.sphericity(input.slice, &matrix),
            tests: self.repeated_measures(input.slice, &matrix),
        }
    }

    /// Shapiro–Wilk per condition over task-level values
    pub fn normality(
        &self,
        slice: Slice,
        records: &[TaskMetricsRecord],
        metric: Metric,
    ) -> Vec<NormalityRow> {
        Condition::ALL
            .iter()
            .map(|&condition| {
                let sample: Vec<f64> = records
                    .iter()
                    .filter(|r| r.interface_condition == condition)
                    .filter_map(|r| metric.value(r))
                    .collect();
                let mut row = NormalityRow {
                    slice,
                    metric,
                    condition,
                    n: sample.len(),
                    statistic: None,
                    p_value: None,
                    verdict: NormalityVerdict::InsufficientData,
                };
                if sample.len() < self.min_normality_sample.max(3) {
                    return row;
                }

                match shapiro_wilk(&sample) {
                    Ok(outcome) => {
                        row.statistic = Some(outcome.statistic);
                        row.p_value = Some(outcome.p_value);
                        row.verdict = if outcome.p_value < self.alpha {
                            NormalityVerdict::RejectNormality
                        } else {
                            NormalityVerdict::FailToReject
                        };
                    }
                    Err(e) => {
                        debug!(slice = %slice, metric = %metric, condition = %condition, error = %e, "normality test failed");
                        row.verdict = NormalityVerdict::Error(e.to_string());
                    }
                }
                row
            })
            .collect()
    }

    /// Mauchly's test on a participant × condition matrix
    pub fn sphericity(&self, slice: Slice, matrix: &ConditionMatrix) -> SphericityRow {
        let mut row = SphericityRow {
            slice,
            metric: matrix.metric,
            n_participants: matrix.n_participants(),
            n_conditions: matrix.n_conditions(),
            spherical: None,
            w: None,
            chi2: None,
            dof: None,
            p_value: None,
            note: "OK".to_string(),
        };

        if matrix.n_conditions() < 2 || matrix.rows.is_empty() {
            row.note = "Skipped (not enough conditions)".to_string();
            return row;
        }

        match mauchly(&matrix.rows, self.alpha) {
            Ok(outcome) => {
                row.spherical = Some(outcome.spherical);
                row.w = outcome.w;
                row.chi2 = outcome.chi2;
                row.dof = Some(outcome.dof);
                row.p_value = Some(outcome.p_value);
            }
            Err(e) => {
                warn!(slice = %slice, metric = %matrix.metric, error = %e, "sphericity test failed");
                row.note = format!("Error: {}", e);
            }
        }
        row
    }

    /// Omnibus test, then corrected post-hoc tests when it is significant
    pub fn repeated_measures(&self, slice: Slice, matrix: &ConditionMatrix) -> Vec<StatTestResult> {
        let metric = matrix.metric;
        let omnibus_name = self.engine.omnibus_name();
        let mut omnibus = StatTestResult::omnibus(slice, metric, omnibus_name, matrix.n_participants());

        if !matrix.is_complete() {
            omnibus.note = Some(format!(
                "Omnibus omitted: {} of {} conditions complete across {} participants",
                matrix.n_conditions(),
                Condition::ALL.len(),
                matrix.n_participants()
            ));
            debug!(slice = %slice, metric = %metric, "omnibus omitted");
            return vec![omnibus];
        }

        let samples: Vec<Vec<f64>> = Condition::ALL
            .iter()
            .filter_map(|&c| matrix.column(c))
            .collect();
        let outcome = match self.engine.omnibus_test(&samples) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(slice = %slice, metric = %metric, error = %e, "omnibus test failed");
                omnibus.note = Some(format!("Error: {}", e));
                return vec![omnibus];
            }
        };

        let significant = outcome.p_value < self.alpha;
        omnibus.statistic = Some(outcome.statistic);
        omnibus.p_value = Some(outcome.p_value);
        omnibus.significant = Some(significant);

        let mut rows = vec![omnibus];
        if significant {
            rows.extend(self.post_hoc(slice, matrix));
        }
        rows
    }

    fn post_hoc(&self, slice: Slice, matrix: &ConditionMatrix) -> Vec<StatTestResult> {
        let metric = matrix.metric;
        let pairwise_name = self.engine.pairwise_name();

        let mut rows: Vec<StatTestResult> = Condition::pairs()
            .iter()
            .map(|&pair| {
                let mut row =
                    StatTestResult::post_hoc(slice, metric, pairwise_name, pair, matrix.n_participants());
                let test = match (matrix.column(pair.0), matrix.column(pair.1)) {
                    (Some(a), Some(b)) => self.engine.pairwise_test(&a, &b),
                    _ => {
                        row.note = Some("Error: condition column missing".to_string());
                        return row;
                    }
                };
                match test {
                    Ok(outcome) => {
                        row.statistic = Some(outcome.statistic);
                        row.p_value = Some(outcome.p_value);
                    }
                    Err(e) => {
                        warn!(slice = %slice, metric = %metric, pair = %pair, error = %e, "pairwise test failed");
                        row.note = Some(format!("Error: {}", e));
                    }
                }
                row
            })
            .collect();

        // Correction family: the pairs of this metric that produced a p-value
        let tested: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.p_value.is_some())
            .map(|(i, _)| i)
            .collect();
        let raw: Vec<f64> = tested.iter().filter_map(|&i| rows[i].p_value).collect();
        let corrected = self.engine.correct(&raw);
        for (&i, corrected_p) in tested.iter().zip(corrected) {
            let row = &mut rows[i];
            row.correction_method = Some(self.engine.correction_name().to_string());
            row.corrected_p = Some(corrected_p);
            row.significant = Some(corrected_p < self.alpha);
        }

        rows
    }
}

/// Records of `records` belonging to `slice`, in input order
pub fn slice_records(records: &[TaskMetricsRecord], slice: Slice) -> Vec<TaskMetricsRecord> {
    records
        .iter()
        .filter(|r| slice.includes(r.task_type))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;
    use crate::stats::{NonParametricEngine, TestOutcome};
    use crate::types::{SelectedOutcome, TaskType};
    use pretty_assertions::assert_eq;

    fn record(
        session: &str,
        condition: Condition,
        task_type: TaskType,
        time: f64,
    ) -> TaskMetricsRecord {
        TaskMetricsRecord {
            session_id: session.to_string(),
            step_id: format!("{}-{}-{}", session, condition, task_type),
            interface_condition: condition,
            task_type,
            completion_time_seconds: Some(time),
            total_interactions: 5,
            total_navigations: 2,
            total_filters: 1,
            total_resets: 0,
            total_hovers: 3,
            total_scrolls: 2,
            selected_outcome: Some(SelectedOutcome::default()),
        }
    }

    /// Participants who are consistently fastest on benchmark, slowest on multi
    fn ordered_study(participants: usize) -> Vec<TaskMetricsRecord> {
        let mut records = Vec::new();
        for p in 0..participants {
            let session = format!("p{:02}", p);
            let base = 20.0 + p as f64 * 3.7;
            for task_type in [TaskType::Exploratory, TaskType::Goal] {
                records.push(record(&session, Condition::Benchmark, task_type, base));
                records.push(record(&session, Condition::Single, task_type, base + 10.0 + p as f64));
                records.push(record(&session, Condition::Multi, task_type, base + 25.0 + 2.0 * p as f64));
            }
        }
        records
    }

    fn pipeline() -> StatisticalPipeline<NonParametricEngine> {
        let config = AnalysisConfig {
            parallel: false,
            ..Default::default()
        };
        StatisticalPipeline::new(NonParametricEngine, &config)
    }

    #[test]
    fn test_significant_omnibus_yields_corrected_post_hoc() {
        let records = ordered_study(8);
        let analyses = pipeline().run(&records, &records, &[Metric::CompletionTime]);

        assert_eq!(analyses.len(), 3);
        let tests = &analyses[0].tests;
        assert_eq!(tests.len(), 4);

        let omnibus = &tests[0];
        assert_eq!(omnibus.test_kind, TestKind::Omnibus);
        assert_eq!(omnibus.test, "friedman");
        assert_eq!(omnibus.statistic, Some(16.0));
        assert_eq!(omnibus.significant, Some(true));

        let pairs: Vec<String> = tests[1..]
            .iter()
            .map(|t| t.condition_pair.unwrap().to_string())
            .collect();
        assert_eq!(
            pairs,
            vec!["benchmark vs single", "benchmark vs multi", "single vs multi"]
        );
        for row in &tests[1..] {
            let (raw, corrected) = (row.p_value.unwrap(), row.corrected_p.unwrap());
            assert!(corrected >= raw);
            assert_eq!(row.correction_method.as_deref(), Some("holm"));
            assert_eq!(row.significant, Some(corrected < 0.05));
        }
    }

    #[test]
    fn test_non_significant_omnibus_has_no_post_hoc() {
        // Orderings rotate across participants so rank sums are equal
        let orders = [
            [10.0, 20.0, 30.0],
            [20.0, 30.0, 10.0],
            [30.0, 10.0, 20.0],
        ];
        let mut records = Vec::new();
        for (p, times) in orders.iter().enumerate() {
            let session = format!("p{}", p);
            for (condition, time) in Condition::ALL.iter().zip(times) {
                records.push(record(&session, *condition, TaskType::Goal, *time));
            }
        }

        let analyses = pipeline().run(&records, &records, &[Metric::CompletionTime]);
        let goal = analyses.iter().find(|a| a.slice == Slice::Goal).unwrap();

        assert_eq!(goal.tests.len(), 1);
        assert!(goal.tests[0].statistic.unwrap().abs() < 1e-9);
        assert_eq!(goal.tests[0].significant, Some(false));
        assert_eq!(goal.tests[0].corrected_p, None);
    }

    #[test]
    fn test_missing_condition_omits_omnibus() {
        let records: Vec<TaskMetricsRecord> = ordered_study(5)
            .into_iter()
            .filter(|r| r.interface_condition != Condition::Multi)
            .collect();

        let analyses = pipeline().run(&records, &records, &[Metric::CompletionTime]);
        let all = &analyses[0];

        assert_eq!(all.tests.len(), 1);
        assert!(all.tests[0].note.as_deref().unwrap().starts_with("Omnibus omitted"));
        assert_eq!(all.tests[0].statistic, None);

        // Two columns still allow the sphericity row
        assert_eq!(all.sphericity[0].note, "OK");
        assert_eq!(all.sphericity[0].spherical, Some(true));
        assert_eq!(all.sphericity[0].dof, Some(1.0));
    }

    #[test]
    fn test_single_condition_skips_sphericity() {
        let records: Vec<TaskMetricsRecord> = ordered_study(4)
            .into_iter()
            .filter(|r| r.interface_condition == Condition::Single)
            .collect();

        let analyses = pipeline().run(&records, &records, &[Metric::TotalHovers]);
        assert_eq!(
            analyses[0].sphericity[0].note,
            "Skipped (not enough conditions)"
        );
    }

    #[test]
    fn test_normality_rows() {
        let mut records = ordered_study(6);
        records.retain(|r| r.interface_condition != Condition::Single || r.session_id == "p00");

        let rows = pipeline().normality(Slice::AllTasks, &records, Metric::TotalHovers);
        assert_eq!(rows.len(), 3);

        // Constant hover counts: zero range is reported inline
        assert_eq!(rows[0].condition, Condition::Benchmark);
        assert!(matches!(rows[0].verdict, NormalityVerdict::Error(_)));

        assert_eq!(rows[1].n, 2);
        assert_eq!(rows[1].verdict, NormalityVerdict::InsufficientData);

        let time_rows = pipeline().normality(Slice::AllTasks, &records, Metric::CompletionTime);
        assert!(time_rows[0].p_value.is_some());
        assert!(matches!(
            time_rows[0].verdict,
            NormalityVerdict::FailToReject | NormalityVerdict::RejectNormality
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let records = ordered_study(7);
        let metrics = Metric::BEHAVIOURAL;

        let sequential = pipeline().run(&records, &records, &metrics);
        let parallel = StatisticalPipeline::new(NonParametricEngine, &AnalysisConfig::default())
            .run(&records, &records, &metrics);

        assert_eq!(sequential, parallel);
        assert_eq!(sequential[0].sphericity.len(), metrics.len());
        assert_eq!(sequential[0].normality.len(), metrics.len() * 3);
    }

    struct FailingPairEngine;

    impl RepeatedMeasuresEngine for FailingPairEngine {
        fn omnibus_test(&self, _samples: &[Vec<f64>]) -> Result<TestOutcome, StatsError> {
            Ok(TestOutcome {
                statistic: 12.0,
                p_value: 0.001,
            })
        }

        fn pairwise_test(&self, a: &[f64], _b: &[f64]) -> Result<TestOutcome, StatsError> {
            if a[0] > 1.5 {
                Err(StatsError::Degenerate("boom".to_string()))
            } else {
                Ok(TestOutcome {
                    statistic: 0.0,
                    p_value: 0.02,
                })
            }
        }

        fn correct(&self, p_values: &[f64]) -> Vec<f64> {
            crate::stats::holm(p_values)
        }

        fn omnibus_name(&self) -> &'static str {
            "stub"
        }

        fn pairwise_name(&self) -> &'static str {
            "stub_pair"
        }

        fn correction_name(&self) -> &'static str {
            "holm"
        }
    }

    #[test]
    fn test_failed_pair_is_annotated_and_excluded_from_correction() {
        let mut records = Vec::new();
        for (p, values) in [[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]].iter().enumerate() {
            let session = format!("p{}", p);
            for (condition, time) in Condition::ALL.iter().zip(values) {
                records.push(record(&session, *condition, TaskType::Goal, *time));
            }
        }
        let observations = Aggregator::aggregate(&records, &[Metric::CompletionTime]);
        let matrix = ConditionMatrix::pivot(&observations, Metric::CompletionTime);

        let pipeline = StatisticalPipeline::new(FailingPairEngine, &AnalysisConfig::default());
        let rows = pipeline.repeated_measures(Slice::Goal, &matrix);

        assert_eq!(rows.len(), 4);
        // benchmark-first pairs succeed, single vs multi fails
        assert_eq!(rows[1].corrected_p, Some(0.04));
        assert_eq!(rows[2].corrected_p, Some(0.04));
        assert!(rows[3].note.as_deref().unwrap().starts_with("Error"));
        assert_eq!(rows[3].corrected_p, None);
        assert_eq!(rows[3].significant, None);
    }
}
