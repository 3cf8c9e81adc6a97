//! Pipeline orchestration
//!
//! This module provides the public API for UX Metrics.
//! It orchestrates the full pipeline from the raw study export to the
//! analysis report.

use crate::analysis::{SliceAnalysis, StatisticalPipeline};
use crate::completeness::CompletenessSelector;
use crate::config::AnalysisConfig;
use crate::descriptive::{
    ConditionCount, DescriptiveStat, DescriptiveStats, InterfaceOrderCount, SessionCountSummary,
};
use crate::error::AnalysisError;
use crate::outcome::{GoalOutcome, GoalOutcomeReport};
use crate::reducer::EventReducer;
use crate::schema::{StudyAdapter, StudySession};
use crate::stats::{NonParametricEngine, RepeatedMeasuresEngine};
use crate::types::TaskMetricsRecord;
use crate::validity::{RejectedRecord, ValidityFilter, ValidityReport};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything one analysis run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Every analysable task record, before cleaning
    pub records: Vec<TaskMetricsRecord>,
    pub validity: ValidityReport,
    /// Rejected records kept for manual inspection
    pub rejected_sample: Vec<RejectedRecord>,
    /// Sessions that reached the final survey
    pub eligible_sessions: Vec<String>,
    /// Eligible sessions with a balanced set of clean tasks
    pub full_participant_sessions: Vec<String>,
    pub full_participant_records: Vec<TaskMetricsRecord>,
    pub counts_before_cleaning: Vec<ConditionCount>,
    pub counts_after_cleaning: Vec<ConditionCount>,
    pub counts_after_cleaning_full_participants: Vec<ConditionCount>,
    pub descriptive_by_condition: Vec<DescriptiveStat>,
    pub descriptive_by_condition_and_task: Vec<DescriptiveStat>,
    pub slices: Vec<SliceAnalysis>,
    pub interface_orders: Vec<InterfaceOrderCount>,
    pub session_counts: SessionCountSummary,
    pub goal_outcome: GoalOutcomeReport,
}

/// Run the full analysis on a JSON study export.
///
/// # Arguments
/// * `json` - Study export document
/// * `config` - Thresholds, metrics and collection name
///
/// # Returns
/// The analysis report, ready for the table encoder or JSON output
///
/// # Example
/// ```ignore
/// let report = analyze_study(&export_json, &AnalysisConfig::default())?;
/// println!("{} clean tasks", report.validity.clean.len());
/// ```
pub fn analyze_study(json: &str, config: &AnalysisConfig) -> Result<AnalysisReport, AnalysisError> {
    StudyProcessor::new(config.clone())?.process_json(json)
}

/// Reduce a JSON study export to task metrics records, without cleaning.
///
/// Only goal and exploratory tasks under a known interface condition are
/// returned, in session then step order.
pub fn extract_task_metrics(
    json: &str,
    config: &AnalysisConfig,
) -> Result<Vec<TaskMetricsRecord>, AnalysisError> {
    let sessions = StudyAdapter::parse_sessions(json, &config.collection)?;
    Ok(EventReducer::reduce_sessions(&sessions))
}

/// Reduce and run the validity filter only
pub fn audit_study(json: &str, config: &AnalysisConfig) -> Result<ValidityReport, AnalysisError> {
    let records = extract_task_metrics(json, config)?;
    Ok(ValidityFilter::from_config(config).partition(&records))
}

/// Study processor over a configurable repeated-measures engine.
///
/// Use [`StudyProcessor::with_engine`] to swap the statistical tests without
/// touching the rest of the pipeline.
pub struct StudyProcessor<E: RepeatedMeasuresEngine = NonParametricEngine> {
    config: AnalysisConfig,
    statistics: StatisticalPipeline<E>,
}

impl StudyProcessor<NonParametricEngine> {
    /// Create a processor with the default non-parametric engine
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::with_engine(NonParametricEngine, config)
    }
}

impl<E: RepeatedMeasuresEngine> StudyProcessor<E> {
    /// Create a processor with a specific engine
    pub fn with_engine(engine: E, config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let statistics = StatisticalPipeline::new(engine, &config);
        Ok(Self { config, statistics })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Parse the export and process its sessions
    pub fn process_json(&self, json: &str) -> Result<AnalysisReport, AnalysisError> {
        let sessions = StudyAdapter::parse_sessions(json, &self.config.collection)?;
        Ok(self.process(&sessions))
    }

    /// Process already-extracted sessions.
    ///
    /// Pipeline stages:
    /// 1. EventReducer - one metrics record per analysable task
    /// 2. ValidityFilter - clean/rejected partition
    /// 3. CompletenessSelector - eligible and full-participant sessions
    /// 4. StatisticalPipeline - normality, sphericity, omnibus and post-hoc per slice
    /// 5. GoalOutcome - success rates and outcome quality tests
    pub fn process(&self, sessions: &[StudySession]) -> AnalysisReport {
        let config = &self.config;

        // Stage 1: Reduce every task
        let records = EventReducer::reduce_sessions(sessions);
        info!(
            sessions = sessions.len(),
            tasks = records.len(),
            "event reduction complete"
        );

        // Stage 2: Validity filtering
        let validity = ValidityFilter::from_config(config).partition(&records);
        let rejected_sample: Vec<RejectedRecord> = validity
            .rejected_sample(config.rejected_sample_size)
            .into_iter()
            .cloned()
            .collect();

        // Stage 3: Completeness selection
        let eligible = CompletenessSelector::eligible_sessions(sessions);
        let complete = CompletenessSelector::new(config.tasks_per_condition)
            .complete_sessions(&validity.clean, &eligible);
        let eligible_records = CompletenessSelector::subset(&validity.clean, &eligible);
        let full_participant_records = CompletenessSelector::subset(&validity.clean, &complete);

        // Stage 4: Statistics per slice and metric
        let slices = self
            .statistics
            .run(&eligible_records, &full_participant_records, &config.metrics);

        // Stage 5: Goal outcomes
        let goal_outcome = GoalOutcome::new(&config.goal_criteria, &config.outcome_metrics).analyze(
            &validity.clean,
            &full_participant_records,
            &self.statistics,
        );

        AnalysisReport {
            counts_before_cleaning: DescriptiveStats::condition_counts(&records),
            counts_after_cleaning: DescriptiveStats::condition_counts(&validity.clean),
            counts_after_cleaning_full_participants: DescriptiveStats::condition_counts(
                &full_participant_records,
            ),
            descriptive_by_condition: DescriptiveStats::by_condition(
                &validity.clean,
                &config.metrics,
            ),
            descriptive_by_condition_and_task: DescriptiveStats::by_condition_and_task(
                &validity.clean,
                &config.metrics,
            ),
            interface_orders: DescriptiveStats::interface_order_counts(sessions),
            session_counts: DescriptiveStats::session_counts(
                sessions,
                &validity.clean,
                &full_participant_records,
            ),
            eligible_sessions: eligible.into_iter().collect(),
            full_participant_sessions: complete.into_iter().collect(),
            records,
            validity,
            rejected_sample,
            full_participant_records,
            slices,
            goal_outcome,
        }
    }
}
