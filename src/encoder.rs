//! Tabular encoding
//!
//! Renders the analysis report as flat CSV tables, one file per table.
//! Absent values become empty cells; floats use the shortest representation
//! that round-trips.

use crate::analysis::{NormalityRow, SphericityRow, StatTestResult};
use crate::descriptive::{ConditionCount, DescriptiveStat, InterfaceOrderCount, SessionCountSummary};
use crate::error::AnalysisError;
use crate::outcome::GoalSuccessRate;
use crate::pipeline::AnalysisReport;
use crate::types::TaskMetricsRecord;
use crate::validity::{RejectedRecord, ValidityReport};
use std::path::{Path, PathBuf};
use tracing::info;

/// A named table of string cells
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// File stem, e.g. `normality_goal`
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, header: &[&str]) -> Self {
        Self {
            name: name.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name)
    }

    /// RFC 4180 CSV with `\n` line endings
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(&self.rows) {
            let fields: Vec<String> = line.iter().map(|f| escape(f)).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn num(value: f64) -> String {
    value.to_string()
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Encoder from report sections to tables
pub struct TableEncoder;

impl TableEncoder {
    /// Every table of a report, in a stable order
    pub fn encode_report(report: &AnalysisReport) -> Result<Vec<Table>, AnalysisError> {
        let mut tables = vec![
            Self::task_metrics("task_metrics_clean", &report.validity.clean)?,
            Self::task_metrics(
                "task_metrics_clean_full_participants",
                &report.full_participant_records,
            )?,
            Self::rejected("rejected_tasks", &report.rejected_sample)?,
            Self::validity_summary(&report.validity),
            Self::condition_counts("task_counts_before_cleaning", &report.counts_before_cleaning),
            Self::condition_counts("task_counts_after_cleaning", &report.counts_after_cleaning),
            Self::condition_counts(
                "task_counts_after_cleaning_full_participants",
                &report.counts_after_cleaning_full_participants,
            ),
            Self::descriptive("interface_descriptive_stats", &report.descriptive_by_condition),
            Self::descriptive(
                "interface_task_descriptive_stats",
                &report.descriptive_by_condition_and_task,
            ),
        ];

        for analysis in &report.slices {
            let slice = analysis.slice.as_str();
            tables.push(Self::normality(&format!("normality_{}", slice), &analysis.normality));
            tables.push(Self::sphericity(&format!("sphericity_{}", slice), &analysis.sphericity));
            tables.push(Self::tests(&format!("friedman_wilcoxon_{}", slice), &analysis.tests));
        }

        tables.push(Self::interface_orders(&report.interface_orders));
        tables.push(Self::session_counts(&report.session_counts));
        tables.push(Self::success_rates(&report.goal_outcome.success_rates));
        tables.push(Self::normality(
            "normality_goal_outcome",
            &report.goal_outcome.normality,
        ));
        tables.push(Self::descriptive(
            "goal_outcome_descriptive_stats",
            &report.goal_outcome.descriptive,
        ));
        tables.push(Self::tests("goal_outcome_tests", &report.goal_outcome.tests));

        Ok(tables)
    }

    /// Write tables into `dir`, creating it if needed
    pub fn write_all(tables: &[Table], dir: &Path) -> Result<Vec<PathBuf>, AnalysisError> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(tables.len());
        for table in tables {
            let path = dir.join(table.file_name());
            std::fs::write(&path, table.to_csv()).map_err(|e| {
                AnalysisError::ExportError(format!("Write {} failed: {}", path.display(), e))
            })?;
            written.push(path);
        }
        info!(tables = written.len(), dir = %dir.display(), "tables written");
        Ok(written)
    }

    pub fn task_metrics(name: &str, records: &[TaskMetricsRecord]) -> Result<Table, AnalysisError> {
        let mut table = Table::new(name, &TASK_COLUMNS);
        for record in records {
            table.push(task_row(record)?);
        }
        Ok(table)
    }

    pub fn rejected(name: &str, rejected: &[RejectedRecord]) -> Result<Table, AnalysisError> {
        let mut header = TASK_COLUMNS.to_vec();
        header.push("rejection_reasons");
        let mut table = Table::new(name, &header);
        for entry in rejected {
            let mut row = task_row(&entry.record)?;
            let reasons: Vec<&str> = entry.reasons.iter().map(|r| r.as_str()).collect();
            row.push(reasons.join(";"));
            table.push(row);
        }
        Ok(table)
    }

    pub fn validity_summary(report: &ValidityReport) -> Table {
        let mut table = Table::new("validity_summary", &["check", "count"]);
        table.push(vec!["total_tasks".to_string(), report.total().to_string()]);
        table.push(vec!["clean_tasks".to_string(), report.clean.len().to_string()]);
        table.push(vec!["rejected_tasks".to_string(), report.rejected.len().to_string()]);
        for count in &report.predicate_counts {
            table.push(vec![count.reason.as_str().to_string(), count.count.to_string()]);
        }
        table
    }

    pub fn condition_counts(name: &str, counts: &[ConditionCount]) -> Table {
        let mut table = Table::new(name, &["interface_option", "task_count"]);
        for count in counts {
            table.push(vec![count.condition.to_string(), count.count.to_string()]);
        }
        table
    }

    pub fn descriptive(name: &str, stats: &[DescriptiveStat]) -> Table {
        let mut table = Table::new(
            name,
            &["interface_option", "task_type", "metric", "mean", "std", "count"],
        );
        for stat in stats {
            table.push(vec![
                stat.condition.to_string(),
                opt(stat.task_type),
                stat.metric.to_string(),
                opt(stat.mean),
                opt(stat.std),
                stat.count.to_string(),
            ]);
        }
        table
    }

    pub fn normality(name: &str, rows: &[NormalityRow]) -> Table {
        let mut table = Table::new(
            name,
            &["metric", "interface_option", "n", "W", "p_value", "normality"],
        );
        for row in rows {
            table.push(vec![
                row.metric.to_string(),
                row.condition.to_string(),
                row.n.to_string(),
                opt(row.statistic),
                opt(row.p_value),
                row.verdict.to_string(),
            ]);
        }
        table
    }

    pub fn sphericity(name: &str, rows: &[SphericityRow]) -> Table {
        let mut table = Table::new(
            name,
            &[
                "metric",
                "n_participants",
                "n_conditions",
                "spherical",
                "W",
                "chi2",
                "dof",
                "p_value",
                "note",
            ],
        );
        for row in rows {
            table.push(vec![
                row.metric.to_string(),
                row.n_participants.to_string(),
                row.n_conditions.to_string(),
                opt(row.spherical),
                opt(row.w),
                opt(row.chi2),
                opt(row.dof),
                opt(row.p_value),
                row.note.clone(),
            ]);
        }
        table
    }

    pub fn tests(name: &str, rows: &[StatTestResult]) -> Table {
        let mut table = Table::new(
            name,
            &[
                "metric",
                "test",
                "comparison",
                "n",
                "statistic",
                "p_uncorrected",
                "correction",
                "p_corrected",
                "significant",
                "note",
            ],
        );
        for row in rows {
            table.push(vec![
                row.metric.to_string(),
                row.test.clone(),
                opt(row.condition_pair),
                row.n.to_string(),
                opt(row.statistic),
                opt(row.p_value),
                row.correction_method.clone().unwrap_or_default(),
                opt(row.corrected_p),
                opt(row.significant),
                row.note.clone().unwrap_or_default(),
            ]);
        }
        table
    }

    pub fn interface_orders(counts: &[InterfaceOrderCount]) -> Table {
        let mut table = Table::new("interface_order_count", &["interface_order", "count"]);
        for count in counts {
            table.push(vec![count.interface_order.join(", "), count.count.to_string()]);
        }
        table
    }

    pub fn session_counts(summary: &SessionCountSummary) -> Table {
        let mut table = Table::new("session_counts_summary", &["dataset", "session_count"]);
        table.push(vec![
            "raw_sessions".to_string(),
            summary.raw_sessions.to_string(),
        ]);
        table.push(vec![
            "clean_sessions".to_string(),
            summary.clean_sessions.to_string(),
        ]);
        table.push(vec![
            "full_participant_sessions".to_string(),
            summary.full_participant_sessions.to_string(),
        ]);
        table
    }

    pub fn success_rates(rates: &[GoalSuccessRate]) -> Table {
        let mut table = Table::new(
            "goal_success_rates",
            &["interface_option", "tasks", "price_ok", "distance_ok", "feature_ok", "all_ok"],
        );
        for rate in rates {
            table.push(vec![
                rate.condition.to_string(),
                rate.tasks.to_string(),
                num(rate.price_ok),
                num(rate.distance_ok),
                num(rate.feature_ok),
                num(rate.all_ok),
            ]);
        }
        table
    }
}

const TASK_COLUMNS: [&str; 12] = [
    "session_id",
    "step_id",
    "interface_option",
    "task_type",
    "task_completion_time_sec",
    "total_interactions",
    "total_navigations",
    "total_filters",
    "total_resets",
    "total_hovers",
    "total_scrolls",
    "selected_outcome",
];

fn task_row(record: &TaskMetricsRecord) -> Result<Vec<String>, AnalysisError> {
    let outcome = match &record.selected_outcome {
        Some(outcome) => serde_json::to_string(outcome)?,
        None => String::new(),
    };
    Ok(vec![
        record.session_id.clone(),
        record.step_id.clone(),
        record.interface_condition.to_string(),
        record.task_type.to_string(),
        opt(record.completion_time_seconds),
        record.total_interactions.to_string(),
        record.total_navigations.to_string(),
        record.total_filters.to_string(),
        record.total_resets.to_string(),
        record.total_hovers.to_string(),
        record.total_scrolls.to_string(),
        outcome,
    ])
}
