//! Core data types for UX Metrics
//!
//! These types flow through the reduction and analysis pipeline:
//! task events → `TaskMetricsRecord` → validity partition → aggregated
//! observations → statistical results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Interface condition compared by the study
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// List-based benchmark interface
    Benchmark,
    /// Single-directional carousel
    Single,
    /// Multi-directional carousel
    Multi,
}

impl Condition {
    /// All conditions in canonical column order
    pub const ALL: [Condition; 3] = [Condition::Benchmark, Condition::Single, Condition::Multi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Benchmark => "benchmark",
            Condition::Single => "single",
            Condition::Multi => "multi",
        }
    }

    /// Parse an `interfaceOption` value. Unknown or empty values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "benchmark" => Some(Condition::Benchmark),
            "single" => Some(Condition::Single),
            "multi" => Some(Condition::Multi),
            _ => None,
        }
    }

    /// Every unordered pair of conditions, in canonical order
    pub fn pairs() -> [ConditionPair; 3] {
        [
            ConditionPair(Condition::Benchmark, Condition::Single),
            ConditionPair(Condition::Benchmark, Condition::Multi),
            ConditionPair(Condition::Single, Condition::Multi),
        ]
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unordered pair of conditions compared by a post-hoc test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionPair(pub Condition, pub Condition);

impl fmt::Display for ConditionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.0, self.1)
    }
}

/// Analysable task types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Open-ended browsing task
    Exploratory,
    /// Task with explicit price/distance/feature criteria
    Goal,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Exploratory => "exploratory",
            TaskType::Goal => "goal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exploratory" => Some(TaskType::Exploratory),
            "goal" => Some(TaskType::Goal),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Population slice a statistical analysis runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slice {
    AllTasks,
    Exploratory,
    Goal,
}

impl Slice {
    /// Slices in reporting order
    pub const ALL: [Slice; 3] = [Slice::AllTasks, Slice::Exploratory, Slice::Goal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slice::AllTasks => "all_tasks",
            Slice::Exploratory => "exploratory",
            Slice::Goal => "goal",
        }
    }

    /// Whether a record of the given task type belongs to this slice
    pub fn includes(&self, task_type: TaskType) -> bool {
        match self {
            Slice::AllTasks => true,
            Slice::Exploratory => task_type == TaskType::Exploratory,
            Slice::Goal => task_type == TaskType::Goal,
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes of the item a participant committed to (the booked accommodation)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Distance to the city centre in km
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    /// Keys not covered above, kept for the exported table
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SelectedOutcome {
    /// Build an outcome from a detail payload.
    ///
    /// JSON `null` means nothing was committed. Payloads that do not match the
    /// typed schema are kept opaquely under the `raw` key.
    pub fn from_detail(value: &serde_json::Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        match serde_json::from_value::<SelectedOutcome>(value.clone()) {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                let mut extra = BTreeMap::new();
                extra.insert("raw".to_string(), value.clone());
                Some(SelectedOutcome {
                    extra,
                    ..Default::default()
                })
            }
        }
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Rating per currency unit; absent when price is missing or zero
    pub fn rating_per_euro(&self) -> Option<f64> {
        match (self.rating, self.price) {
            (Some(rating), Some(price)) if price != 0.0 => Some(rating / price),
            _ => None,
        }
    }
}

/// Metrics derived from one task's event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetricsRecord {
    pub session_id: String,
    pub step_id: String,
    pub interface_condition: Condition,
    pub task_type: TaskType,
    /// `taskEnd - taskStart` in seconds; absent when either is missing
    pub completion_time_seconds: Option<f64>,
    /// click + scroll + arrowClick + arrowKeyDown
    pub total_interactions: u32,
    pub total_navigations: u32,
    pub total_filters: u32,
    pub total_resets: u32,
    pub total_hovers: u32,
    /// scroll + arrowClick + arrowKeyDown
    pub total_scrolls: u32,
    pub selected_outcome: Option<SelectedOutcome>,
}

/// A metric that can be extracted from a task record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[serde(rename = "task_completion_time_sec")]
    CompletionTime,
    TotalInteractions,
    TotalNavigations,
    TotalFilters,
    TotalResets,
    TotalHovers,
    TotalScrolls,
    Price,
    Rating,
    Distance,
    RatingPerEuro,
}

impl Metric {
    /// Behavioural metrics, in reporting order
    pub const BEHAVIOURAL: [Metric; 7] = [
        Metric::CompletionTime,
        Metric::TotalInteractions,
        Metric::TotalNavigations,
        Metric::TotalFilters,
        Metric::TotalResets,
        Metric::TotalHovers,
        Metric::TotalScrolls,
    ];

    /// Outcome-quality metrics read from the selected outcome
    pub const OUTCOME: [Metric; 4] = [
        Metric::Price,
        Metric::Rating,
        Metric::Distance,
        Metric::RatingPerEuro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::CompletionTime => "task_completion_time_sec",
            Metric::TotalInteractions => "total_interactions",
            Metric::TotalNavigations => "total_navigations",
            Metric::TotalFilters => "total_filters",
            Metric::TotalResets => "total_resets",
            Metric::TotalHovers => "total_hovers",
            Metric::TotalScrolls => "total_scrolls",
            Metric::Price => "price",
            Metric::Rating => "rating",
            Metric::Distance => "distance",
            Metric::RatingPerEuro => "rating_per_euro",
        }
    }

    /// Extract this metric from a record; `None` when the value is absent
    pub fn value(&self, record: &TaskMetricsRecord) -> Option<f64> {
        let outcome = record.selected_outcome.as_ref();
        match self {
            Metric::CompletionTime => record.completion_time_seconds,
            Metric::TotalInteractions => Some(f64::from(record.total_interactions)),
            Metric::TotalNavigations => Some(f64::from(record.total_navigations)),
            Metric::TotalFilters => Some(f64::from(record.total_filters)),
            Metric::TotalResets => Some(f64::from(record.total_resets)),
            Metric::TotalHovers => Some(f64::from(record.total_hovers)),
            Metric::TotalScrolls => Some(f64::from(record.total_scrolls)),
            Metric::Price => outcome.and_then(|o| o.price),
            Metric::Rating => outcome.and_then(|o| o.rating),
            Metric::Distance => outcome.and_then(|o| o.distance),
            Metric::RatingPerEuro => outcome.and_then(|o| o.rating_per_euro()),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
