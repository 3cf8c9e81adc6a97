//! Study export schema definition
//!
//! The study backend exports one document per run:
//! `__collections__ → <collection> → <session> → __collections__ → steps → <step>`.
//! Each step carries its task metadata and the ordered interaction log.
//!
//! Raw events are free-form (`type`, `timestamp`, `details`). They are mapped
//! onto the closed [`TaskEvent`] set before reduction; kinds the pipeline does
//! not recognise become [`TaskEvent::Ignored`] and details that do not match
//! the expected shape degrade to absent fields.

use crate::types::SelectedOutcome;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Default name of the collection holding study sessions
pub const DEFAULT_COLLECTION: &str = "multi-carousel-study";

/// Click target of the control that commits to an item
pub const BOOK_TARGET: &str = "bookNowButton";

/// Navigation destinations
pub const NAV_RESULTS: &str = "resultsPage";
pub const NAV_DETAIL: &str = "detailView";
pub const NAV_REFRESH: &str = "pageRefresh";

/// Step task type marking a survey
pub const SURVEY_TASK: &str = "survey";

/// Top-level study export document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyExport {
    /// Collections keyed by name. Only the study collection is interpreted.
    #[serde(rename = "__collections__", default)]
    pub collections: BTreeMap<String, serde_json::Value>,
}

/// One participant session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSession {
    #[serde(rename = "__collections__", default)]
    pub collections: RawSessionCollections,
}

/// Sub-collections of a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSessionCollections {
    /// Steps keyed by id; a step that is not an object is dropped
    #[serde(default, deserialize_with = "lenient_steps")]
    pub steps: BTreeMap<String, RawStep>,
}

/// One study step (task, survey, intro, ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStep {
    #[serde(rename = "taskType", default, deserialize_with = "lenient_string")]
    pub task_type: Option<String>,
    #[serde(rename = "interfaceOption", default, deserialize_with = "lenient_string")]
    pub interface_option: Option<String>,
    /// Condition order the participant was assigned
    #[serde(rename = "interfaceOrder", default, deserialize_with = "lenient_string_list")]
    pub interface_order: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_events")]
    pub events: Vec<RawEvent>,
}

impl RawStep {
    /// Whether this step is the final, unconditioned survey
    pub fn is_final_survey(&self) -> bool {
        self.task_type.as_deref() == Some(SURVEY_TASK)
            && self
                .interface_option
                .as_deref()
                .map_or(true, |option| option.is_empty())
    }
}

/// A logged interaction event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event kind (`taskStart`, `click`, `filterApply`, ...)
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: String,
    /// Milliseconds since epoch
    #[serde(default, deserialize_with = "lenient_millis")]
    pub timestamp: Option<i64>,
    /// Free-form detail mapping
    #[serde(default)]
    pub details: serde_json::Value,
}

impl RawEvent {
    pub fn new(kind: impl Into<String>, timestamp: i64) -> Self {
        Self {
            kind: kind.into(),
            timestamp: Some(timestamp),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Accept integer or fractional millisecond timestamps; anything else is absent
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite()).map(|v| v as i64)))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_owned))
}

/// Non-string kinds become empty and classify as ignored
fn lenient_kind<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// Keep the string entries of an array; anything else is absent
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_array().map(|items| {
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect()
    }))
}

/// Events that are not objects are dropped; a non-array log is empty
fn lenient_events<'de, D>(deserializer: D) -> Result<Vec<RawEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn lenient_steps<'de, D>(deserializer: D) -> Result<BTreeMap<String, RawStep>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Object(entries) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(step_id, step)| match serde_json::from_value(step) {
            Ok(step) => Some((step_id, step)),
            Err(e) => {
                warn!(step = %step_id, error = %e, "skipping malformed step");
                None
            }
        })
        .collect())
}

#[derive(Debug, Default, Deserialize)]
struct ClickDetails {
    #[serde(rename = "targetType", default)]
    target_type: Option<String>,
    #[serde(default)]
    accommodation: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct NavigationDetails {
    #[serde(default)]
    to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterStepDetails {
    #[serde(rename = "goTo", default)]
    go_to: Option<serde_json::Value>,
}

fn details_as<T: DeserializeOwned + Default>(details: &serde_json::Value) -> T {
    serde_json::from_value(details.clone()).unwrap_or_default()
}

/// What a click landed on
#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
    /// The commit control, with the payload of the item committed to
    Book(Option<SelectedOutcome>),
    Other,
}

/// Where a navigation event went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTarget {
    Results,
    Detail,
    Refresh,
    Other,
}

/// Recognised event kinds with their typed details
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    TaskStart(Option<i64>),
    TaskEnd(Option<i64>),
    Click(ClickTarget),
    Scroll,
    ArrowClick,
    ArrowKeyDown,
    Navigation(NavigationTarget),
    FilterApply,
    /// History step; `go_back` marks an implicit reset to an earlier state
    FilterStep { go_back: bool },
    FilterReset,
    FilterResetAll,
    Hover,
    /// Any kind the pipeline does not interpret
    Ignored,
}

impl TaskEvent {
    /// Classify a raw event. Never fails.
    pub fn from_raw(event: &RawEvent) -> Self {
        match event.kind.as_str() {
            "taskStart" => TaskEvent::TaskStart(event.timestamp),
            "taskEnd" => TaskEvent::TaskEnd(event.timestamp),
            "click" => {
                let details: ClickDetails = details_as(&event.details);
                if details.target_type.as_deref() == Some(BOOK_TARGET) {
                    let outcome = details
                        .accommodation
                        .as_ref()
                        .and_then(SelectedOutcome::from_detail);
                    TaskEvent::Click(ClickTarget::Book(outcome))
                } else {
                    TaskEvent::Click(ClickTarget::Other)
                }
            }
            "scroll" => TaskEvent::Scroll,
            "arrowClick" => TaskEvent::ArrowClick,
            "arrowKeyDown" => TaskEvent::ArrowKeyDown,
            "navigation" => {
                let details: NavigationDetails = details_as(&event.details);
                let target = match details.to.as_deref() {
                    Some(NAV_RESULTS) => NavigationTarget::Results,
                    Some(NAV_DETAIL) => NavigationTarget::Detail,
                    Some(NAV_REFRESH) => NavigationTarget::Refresh,
                    _ => NavigationTarget::Other,
                };
                TaskEvent::Navigation(target)
            }
            "filterApply" => TaskEvent::FilterApply,
            "filterStep" => {
                let details: FilterStepDetails = details_as(&event.details);
                let go_back = matches!(details.go_to, Some(serde_json::Value::Bool(true)));
                TaskEvent::FilterStep { go_back }
            }
            "filterReset" => TaskEvent::FilterReset,
            "filterResetAll" => TaskEvent::FilterResetAll,
            "hover" => TaskEvent::Hover,
            _ => TaskEvent::Ignored,
        }
    }

    /// click, scroll, arrowClick and arrowKeyDown
    pub fn is_interaction(&self) -> bool {
        matches!(
            self,
            TaskEvent::Click(_) | TaskEvent::Scroll | TaskEvent::ArrowClick | TaskEvent::ArrowKeyDown
        )
    }

    /// Interactions that move the visible window
    pub fn is_scroll(&self) -> bool {
        matches!(
            self,
            TaskEvent::Scroll | TaskEvent::ArrowClick | TaskEvent::ArrowKeyDown
        )
    }
}
