//! Adapter from the study export to per-session task inputs
//!
//! Flattens the nested export into sessions, keeps only steps that are
//! analysable (goal or exploratory task under a known interface condition)
//! and classifies their events. Everything else a session carries that the
//! analysis needs (final-survey completion, assigned condition order) is
//! extracted here as well.

use crate::error::AnalysisError;
use crate::schema::raw_event::*;
use crate::types::{Condition, TaskType};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One analysable task with its classified event log
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInput {
    pub session_id: String,
    pub step_id: String,
    pub condition: Condition,
    pub task_type: TaskType,
    /// Events in recorded order
    pub events: Vec<TaskEvent>,
}

/// One participant session
#[derive(Debug, Clone, PartialEq)]
pub struct StudySession {
    pub session_id: String,
    /// Whether the participant reached the final, unconditioned survey
    pub completed_study: bool,
    /// Condition order assigned to the participant, as logged
    pub interface_order: Option<Vec<String>>,
    pub tasks: Vec<TaskInput>,
}

/// Adapter for converting the study export into sessions
pub struct StudyAdapter;

impl StudyAdapter {
    /// Parse a JSON study export
    pub fn parse_export(json: &str) -> Result<StudyExport, AnalysisError> {
        serde_json::from_str(json).map_err(|e| AnalysisError::ParseError(e.to_string()))
    }

    /// Extract the sessions of `collection`, ordered by session id.
    ///
    /// A session whose body does not have the expected shape is kept without
    /// steps; only a collection that is not an object is an error.
    pub fn to_sessions(
        export: &StudyExport,
        collection: &str,
    ) -> Result<Vec<StudySession>, AnalysisError> {
        let raw = export
            .collections
            .get(collection)
            .ok_or_else(|| AnalysisError::MissingCollection(collection.to_string()))?;

        let raw_sessions = raw.as_object().ok_or_else(|| {
            AnalysisError::ParseError(format!("Collection '{}' is not an object", collection))
        })?;

        let sessions: BTreeMap<&String, RawSession> = raw_sessions
            .iter()
            .map(|(session_id, value)| {
                let session = serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                    warn!(session = %session_id, error = %e, "malformed session, keeping it without steps");
                    RawSession::default()
                });
                (session_id, session)
            })
            .collect();

        Ok(sessions
            .into_iter()
            .map(|(session_id, session)| session_from_raw(session_id.clone(), session))
            .collect())
    }

    /// Parse and extract in one step
    pub fn parse_sessions(json: &str, collection: &str) -> Result<Vec<StudySession>, AnalysisError> {
        let export = Self::parse_export(json)?;
        Self::to_sessions(&export, collection)
    }
}

fn session_from_raw(session_id: String, session: RawSession) -> StudySession {
    let steps = session.collections.steps;

    let completed_study = steps.values().any(RawStep::is_final_survey);
    let interface_order = steps
        .values()
        .filter_map(|step| step.interface_order.clone())
        .find(|order| !order.is_empty());

    let mut tasks = Vec::new();
    for (step_id, step) in steps {
        let task_type = step.task_type.as_deref().and_then(TaskType::parse);
        let condition = step.interface_option.as_deref().and_then(Condition::parse);

        match (task_type, condition) {
            (Some(task_type), Some(condition)) => tasks.push(TaskInput {
                session_id: session_id.clone(),
                step_id,
                condition,
                task_type,
                events: step.events.iter().map(TaskEvent::from_raw).collect(),
            }),
            _ => debug!(session = %session_id, step = %step_id, "skipping non-analysable step"),
        }
    }

    StudySession {
        session_id,
        completed_study,
        interface_order,
        tasks,
    }
}
