//! Task event reduction
//!
//! Folds one task's ordered event log into a single [`TaskMetricsRecord`].
//! The reduction is a pure single pass: counters accumulate in a local value
//! and the record is built once at the end.

use crate::schema::{ClickTarget, NavigationTarget, StudySession, TaskEvent, TaskInput};
use crate::types::{SelectedOutcome, TaskMetricsRecord};
use tracing::warn;

/// Reducer turning task event logs into metrics records
pub struct EventReducer;

impl EventReducer {
    /// Reduce one task. Never fails; missing start/end yields no completion time.
    pub fn reduce(task: &TaskInput) -> TaskMetricsRecord {
        let acc = task
            .events
            .iter()
            .fold(TaskAccumulator::default(), TaskAccumulator::apply);

        if acc.start_events > 1 || acc.end_events > 1 {
            warn!(
                session = %task.session_id,
                step = %task.step_id,
                starts = acc.start_events,
                ends = acc.end_events,
                "repeated task boundary events, keeping the last occurrence"
            );
        }

        let completion_time_seconds = match (acc.start_time, acc.end_time) {
            (Some(start), Some(end)) => Some((end as f64 - start as f64) / 1000.0),
            _ => None,
        };

        TaskMetricsRecord {
            session_id: task.session_id.clone(),
            step_id: task.step_id.clone(),
            interface_condition: task.condition,
            task_type: task.task_type,
            completion_time_seconds,
            total_interactions: acc.interactions,
            total_navigations: acc.navigations,
            total_filters: acc.filters,
            total_resets: acc.resets,
            total_hovers: acc.hovers,
            total_scrolls: acc.scrolls,
            selected_outcome: acc.selected_outcome,
        }
    }

    /// Reduce every task of every session, in session then step order
    pub fn reduce_sessions(sessions: &[StudySession]) -> Vec<TaskMetricsRecord> {
        sessions
            .iter()
            .flat_map(|session| session.tasks.iter().map(Self::reduce))
            .collect()
    }
}

#[derive(Debug, Default)]
struct TaskAccumulator {
    start_time: Option<i64>,
    end_time: Option<i64>,
    start_events: u32,
    end_events: u32,
    interactions: u32,
    navigations: u32,
    filters: u32,
    resets: u32,
    hovers: u32,
    scrolls: u32,
    selected_outcome: Option<SelectedOutcome>,
}

impl TaskAccumulator {
    fn apply(mut self, event: &TaskEvent) -> Self {
        if event.is_interaction() {
            self.interactions += 1;
        }
        if event.is_scroll() {
            self.scrolls += 1;
        }

        match event {
            // Last occurrence wins
            TaskEvent::TaskStart(timestamp) => {
                self.start_time = *timestamp;
                self.start_events += 1;
            }
            TaskEvent::TaskEnd(timestamp) => {
                self.end_time = *timestamp;
                self.end_events += 1;
            }
            TaskEvent::Click(ClickTarget::Book(outcome)) => {
                self.selected_outcome = outcome.clone();
            }
            TaskEvent::Navigation(NavigationTarget::Results | NavigationTarget::Detail) => {
                self.navigations += 1;
            }
            TaskEvent::Navigation(NavigationTarget::Refresh) => {
                self.resets += 1;
            }
            TaskEvent::FilterApply => {
                self.filters += 1;
            }
            TaskEvent::FilterStep { go_back } => {
                self.filters += 1;
                if *go_back {
                    self.resets += 1;
                }
            }
            TaskEvent::FilterReset | TaskEvent::FilterResetAll => {
                self.filters += 1;
                self.resets += 1;
            }
            TaskEvent::Hover => {
                self.hovers += 1;
            }
            TaskEvent::Click(ClickTarget::Other)
            | TaskEvent::Scroll
            | TaskEvent::ArrowClick
            | TaskEvent::ArrowKeyDown
            | TaskEvent::Navigation(NavigationTarget::Other)
            | TaskEvent::Ignored => {}
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RawEvent;
    use crate::types::{Condition, TaskType};
    use serde_json::json;

    fn task(events: Vec<RawEvent>) -> TaskInput {
        TaskInput {
            session_id: "s1".to_string(),
            step_id: "03".to_string(),
            condition: Condition::Single,
            task_type: TaskType::Goal,
            events: events.iter().map(TaskEvent::from_raw).collect(),
        }
    }

    fn book(price: f64) -> RawEvent {
        RawEvent::new("click", 0).with_details(json!({
            "targetType": "bookNowButton",
            "accommodation": {"id": format!("acc-{}", price), "price": price}
        }))
    }

    #[test]
    fn test_completion_time() {
        let record = EventReducer::reduce(&task(vec![
            RawEvent::new("taskStart", 1000),
            RawEvent::new("taskEnd", 4500),
        ]));

        assert_eq!(record.completion_time_seconds, Some(3.5));
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let record = EventReducer::reduce(&task(vec![
            RawEvent::new("taskStart", i64::MIN),
            RawEvent::new("taskEnd", i64::MAX),
        ]));

        let seconds = record.completion_time_seconds.unwrap();
        assert!(seconds.is_finite());
        assert!(seconds > 1.8e16);
    }

    #[test]
    fn test_missing_end_yields_no_completion_time() {
        let record = EventReducer::reduce(&task(vec![
            RawEvent::new("taskStart", 1000),
            RawEvent::new("click", 2000),
        ]));

        assert_eq!(record.completion_time_seconds, None);
        assert_eq!(record.total_interactions, 1);
    }

    #[test]
    fn test_last_boundary_event_wins() {
        let record = EventReducer::reduce(&task(vec![
            RawEvent::new("taskStart", 1000),
            RawEvent::new("taskStart", 2000),
            RawEvent::new("taskEnd", 5000),
            RawEvent::new("taskEnd", 12000),
        ]));

        assert_eq!(record.completion_time_seconds, Some(10.0));
    }

    #[test]
    fn test_interaction_and_scroll_counters() {
        let record = EventReducer::reduce(&task(vec![
            RawEvent::new("click", 1),
            RawEvent::new("scroll", 2),
            RawEvent::new("scroll", 3),
            RawEvent::new("arrowClick", 4),
            RawEvent::new("arrowKeyDown", 5),
            RawEvent::new("hover", 6),
        ]));

        assert_eq!(record.total_interactions, 5);
        assert_eq!(record.total_scrolls, 4);
        assert_eq!(record.total_hovers, 1);
        assert!(record.total_scrolls <= record.total_interactions);
    }

    #[test]
    fn test_navigation_and_refresh() {
        let nav = |to: &str| RawEvent::new("navigation", 0).with_details(json!({ "to": to }));
        let record = EventReducer::reduce(&task(vec![
            nav("resultsPage"),
            nav("detailView"),
            nav("detailView"),
            nav("pageRefresh"),
            nav("landing"),
        ]));

        assert_eq!(record.total_navigations, 3);
        assert_eq!(record.total_resets, 1);
        assert_eq!(record.total_interactions, 0);
    }

    #[test]
    fn test_filter_counters() {
        let record = EventReducer::reduce(&task(vec![
            RawEvent::new("filterApply", 1),
            RawEvent::new("filterApply", 2),
            RawEvent::new("filterStep", 3).with_details(json!({"goTo": true})),
            RawEvent::new("filterStep", 4).with_details(json!({"goTo": false})),
            RawEvent::new("filterReset", 5),
            RawEvent::new("filterResetAll", 6),
        ]));

        assert_eq!(record.total_filters, 6);
        assert_eq!(record.total_resets, 3);
    }

    #[test]
    fn test_last_book_click_is_selected() {
        let record = EventReducer::reduce(&task(vec![book(120.0), book(95.0)]));

        let outcome = record.selected_outcome.unwrap();
        assert_eq!(outcome.price, Some(95.0));
        assert_eq!(record.total_interactions, 2);
        assert_eq!(record.total_scrolls, 0);
    }

    #[test]
    fn test_book_click_without_payload_clears_selection() {
        let record = EventReducer::reduce(&task(vec![
            book(80.0),
            RawEvent::new("click", 0).with_details(json!({"targetType": "bookNowButton"})),
        ]));

        assert_eq!(record.selected_outcome, None);
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let record = EventReducer::reduce(&task(vec![
            RawEvent::new("mapZoom", 1),
            RawEvent::new("resize", 2).with_details(json!([1, 2])),
        ]));

        assert_eq!(record.total_interactions, 0);
        assert_eq!(record.total_filters, 0);
        assert_eq!(record.completion_time_seconds, None);
    }

    #[test]
    fn test_metadata_copied() {
        let record = EventReducer::reduce(&task(vec![]));

        assert_eq!(record.session_id, "s1");
        assert_eq!(record.step_id, "03");
        assert_eq!(record.interface_condition, Condition::Single);
        assert_eq!(record.task_type, TaskType::Goal);
    }
}
