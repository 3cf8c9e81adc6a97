//! Descriptive statistics and study overview counts

use crate::schema::StudySession;
use crate::types::{Condition, Metric, TaskMetricsRecord, TaskType};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeSet;

/// Mean, sample standard deviation and count of one metric in one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStat {
    pub condition: Condition,
    /// Absent for the per-condition grouping
    pub task_type: Option<TaskType>,
    pub metric: Metric,
    pub mean: Option<f64>,
    /// Sample standard deviation (ddof = 1); absent below two values
    pub std: Option<f64>,
    pub count: usize,
}

/// Task count of one condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCount {
    pub condition: Condition,
    pub count: usize,
}

/// How many sessions saw one interface order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceOrderCount {
    pub interface_order: Vec<String>,
    pub count: usize,
}

/// Session counts at each stage of cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCountSummary {
    pub raw_sessions: usize,
    pub clean_sessions: usize,
    pub full_participant_sessions: usize,
}

/// Descriptive statistics calculator
pub struct DescriptiveStats;

impl DescriptiveStats {
    /// Stats per condition, in canonical condition order then metric order
    pub fn by_condition(records: &[TaskMetricsRecord], metrics: &[Metric]) -> Vec<DescriptiveStat> {
        Condition::ALL
            .iter()
            .flat_map(|&condition| {
                let group: Vec<&TaskMetricsRecord> = records
                    .iter()
                    .filter(|r| r.interface_condition == condition)
                    .collect();
                group_stats(condition, None, &group, metrics)
            })
            .collect()
    }

    /// Stats per (condition, task type)
    pub fn by_condition_and_task(
        records: &[TaskMetricsRecord],
        metrics: &[Metric],
    ) -> Vec<DescriptiveStat> {
        let mut stats = Vec::new();
        for &condition in &Condition::ALL {
            for task_type in [TaskType::Exploratory, TaskType::Goal] {
                let group: Vec<&TaskMetricsRecord> = records
                    .iter()
                    .filter(|r| r.interface_condition == condition && r.task_type == task_type)
                    .collect();
                stats.extend(group_stats(condition, Some(task_type), &group, metrics));
            }
        }
        stats
    }

    /// Record counts per condition; every condition is listed
    pub fn condition_counts(records: &[TaskMetricsRecord]) -> Vec<ConditionCount> {
        Condition::ALL
            .iter()
            .map(|&condition| ConditionCount {
                condition,
                count: records
                    .iter()
                    .filter(|r| r.interface_condition == condition)
                    .count(),
            })
            .collect()
    }

    /// Sessions per interface order, in order of first appearance
    pub fn interface_order_counts(sessions: &[StudySession]) -> Vec<InterfaceOrderCount> {
        let mut counts: Vec<InterfaceOrderCount> = Vec::new();
        for order in sessions.iter().filter_map(|s| s.interface_order.as_ref()) {
            match counts.iter_mut().find(|c| &c.interface_order == order) {
                Some(existing) => existing.count += 1,
                None => counts.push(InterfaceOrderCount {
                    interface_order: order.clone(),
                    count: 1,
                }),
            }
        }
        counts
    }

    pub fn session_counts(
        sessions: &[StudySession],
        clean: &[TaskMetricsRecord],
        full_participants: &[TaskMetricsRecord],
    ) -> SessionCountSummary {
        SessionCountSummary {
            raw_sessions: sessions.len(),
            clean_sessions: distinct_sessions(clean),
            full_participant_sessions: distinct_sessions(full_participants),
        }
    }
}

fn distinct_sessions(records: &[TaskMetricsRecord]) -> usize {
    records
        .iter()
        .map(|r| r.session_id.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Empty groups are not reported
fn group_stats(
    condition: Condition,
    task_type: Option<TaskType>,
    group: &[&TaskMetricsRecord],
    metrics: &[Metric],
) -> Vec<DescriptiveStat> {
    if group.is_empty() {
        return Vec::new();
    }

    metrics
        .iter()
        .map(|&metric| {
            let values: Vec<f64> = group.iter().filter_map(|r| metric.value(r)).collect();
            let count = values.len();
            DescriptiveStat {
                condition,
                task_type,
                metric,
                mean: (count > 0).then(|| values.iter().mean()),
                std: (count > 1).then(|| values.iter().std_dev()),
                count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SelectedOutcome;
    use pretty_assertions::assert_eq;

    fn record(session: &str, condition: Condition, task_type: TaskType, time: f64) -> TaskMetricsRecord {
        TaskMetricsRecord {
            session_id: session.to_string(),
            step_id: format!("{}-{}", condition, time),
            interface_condition: condition,
            task_type,
            completion_time_seconds: Some(time),
            total_interactions: 2,
            total_navigations: 0,
            total_filters: 0,
            total_resets: 0,
            total_hovers: 0,
            total_scrolls: 1,
            selected_outcome: Some(SelectedOutcome {
                price: Some(time * 2.0),
                ..Default::default()
            }),
        }
    }

    fn session(id: &str, order: Option<&[&str]>) -> StudySession {
        StudySession {
            session_id: id.to_string(),
            completed_study: true,
            interface_order: order.map(|o| o.iter().map(|s| s.to_string()).collect()),
            tasks: vec![],
        }
    }

    #[test]
    fn test_by_condition() {
        let records = vec![
            record("a", Condition::Benchmark, TaskType::Goal, 10.0),
            record("b", Condition::Benchmark, TaskType::Goal, 20.0),
            record("c", Condition::Benchmark, TaskType::Exploratory, 30.0),
            record("a", Condition::Multi, TaskType::Goal, 40.0),
        ];

        let stats = DescriptiveStats::by_condition(&records, &[Metric::CompletionTime]);
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].condition, Condition::Benchmark);
        assert_eq!(stats[0].count, 3);
        assert!((stats[0].mean.unwrap() - 20.0).abs() < 1e-12);
        assert!((stats[0].std.unwrap() - 10.0).abs() < 1e-12);

        assert_eq!(stats[1].condition, Condition::Multi);
        assert_eq!(stats[1].count, 1);
        assert_eq!(stats[1].std, None);
    }

    #[test]
    fn test_by_condition_and_task() {
        let records = vec![
            record("a", Condition::Single, TaskType::Goal, 10.0),
            record("a", Condition::Single, TaskType::Exploratory, 50.0),
            record("b", Condition::Single, TaskType::Goal, 30.0),
        ];

        let stats = DescriptiveStats::by_condition_and_task(&records, &[Metric::Price]);
        let keys: Vec<(Option<TaskType>, usize)> = stats.iter().map(|s| (s.task_type, s.count)).collect();
        assert_eq!(
            keys,
            vec![(Some(TaskType::Exploratory), 1), (Some(TaskType::Goal), 2)]
        );
        assert!((stats[1].mean.unwrap() - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_condition_counts_list_every_condition() {
        let records = vec![
            record("a", Condition::Multi, TaskType::Goal, 10.0),
            record("a", Condition::Multi, TaskType::Goal, 12.0),
        ];

        let counts = DescriptiveStats::condition_counts(&records);
        assert_eq!(
            counts,
            vec![
                ConditionCount { condition: Condition::Benchmark, count: 0 },
                ConditionCount { condition: Condition::Single, count: 0 },
                ConditionCount { condition: Condition::Multi, count: 2 },
            ]
        );
    }

    #[test]
    fn test_interface_order_counts() {
        let abc: &[&str] = &["benchmark", "single", "multi"];
        let cba: &[&str] = &["multi", "single", "benchmark"];
        let sessions = vec![
            session("s1", Some(cba)),
            session("s2", Some(abc)),
            session("s3", None),
            session("s4", Some(cba)),
        ];

        let counts = DescriptiveStats::interface_order_counts(&sessions);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].interface_order, vec!["multi", "single", "benchmark"]);
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].count, 1);
    }

    #[test]
    fn test_session_counts() {
        let sessions = vec![session("a", None), session("b", None), session("c", None)];
        let clean = vec![
            record("a", Condition::Single, TaskType::Goal, 10.0),
            record("a", Condition::Multi, TaskType::Goal, 10.0),
            record("b", Condition::Multi, TaskType::Goal, 10.0),
        ];
        let full = vec![clean[0].clone()];

        let summary = DescriptiveStats::session_counts(&sessions, &clean, &full);
        assert_eq!(
            summary,
            SessionCountSummary {
                raw_sessions: 3,
                clean_sessions: 2,
                full_participant_sessions: 1,
            }
        );
    }
}
