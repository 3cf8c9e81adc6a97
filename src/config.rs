//! Analysis configuration
//!
//! All thresholds of the pipeline live here. Every field has a default, so an
//! empty TOML file (or no file at all) reproduces the standard analysis.

use crate::error::AnalysisError;
use crate::schema::DEFAULT_COLLECTION;
use crate::types::Metric;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Criteria a goal task's outcome is checked against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalCriteria {
    /// Maximum price per night
    pub max_price: f64,
    /// Maximum distance to the city centre in km
    pub max_distance_km: f64,
    /// Feature the outcome must list
    pub required_feature: String,
}

impl Default for GoalCriteria {
    fn default() -> Self {
        Self {
            max_price: 100.0,
            max_distance_km: 2.0,
            required_feature: "Swimming pool".to_string(),
        }
    }
}

/// Configuration for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Export collection holding the study sessions
    pub collection: String,
    /// Significance threshold for omnibus and corrected post-hoc tests
    pub alpha: f64,
    /// Shortest plausible completion time in seconds (inclusive)
    pub min_duration_sec: f64,
    /// Longest plausible completion time in seconds (inclusive)
    pub max_duration_sec: f64,
    /// Clean tasks a participant needs per condition to be complete
    pub tasks_per_condition: usize,
    /// Smallest sample a normality test runs on
    pub min_normality_sample: usize,
    /// Behavioural metrics tested across conditions
    pub metrics: Vec<Metric>,
    /// Outcome-quality metrics tested on goal tasks
    pub outcome_metrics: Vec<Metric>,
    /// Number of rejected rows kept for manual inspection
    pub rejected_sample_size: usize,
    /// Run per-metric statistics on the rayon thread pool
    pub parallel: bool,
    pub goal_criteria: GoalCriteria,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            alpha: 0.05,
            min_duration_sec: 5.0,
            max_duration_sec: 1000.0,
            tasks_per_condition: 2,
            min_normality_sample: 3,
            metrics: Metric::BEHAVIOURAL.to_vec(),
            outcome_metrics: Metric::OUTCOME.to_vec(),
            rejected_sample_size: 20,
            parallel: true,
            goal_criteria: GoalCriteria::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(toml_str: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = toml::from_str(toml_str)
            .map_err(|e| AnalysisError::ConfigError(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_toml_file(path: &Path) -> Result<Self, AnalysisError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::ConfigError(format!("Read {} failed: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, AnalysisError> {
        toml::to_string_pretty(self)
            .map_err(|e| AnalysisError::ConfigError(format!("Serialize TOML failed: {}", e)))
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(AnalysisError::ConfigError(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.min_duration_sec > self.max_duration_sec {
            return Err(AnalysisError::ConfigError(format!(
                "min_duration_sec ({}) exceeds max_duration_sec ({})",
                self.min_duration_sec, self.max_duration_sec
            )));
        }
        if self.tasks_per_condition == 0 {
            return Err(AnalysisError::ConfigError(
                "tasks_per_condition must be at least 1".to_string(),
            ));
        }
        if self.metrics.is_empty() {
            return Err(AnalysisError::ConfigError(
                "at least one metric is required".to_string(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(AnalysisError::ConfigError(
                "collection name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.metrics.len(), 7);
        assert_eq!(config.tasks_per_condition, 2);
    }

    #[test]
    fn test_partial_override() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            alpha = 0.01
            metrics = ["task_completion_time_sec", "total_resets"]

            [goal_criteria]
            max_price = 120.0
            "#,
        )
        .unwrap();

        assert_eq!(config.alpha, 0.01);
        assert_eq!(
            config.metrics,
            vec![Metric::CompletionTime, Metric::TotalResets]
        );
        assert_eq!(config.goal_criteria.max_price, 120.0);
        assert_eq!(config.goal_criteria.max_distance_km, 2.0);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AnalysisConfig::default();
        let rendered = config.to_toml_string().unwrap();
        let parsed = AnalysisConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let result = AnalysisConfig::from_toml_str(r#"metrics = ["total_clicks"]"#);
        assert!(matches!(result, Err(AnalysisError::ConfigError(_))));
    }

    #[test]
    fn test_validation() {
        let bad_alpha = AnalysisConfig {
            alpha: 1.5,
            ..Default::default()
        };
        assert!(bad_alpha.validate().is_err());

        let inverted = AnalysisConfig {
            min_duration_sec: 100.0,
            max_duration_sec: 10.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let zero_target = AnalysisConfig {
            tasks_per_condition: 0,
            ..Default::default()
        };
        assert!(zero_target.validate().is_err());

        let no_metrics = AnalysisConfig {
            metrics: vec![],
            ..Default::default()
        };
        assert!(no_metrics.validate().is_err());
    }
}
