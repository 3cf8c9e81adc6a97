//! UX Metrics - interaction log reduction and repeated-measures analysis for UX studies
//!
//! Turns the event logs of a within-subjects interface study into per-task
//! metrics and compares the interface conditions through a deterministic
//! pipeline: event reduction → validity filtering → completeness selection
//! → aggregation → normality, sphericity, omnibus and post-hoc testing.
//!
//! ## Modules
//!
//! - **Reduction**: study export adapter and per-task event reducer
//! - **Cleaning**: validity filter and full-participant selection
//! - **Statistics**: swappable repeated-measures engine (Friedman, Wilcoxon, Holm)
//!   plus Shapiro–Wilk and Mauchly diagnostics
//! - **Reporting**: descriptive tables, goal outcome analysis and CSV encoding

pub mod aggregate;
pub mod analysis;
pub mod completeness;
pub mod config;
pub mod descriptive;
pub mod encoder;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod reducer;
pub mod schema;
pub mod stats;
pub mod types;
pub mod validity;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, StatsError};
pub use pipeline::{analyze_study, audit_study, extract_task_metrics, AnalysisReport, StudyProcessor};

// Statistics exports
pub use analysis::StatisticalPipeline;
pub use stats::{NonParametricEngine, RepeatedMeasuresEngine};

/// Crate version reported by the CLI
pub const UX_METRICS_VERSION: &str = env!("CARGO_PKG_VERSION");
