//! Error types for UX Metrics

use thiserror::Error;

/// Errors that can occur while loading, reducing or exporting study data
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to parse study export: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing collection: {0}")]
    MissingCollection(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Export error: {0}")]
    ExportError(String),
}

/// Errors raised by the statistical routines.
///
/// These never abort an analysis run; the pipeline records them inline on the
/// result row of the metric, slice or pair that produced them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Data has zero range")]
    ZeroRange,

    #[error("Samples have unequal lengths ({0} vs {1})")]
    UnequalLengths(usize, usize),

    #[error("Degenerate input: {0}")]
    Degenerate(String),

    #[error("Distribution error: {0}")]
    Distribution(String),
}
