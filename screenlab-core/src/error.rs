//! Error types for model construction, row ingestion and scanning.
//!
//! - `ConfigError`: a model definition is invalid. Fatal for that model only.
//! - `DataRowError`: a single row cannot be scored. The row is skipped.
//! - `ScanError`: a dataset cannot be scanned by a model at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a model from its definition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to parse model definition: {0}")]
    Parse(String),

    #[error("{context}: weights sum to {sum:.4}, expected 1.0")]
    WeightSum { context: String, sum: f64 },

    #[error("{context}: weight {weight} is not a finite non-negative number")]
    InvalidWeight { context: String, weight: f64 },

    #[error("bucket table for '{metric}' is empty")]
    EmptyTable { metric: String },

    #[error("bucket table for '{metric}': bucket [{lower}, {upper}) is empty or inverted")]
    InvertedBucket { metric: String, lower: f64, upper: f64 },

    #[error("bucket table for '{metric}': gap between {upper} and {next_lower}")]
    BucketGap {
        metric: String,
        upper: f64,
        next_lower: f64,
    },

    #[error("bucket table for '{metric}': overlap between {upper} and {next_lower}")]
    BucketOverlap {
        metric: String,
        upper: f64,
        next_lower: f64,
    },

    #[error("bucket table for '{metric}' does not cover values {side} {edge}")]
    Uncovered {
        metric: String,
        side: &'static str,
        edge: f64,
    },

    #[error("{context}: score {score} outside [0, 100]")]
    ScoreOutOfRange { context: String, score: f64 },

    #[error("unknown metric '{metric}' referenced by {context}")]
    UnknownMetric { metric: String, context: String },

    #[error("unknown flag tag '{0}' (no category in taxonomy and none declared)")]
    UnknownFlag(String),

    #[error("warning flag '{0}' cannot be assigned a category")]
    WarningCategory(String),

    #[error("invalid condition '{source_text}': {reason}")]
    InvalidCondition { source_text: String, reason: String },

    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("component '{0}' needs either terms or a base score, not both or neither")]
    ComponentShape(String),

    #[error("model has no components")]
    NoComponents,
}

/// Why a single row was excluded from a model's result.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum DataRowError {
    #[error("row {line}: empty ticker")]
    EmptyTicker { line: usize },

    #[error("duplicate ticker '{ticker}'")]
    DuplicateTicker { ticker: String },

    #[error("ticker '{ticker}': malformed value '{raw}' in '{metric}'")]
    Malformed {
        ticker: String,
        metric: String,
        raw: String,
    },

    #[error("ticker '{ticker}': required metric '{metric}' is missing")]
    MissingRequired { ticker: String, metric: String },
}

/// Errors that prevent a model from scanning a dataset.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScanError {
    #[error("dataset '{dataset}' lacks required columns: {}", .missing.join(", "))]
    MissingColumns {
        dataset: String,
        missing: Vec<String>,
    },
}
