//! Error type shared by every fallible operation in the crate.
//!
//! Errors fall into a small taxonomy:
//!
//! - **Configuration** ([`StatsError::InvalidOption`], [`StatsError::UnsupportedGenerator`])
//!   is raised synchronously, before any batch is read.
//! - **Schema queries** ([`StatsError::FeatureNotFound`], [`StatsError::NoDomain`], ...)
//!   come from the [`schema`](crate::schema) collaborator.
//! - **Integrity** ([`StatsError::Integrity`], [`StatsError::MissingExampleCount`]) stops
//!   output assembly when partial results contradict each other.
//!
//! Data-shape anomalies inside a batch (a wrong value type, undecodable bytes) are never
//! errors: generators invalidate their own accumulator or substitute a sentinel and log.

use crate::types::FeaturePath;
use arrow::error::ArrowError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = StatsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StatsError {
    /// A configuration value is outside its valid range.
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption { option: &'static str, reason: String },

    /// A generator cannot run in the requested execution context.
    #[error("statistics generator `{name}` is not supported {context}")]
    UnsupportedGenerator { name: String, context: String },

    #[error("feature {0} not found in the schema")]
    FeatureNotFound(FeaturePath),

    #[error("feature {0} has no domain associated with it")]
    NoDomain(FeaturePath),

    #[error("step {step} in feature {path} does not refer to a valid STRUCT feature")]
    NotAStruct { step: String, path: FeaturePath },

    #[error("invalid domain for feature {path}: {reason}")]
    InvalidDomain { path: FeaturePath, reason: String },

    /// A column required by the configuration is absent from a batch.
    #[error("column `{0}` is missing from the input batch")]
    MissingColumn(String),

    #[error("invalid weight feature `{feature}`: {reason}")]
    InvalidWeight { feature: String, reason: String },

    /// More non-missing values than examples were reported for a feature.
    #[error(
        "total number of examples: {num_examples} is less than number of non missing examples: \
         {num_non_missing} for feature {feature}"
    )]
    Integrity {
        feature: FeaturePath,
        num_examples: u64,
        num_non_missing: u64,
    },

    #[error("no example count was produced for slice `{0}`")]
    MissingExampleCount(String),

    /// A type-erased accumulator was handed to the wrong generator.
    #[error("accumulator type mismatch in generator `{0}`")]
    AccumulatorMismatch(String),

    #[error("expected {expected} dataset(s) in the statistics list, found {found}")]
    SliceCount { expected: usize, found: usize },

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StatsError {
    pub(crate) fn invalid_option(option: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option,
            reason: reason.into(),
        }
    }
}
