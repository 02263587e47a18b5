//! Error types for the vector crate.

use thiserror::Error;

/// Errors that can occur in vector, graph and model-file operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Dimension mismatch between a vector and the index it is used with.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The expected dimension.
        expected: usize,
        /// The actual dimension.
        actual: usize,
    },

    /// Invalid dimension (e.g., zero).
    #[error("invalid dimension: expected at least {expected}, got {actual}")]
    InvalidDimension {
        /// The minimum expected dimension.
        expected: usize,
        /// The actual dimension.
        actual: usize,
    },

    /// Invalid value in a vector (NaN, Infinity).
    #[error("invalid value at index {index}: {value} - {reason}")]
    InvalidValue {
        /// The index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f32,
        /// The reason the value is invalid.
        reason: &'static str,
    },

    /// Invalid index configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record not found, tombstoned, or out of range.
    #[error("not found: {0}")]
    NotFound(String),

    /// A capacity limit was reached.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A model file is corrupt, truncated, or has an unsupported version.
    #[error("model format error: {0}")]
    Format(String),

    /// A model file is well formed but does not match what the caller expects.
    #[error("model mismatch on {field}: expected {expected}, found {found}")]
    ModelMismatch {
        /// The header field that disagreed.
        field: &'static str,
        /// The value the caller configured.
        expected: String,
        /// The value stored in the file.
        found: String,
    },

    /// I/O error while reading or writing a model file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for vector operations.
pub type Result<T> = std::result::Result<T, VectorError>;

impl VectorError {
    /// Shorthand for a [`VectorError::Format`] error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Shorthand for a [`VectorError::NotFound`] error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
