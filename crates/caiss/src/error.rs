//! Error types for caiss.
//!
//! This module provides the [`enum@Error`] type returned by every engine operation
//! and the integer [`Status`] code that the handle boundary reports instead.

use caiss_vector::VectorError;
use thiserror::Error;

/// Errors that can occur when using caiss.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad dimensionality, unknown metric/algorithm/mode code, or a model that
    /// does not match the engine configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The handle is unknown or was destroyed.
    #[error("invalid handle: {0:#x}")]
    InvalidHandle(u64),

    /// The model file could not be read or written.
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// The model file is corrupt, truncated or of an unsupported version.
    #[error("format error: {0}")]
    Format(String),

    /// Vector length differs from the engine dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        actual: usize,
    },

    /// A vector contains a non-finite component.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The external ID is unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// A capacity limit was reached.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A worker or internal invariant failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors concern a single request; the engine is still usable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::InvalidInput(_)
                | Self::NotFound(_)
                | Self::ResourceExhausted(_)
        )
    }

    /// The boundary status code for this error.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Config(_) => Status::Config,
            Self::InvalidHandle(_) => Status::InvalidHandle,
            Self::ModelLoad(_) => Status::ModelLoad,
            Self::Format(_) => Status::Format,
            Self::DimensionMismatch { .. } => Status::DimensionMismatch,
            Self::InvalidInput(_) => Status::InvalidInput,
            Self::NotFound(_) => Status::NotFound,
            Self::ResourceExhausted(_) => Status::ResourceExhausted,
            Self::Internal(_) => Status::Internal,
        }
    }

    /// Create a config error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<VectorError> for Error {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            VectorError::InvalidDimension { .. }
            | VectorError::InvalidConfig(_)
            | VectorError::ModelMismatch { .. } => Self::Config(err.to_string()),
            VectorError::InvalidValue { .. } => Self::InvalidInput(err.to_string()),
            VectorError::NotFound(msg) => Self::NotFound(msg),
            VectorError::ResourceExhausted(msg) => Self::ResourceExhausted(msg),
            VectorError::Format(msg) => Self::Format(msg),
            VectorError::Io(e) => Self::ModelLoad(e.to_string()),
        }
    }
}

/// A specialized `Result` type for caiss operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Integer status code reported at the handle boundary. `0` is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Success.
    Ok = 0,
    /// See [`Error::Config`].
    Config = 1,
    /// See [`Error::InvalidHandle`].
    InvalidHandle = 2,
    /// See [`Error::ModelLoad`].
    ModelLoad = 3,
    /// See [`Error::Format`].
    Format = 4,
    /// See [`Error::DimensionMismatch`].
    DimensionMismatch = 5,
    /// See [`Error::NotFound`].
    NotFound = 6,
    /// See [`Error::ResourceExhausted`].
    ResourceExhausted = 7,
    /// See [`Error::InvalidInput`].
    InvalidInput = 8,
    /// See [`Error::Internal`].
    Internal = 99,
}

impl Status {
    /// The raw integer code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Whether this is [`Status::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.status(),
        }
    }
}
