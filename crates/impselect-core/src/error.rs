//! Error types for the cached query runner.

use std::path::PathBuf;

use crate::engine::EngineError;

/// Runner errors.
#[derive(Debug, thiserror::Error)]
pub enum ImpselectError {
    /// No usable configuration (missing connection, malformed config file).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Cache directory could not be created.
    #[error("failed to create cache directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Engine failure that was not retried.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Transient engine failure that persisted through every attempt.
    #[error("query failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: EngineError,
    },

    /// Cached data requested but never written.
    #[error("no cached data at {}", .path.display())]
    CacheMiss { path: PathBuf },

    /// Cache file could not be decoded (or a table could not be encoded).
    #[error("codec error: {message}")]
    Codec { message: String },

    /// SQL template could not be rendered.
    #[error("invalid SQL template: {message}")]
    Template { message: String },

    /// Table shape is inconsistent.
    #[error("invalid table: {message}")]
    InvalidTable { message: String },

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImpselectError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    pub(crate) fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Whether the error is a transient engine failure eligible for another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_retryable())
    }

    /// The engine error behind this failure, if any.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            Self::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}

impl From<csv::Error> for ImpselectError {
    fn from(err: csv::Error) -> Self {
        Self::codec(err.to_string())
    }
}

/// Result type for runner operations.
pub type ImpselectResult<T> = Result<T, ImpselectError>;
