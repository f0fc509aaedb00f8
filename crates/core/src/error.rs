use std::time::Duration;
use thiserror::Error;

/// Core errors for inventory resolution, metrics collection and reporting
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Capability not supported: {0}")]
    NotSupported(String),

    #[error("Query batch too large: needed {needed} counters, server maximum is {max}")]
    BatchTooLarge { needed: usize, max: usize },

    #[error("Unrecognized object kind: {0}")]
    UnrecognizedKind(String),

    #[error("Expansion of {object} exceeded depth {depth}")]
    DepthExceeded { object: String, depth: usize },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Duplicate channel name: {0}")]
    DuplicateChannel(String),

    #[error("Sensor in error state: {message}")]
    ErrorState { message: String, payload: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn query<S: Into<String>>(msg: S) -> Self {
        Self::Query(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn not_supported<S: Into<String>>(msg: S) -> Self {
        Self::NotSupported(msg.into())
    }

    pub fn unrecognized_kind<S: Into<String>>(msg: S) -> Self {
        Self::UnrecognizedKind(msg.into())
    }

    pub fn metrics<S: Into<String>>(msg: S) -> Self {
        Self::Metrics(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn timeout<S: Into<String>>(operation: S, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Errors that fail a single branch or object without aborting the caller's
    /// wider operation.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedKind(_)
                | Self::DepthExceeded { .. }
                | Self::NotFound(_)
                | Self::Timeout { .. }
        )
    }
}
