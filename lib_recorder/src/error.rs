//! Error types for the recorder core.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Errors raised by the recorder core.
///
/// Only configuration and persistence failures exist here. Decode errors are
/// filtered out by the transport layer before a `Record` is ever built.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Invalid configuration or a setter called at the wrong lifecycle stage.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error while opening, writing or closing a sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A flush was attempted while no sink could be opened.
    #[error("No active sink for {0}")]
    NoActiveSink(String),
}

impl RecorderError {
    /// True for the persistence (IOError) family.
    pub fn is_io(&self) -> bool {
        !matches!(self, RecorderError::Config(_))
    }

    /// True for configuration errors.
    pub fn is_config(&self) -> bool {
        matches!(self, RecorderError::Config(_))
    }
}
