//! Error types for the node engine

use thiserror::Error;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Main error type for node operations
#[derive(Error, Debug)]
pub enum NodeError {
    /// Log store error
    #[error("Log store error: {0}")]
    Log(#[from] LogError),

    /// Threshold settings error
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Protocol-layer error
    #[error("Protocol error: {0}")]
    Protocol(#[from] vega::VegaError),
}

/// Errors raised by the log stores
#[derive(Error, Debug)]
pub enum LogError {
    /// End precedes start, or a zero entry budget
    #[error("Invalid extraction range")]
    InvalidRange,

    /// No bucket covers the requested timestamp
    #[error("No such bucket: {bucket}")]
    NoSuchBucket { bucket: String },

    /// Underlying file operation failed after retries
    #[error("Log file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the threshold store
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Settings file could not be read or written
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file contents could not be parsed
    #[error("Settings file malformed: {0}")]
    Format(#[from] serde_json::Error),
}
