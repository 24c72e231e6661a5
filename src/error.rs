//! Error types for the Vega link protocol
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

use crate::queue::Lane;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, VegaError>;

/// Main error type for protocol operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VegaError {
    /// Frame encoding or decoding error
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Record payload error
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Send queue error
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Link transport error
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// No correlation id available
    #[error("All request ids are in flight")]
    IdsExhausted,
}

/// Errors raised by the frame codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Declared length does not match the byte count
    #[error("Invalid length: header declares {declared} bytes, got {actual}")]
    InvalidLength { declared: u8, actual: usize },

    /// Final byte is not the end marker
    #[error("Missing end mark: expected 0x55, found 0x{found:02X}")]
    MissingEndMark { found: u8 },

    /// Payload exceeds the frame ceiling
    #[error("Payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// XOR checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// Errors raised when decoding record payloads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Payload shorter than the fixed record layout
    #[error("Truncated record: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Mode discriminant outside the known set
    #[error("Unknown mode: 0x{0:02X}")]
    UnknownMode(u8),

    /// Event discriminant outside the known set
    #[error("Unknown event kind: 0x{0:02X}")]
    UnknownEvent(u8),
}

/// Errors raised by the priority send queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Lane byte budget would be exceeded; nothing was enqueued
    #[error("{lane} lane full: need {needed} bytes, {available} free")]
    Full {
        lane: Lane,
        needed: usize,
        available: usize,
    },
}

/// Errors raised by link transports
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Receive timed out with no data available
    #[error("Receive timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Peer side of the link is gone
    #[error("Disconnected: {reason}")]
    Disconnected { reason: String },

    /// Transmit buffer full
    #[error("Send buffer full")]
    BufferFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VegaError::Frame(FrameError::MissingEndMark { found: 0x00 });
        let msg = format!("{}", err);
        assert!(msg.contains("end mark"));
        assert!(msg.contains("0x55"));
    }

    #[test]
    fn test_error_conversion() {
        let frame_err = FrameError::InvalidLength {
            declared: 9,
            actual: 5,
        };
        let err: VegaError = frame_err.into();
        assert!(matches!(err, VegaError::Frame(_)));
    }

    #[test]
    fn test_queue_full_display() {
        let err = QueueError::Full {
            lane: Lane::High,
            needed: 17,
            available: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("high"));
        assert!(msg.contains("17"));
    }
}
