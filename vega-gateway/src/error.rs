// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the gateway engine

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Frame encoding error
    #[error("Frame error: {0}")]
    Frame(#[from] vega::FrameError),

    /// Link transport error
    #[error("Link error: {0}")]
    Link(#[from] vega::LinkError),

    /// All 255 correlation ids carry in-flight requests
    #[error("All request ids are in flight; try again later")]
    IdsExhausted,

    /// A pending request already holds this id
    #[error("Request id {id} already pending")]
    DuplicateRequest { id: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::DuplicateRequest { id: 12 };
        assert!(format!("{}", err).contains("12"));
    }

    #[test]
    fn test_frame_error_conversion() {
        let err: GatewayError = vega::FrameError::MissingEndMark { found: 0 }.into();
        assert!(matches!(err, GatewayError::Frame(_)));
    }
}
