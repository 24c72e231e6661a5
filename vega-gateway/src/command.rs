//! Client operation set
//!
//! Connected clients speak a line-oriented ASCII protocol whose parsing
//! lives in the session layer. What reaches the engine is one of these
//! typed operations; [`crate::GatewayEngine::execute`] carries each one
//! out and routes any node replies back to the issuing client.

/// One operation requested by a connected client
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientCommand {
    /// Latest beacon snapshot, answered locally
    GetSensorData,
    /// Stored records from the trailing window of the latest snapshot
    GetRecentSensorData,
    /// Stored sensor records between two timestamps
    GetSensorLogs {
        /// Range start, Unix seconds inclusive
        start: u32,
        /// Range end, Unix seconds inclusive
        end: u32,
    },
    /// Stored event records between two timestamps
    GetEventLogs {
        /// Range start, Unix seconds inclusive
        start: u32,
        /// Range end, Unix seconds inclusive
        end: u32,
    },
    /// The node's current wall-clock time
    GetCurrentTime,
    /// New minimum temperature threshold
    UpdateMinTemp(u8),
    /// New maximum temperature threshold
    UpdateMaxTemp(u8),
    /// New minimum humidity threshold
    UpdateHumidity(u8),
    /// New minimum light threshold
    UpdateLight(u8),
    /// New safe-voltage floor
    UpdateVoltage(f32),
    /// Push a wall-clock value to the node
    SetTime(u32),
}
