//! Protocol definitions for the Vega link
//!
//! This module defines the core types shared by both peers:
//! - Packet types and their wire discriminants
//! - Operating modes and mode-transition events
//! - Sensor and event records with their fixed little-endian payload layouts

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Packet types in the Vega link protocol
///
/// The discriminants are the on-wire `type` byte. Gaps in the numbering are
/// reserved; a decoded frame may carry a value outside this set and dispatch
/// is the receiving engine's problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Unsolicited telemetry snapshot, node to gateway
    Beacon = 0x01,
    /// Wall-clock value pushed to the node
    SetClock = 0x02,
    /// Update minimum temperature threshold
    UpdateMinTemp = 0x03,
    /// Update minimum humidity threshold
    UpdateHumidity = 0x04,
    /// Update safe-voltage threshold
    UpdateVoltage = 0x05,
    /// Update minimum light threshold
    UpdateLight = 0x06,
    /// Unsolicited mode-transition notification
    Event = 0x07,
    /// Positive command acknowledgment
    Ack = 0x08,
    /// Negative command acknowledgment
    Nack = 0x09,
    /// Update maximum temperature threshold
    UpdateMaxTemp = 0x0A,
    /// Node asks the gateway for the wall clock
    ClockRequest = 0x10,
    /// One stored sensor record of a log reply stream
    SensorLog = 0x11,
    /// End of a sensor log reply stream
    SensorLogEnd = 0x12,
    /// Request stored sensor records in a timestamp range
    SensorLogRequest = 0x13,
    /// One stored event record of a log reply stream
    EventLog = 0x14,
    /// End of an event log reply stream
    EventLogEnd = 0x15,
    /// Request stored event records in a timestamp range
    EventLogRequest = 0x16,
    /// Ask the node for its current time
    TimeQuery = 0x17,
    /// Node's reply to a time query
    TimeReport = 0x18,
}

impl PacketType {
    /// Convert from the wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(PacketType::Beacon),
            0x02 => Some(PacketType::SetClock),
            0x03 => Some(PacketType::UpdateMinTemp),
            0x04 => Some(PacketType::UpdateHumidity),
            0x05 => Some(PacketType::UpdateVoltage),
            0x06 => Some(PacketType::UpdateLight),
            0x07 => Some(PacketType::Event),
            0x08 => Some(PacketType::Ack),
            0x09 => Some(PacketType::Nack),
            0x0A => Some(PacketType::UpdateMaxTemp),
            0x10 => Some(PacketType::ClockRequest),
            0x11 => Some(PacketType::SensorLog),
            0x12 => Some(PacketType::SensorLogEnd),
            0x13 => Some(PacketType::SensorLogRequest),
            0x14 => Some(PacketType::EventLog),
            0x15 => Some(PacketType::EventLogEnd),
            0x16 => Some(PacketType::EventLogRequest),
            0x17 => Some(PacketType::TimeQuery),
            0x18 => Some(PacketType::TimeReport),
            _ => None,
        }
    }
}

/// Operating mode of the node
///
/// `Uninitialized` is the internal pre-boot state; it is never transmitted
/// and exists only so the mode machine can tell "no sample yet" apart from
/// a real mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    /// No sample has been evaluated yet
    #[default]
    Uninitialized = 0,
    /// One or more readings out of range
    Error = 1,
    /// Out of range with low supply voltage; conserve power
    Safe = 2,
    /// All readings within thresholds
    Ok = 3,
}

impl Mode {
    /// Convert from the wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Mode::Uninitialized),
            1 => Some(Mode::Error),
            2 => Some(Mode::Safe),
            3 => Some(Mode::Ok),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Uninitialized => write!(f, "Uninitialized"),
            Mode::Error => write!(f, "Error"),
            Mode::Safe => write!(f, "Safe"),
            Mode::Ok => write!(f, "OK"),
        }
    }
}

/// Mode-transition events recorded by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    /// OK mode to error mode
    OkToError = 0,
    /// Error mode to OK mode
    ErrorToOk = 1,
    /// Watchdog timer reset occurred
    WatchdogReset = 2,
    /// First mode published after boot
    Init = 3,
    /// OK mode to safe mode
    OkToSafe = 4,
    /// Safe mode to error mode
    SafeToError = 5,
    /// Safe mode to OK mode
    SafeToOk = 6,
    /// Error mode to safe mode
    ErrorToSafe = 7,
}

impl EventKind {
    /// Convert from the wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EventKind::OkToError),
            1 => Some(EventKind::ErrorToOk),
            2 => Some(EventKind::WatchdogReset),
            3 => Some(EventKind::Init),
            4 => Some(EventKind::OkToSafe),
            5 => Some(EventKind::SafeToError),
            6 => Some(EventKind::SafeToOk),
            7 => Some(EventKind::ErrorToSafe),
            _ => None,
        }
    }

    /// Event kind for a transition between two published modes
    ///
    /// Returns `None` for self-loops. The first departure from
    /// `Uninitialized` is always `Init`, whatever the target mode.
    pub fn transition(from: Mode, to: Mode) -> Option<Self> {
        if from == to {
            return None;
        }
        match (from, to) {
            (Mode::Uninitialized, _) => Some(EventKind::Init),
            (Mode::Ok, Mode::Error) => Some(EventKind::OkToError),
            (Mode::Ok, Mode::Safe) => Some(EventKind::OkToSafe),
            (Mode::Safe, Mode::Error) => Some(EventKind::SafeToError),
            (Mode::Safe, Mode::Ok) => Some(EventKind::SafeToOk),
            (Mode::Error, Mode::Ok) => Some(EventKind::ErrorToOk),
            (Mode::Error, Mode::Safe) => Some(EventKind::ErrorToSafe),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::OkToError => write!(f, "OK to Error"),
            EventKind::ErrorToOk => write!(f, "Error to OK"),
            EventKind::WatchdogReset => write!(f, "Watchdog Reset"),
            EventKind::Init => write!(f, "Initialization"),
            EventKind::OkToSafe => write!(f, "OK to Safe"),
            EventKind::SafeToError => write!(f, "Safe to Error"),
            EventKind::SafeToOk => write!(f, "Safe to OK"),
            EventKind::ErrorToSafe => write!(f, "Error to Safe"),
        }
    }
}

/// One sensor sample with the mode it was published under
///
/// The wire payload is 12 bytes: `temp`, `humidity`, `light`, `mode`,
/// `voltage` (f32 LE), `timestamp` (u32 LE). The same layout is used for
/// `Beacon` and `SensorLog` frames and for on-disk log records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// Unix seconds when the sample was taken
    pub timestamp: u32,
    /// Temperature in degrees Celsius
    pub temp: u8,
    /// Relative humidity percentage
    pub humidity: u8,
    /// Light level percentage
    pub light: u8,
    /// Mode published with this sample
    pub mode: Mode,
    /// Supply voltage in volts
    pub voltage: f32,
}

impl SensorRecord {
    /// Fixed payload size in bytes
    pub const WIRE_SIZE: usize = 12;

    /// Serialize to the wire payload layout
    pub fn to_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_SIZE);
        buf.push(self.temp);
        buf.push(self.humidity);
        buf.push(self.light);
        buf.push(self.mode as u8);
        buf.extend_from_slice(&self.voltage.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    /// Parse from a wire payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, RecordError> {
        if payload.len() < Self::WIRE_SIZE {
            return Err(RecordError::Truncated {
                needed: Self::WIRE_SIZE,
                available: payload.len(),
            });
        }
        let mode = Mode::from_u8(payload[3]).ok_or(RecordError::UnknownMode(payload[3]))?;
        let voltage = f32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let timestamp = u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]);
        Ok(Self {
            timestamp,
            temp: payload[0],
            humidity: payload[1],
            light: payload[2],
            mode,
            voltage,
        })
    }
}

/// One mode-transition event
///
/// The wire payload is 5 bytes: `event`, `timestamp` (u32 LE). Shared by
/// `Event` and `EventLog` frames and on-disk event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// What happened
    pub event: EventKind,
    /// Unix seconds when it happened
    pub timestamp: u32,
}

impl EventRecord {
    /// Fixed payload size in bytes
    pub const WIRE_SIZE: usize = 5;

    /// Serialize to the wire payload layout
    pub fn to_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_SIZE);
        buf.push(self.event as u8);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    /// Parse from a wire payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, RecordError> {
        if payload.len() < Self::WIRE_SIZE {
            return Err(RecordError::Truncated {
                needed: Self::WIRE_SIZE,
                available: payload.len(),
            });
        }
        let event = EventKind::from_u8(payload[0]).ok_or(RecordError::UnknownEvent(payload[0]))?;
        let timestamp = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        Ok(Self { event, timestamp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_wire_values() {
        assert_eq!(PacketType::Beacon as u8, 0x01);
        assert_eq!(PacketType::Ack as u8, 0x08);
        assert_eq!(PacketType::UpdateMaxTemp as u8, 0x0A);
        assert_eq!(PacketType::ClockRequest as u8, 0x10);
        assert_eq!(PacketType::TimeReport as u8, 0x18);
    }

    #[test]
    fn test_packet_type_from_u8_roundtrip() {
        for raw in 0u8..=0xFF {
            if let Some(ty) = PacketType::from_u8(raw) {
                assert_eq!(ty as u8, raw);
            }
        }
        assert!(PacketType::from_u8(0x0B).is_none());
        assert!(PacketType::from_u8(0x19).is_none());
    }

    #[test]
    fn test_mode_from_u8() {
        assert_eq!(Mode::from_u8(0), Some(Mode::Uninitialized));
        assert_eq!(Mode::from_u8(3), Some(Mode::Ok));
        assert_eq!(Mode::from_u8(4), None);
    }

    #[test]
    fn test_transition_table() {
        use EventKind::*;
        assert_eq!(EventKind::transition(Mode::Ok, Mode::Error), Some(OkToError));
        assert_eq!(EventKind::transition(Mode::Ok, Mode::Safe), Some(OkToSafe));
        assert_eq!(EventKind::transition(Mode::Safe, Mode::Ok), Some(SafeToOk));
        assert_eq!(
            EventKind::transition(Mode::Safe, Mode::Error),
            Some(SafeToError)
        );
        assert_eq!(EventKind::transition(Mode::Error, Mode::Ok), Some(ErrorToOk));
        assert_eq!(
            EventKind::transition(Mode::Error, Mode::Safe),
            Some(ErrorToSafe)
        );
    }

    #[test]
    fn test_transition_self_loop_is_none() {
        for mode in [Mode::Ok, Mode::Safe, Mode::Error, Mode::Uninitialized] {
            assert_eq!(EventKind::transition(mode, mode), None);
        }
    }

    #[test]
    fn test_transition_from_uninitialized_is_init() {
        for mode in [Mode::Ok, Mode::Safe, Mode::Error] {
            assert_eq!(
                EventKind::transition(Mode::Uninitialized, mode),
                Some(EventKind::Init)
            );
        }
    }

    #[test]
    fn test_sensor_record_payload_roundtrip() {
        let rec = SensorRecord {
            timestamp: 0x1234_5678,
            temp: 25,
            humidity: 50,
            light: 80,
            mode: Mode::Ok,
            voltage: 3.0,
        };
        let payload = rec.to_payload();
        assert_eq!(payload.len(), SensorRecord::WIRE_SIZE);
        let restored = SensorRecord::from_payload(&payload).unwrap();
        assert_eq!(rec, restored);
    }

    #[test]
    fn test_sensor_record_payload_layout() {
        let rec = SensorRecord {
            timestamp: 0x0000_0001,
            temp: 10,
            humidity: 20,
            light: 30,
            mode: Mode::Safe,
            voltage: 0.0,
        };
        let payload = rec.to_payload();
        assert_eq!(&payload[..4], &[10, 20, 30, 2]);
        assert_eq!(&payload[4..8], &0.0f32.to_le_bytes());
        assert_eq!(&payload[8..], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_sensor_record_truncated() {
        let result = SensorRecord::from_payload(&[1, 2, 3]);
        assert!(matches!(
            result,
            Err(RecordError::Truncated {
                needed: 12,
                available: 3
            })
        ));
    }

    #[test]
    fn test_sensor_record_unknown_mode() {
        let mut payload = SensorRecord {
            timestamp: 0,
            temp: 0,
            humidity: 0,
            light: 0,
            mode: Mode::Ok,
            voltage: 1.0,
        }
        .to_payload();
        payload[3] = 9;
        assert!(matches!(
            SensorRecord::from_payload(&payload),
            Err(RecordError::UnknownMode(9))
        ));
    }

    #[test]
    fn test_event_record_payload_roundtrip() {
        let rec = EventRecord {
            event: EventKind::OkToSafe,
            timestamp: 1_700_000_000,
        };
        let payload = rec.to_payload();
        assert_eq!(payload.len(), EventRecord::WIRE_SIZE);
        assert_eq!(payload[0], 4);
        let restored = EventRecord::from_payload(&payload).unwrap();
        assert_eq!(rec, restored);
    }

    #[test]
    fn test_event_record_unknown_kind() {
        let payload = [42u8, 0, 0, 0, 0];
        assert!(matches!(
            EventRecord::from_payload(&payload),
            Err(RecordError::UnknownEvent(42))
        ));
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(Mode::Ok.to_string(), "OK");
        assert_eq!(Mode::Safe.to_string(), "Safe");
        assert_eq!(EventKind::OkToError.to_string(), "OK to Error");
        assert_eq!(EventKind::Init.to_string(), "Initialization");
    }
}
