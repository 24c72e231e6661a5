//! Frame codec for the Vega link
//!
//! Every message on the link travels in one frame:
//!
//! ```text
//! [length: 1] [type: 1] [id: 1] [checksum: 1] [payload: length-5] [0x55]
//! ```
//!
//! `length` counts the whole frame. `id` correlates a reply with the request
//! that caused it; `0xFF` marks unsolicited node-originated frames. The
//! checksum byte was dead on the original wire; [`ChecksumMode::Xor`] turns
//! it into a real XOR checksum as an opt-in extension.

use crate::error::FrameError;
use crate::protocol::PacketType;
use crate::{END_MARK, FRAME_OVERHEAD, MAX_PAYLOAD_LEN};

/// Checksum handling for the codec
///
/// Both peers must run the same mode. `Legacy` is wire-compatible with the
/// original protocol: writers emit zero and readers accept anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Emit 0, ignore on decode
    #[default]
    Legacy,
    /// Emit and verify an XOR over length, type, id and payload
    Xor,
}

/// One decoded link frame
///
/// `packet_type` is kept as the raw wire byte so that frames with unknown
/// types still decode; dispatch decides what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw packet type byte
    pub packet_type: u8,
    /// Correlation id, or `0xFF` for unsolicited frames
    pub id: u8,
    /// Type-specific payload
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame with a payload
    pub fn new(packet_type: PacketType, id: u8, payload: Vec<u8>) -> Self {
        Self {
            packet_type: packet_type as u8,
            id,
            payload,
        }
    }

    /// Create a payload-less frame (ack, nack, end-of-stream, requests)
    pub fn empty(packet_type: PacketType, id: u8) -> Self {
        Self::new(packet_type, id, Vec::new())
    }

    /// The packet type, if it is a known one
    pub fn kind(&self) -> Option<PacketType> {
        PacketType::from_u8(self.packet_type)
    }

    /// Total size of the frame on the wire
    pub fn wire_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode with the default (legacy) checksum mode
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        self.encode_with(ChecksumMode::Legacy)
    }

    /// Encode into wire bytes
    pub fn encode_with(&self, mode: ChecksumMode) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let len = self.wire_len();
        let mut buf = Vec::with_capacity(len);
        buf.push(len as u8);
        buf.push(self.packet_type);
        buf.push(self.id);
        buf.push(0); // checksum slot
        buf.extend_from_slice(&self.payload);
        buf.push(END_MARK);

        if mode == ChecksumMode::Xor {
            buf[3] = xor_checksum(&buf);
        }
        Ok(buf)
    }

    /// Decode with the default (legacy) checksum mode
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        Self::decode_with(bytes, ChecksumMode::Legacy)
    }

    /// Decode wire bytes into a frame
    ///
    /// Requires at least [`FRAME_OVERHEAD`] bytes, a length byte matching
    /// the slice length, and the `0x55` trailer. In [`ChecksumMode::Xor`]
    /// the checksum byte is verified as well.
    pub fn decode_with(bytes: &[u8], mode: ChecksumMode) -> Result<Self, FrameError> {
        if bytes.len() < FRAME_OVERHEAD || bytes[0] as usize != bytes.len() {
            return Err(FrameError::InvalidLength {
                declared: bytes.first().copied().unwrap_or(0),
                actual: bytes.len(),
            });
        }

        let last = bytes[bytes.len() - 1];
        if last != END_MARK {
            return Err(FrameError::MissingEndMark { found: last });
        }

        if mode == ChecksumMode::Xor {
            let expected = xor_checksum(bytes);
            if bytes[3] != expected {
                return Err(FrameError::ChecksumMismatch {
                    expected,
                    actual: bytes[3],
                });
            }
        }

        Ok(Self {
            packet_type: bytes[1],
            id: bytes[2],
            payload: bytes[4..bytes.len() - 1].to_vec(),
        })
    }
}

/// XOR over length, type, id and payload (checksum slot and trailer excluded)
fn xor_checksum(frame: &[u8]) -> u8 {
    let mut sum = frame[0] ^ frame[1] ^ frame[2];
    for byte in &frame[4..frame.len() - 1] {
        sum ^= byte;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ack() {
        let bytes = Frame::empty(PacketType::Ack, 7).encode().unwrap();
        assert_eq!(bytes, vec![0x05, 0x08, 0x07, 0x00, 0x55]);
    }

    #[test]
    fn test_encode_clock_request() {
        let bytes = Frame::empty(PacketType::ClockRequest, 0xFF).encode().unwrap();
        assert_eq!(bytes, vec![0x05, 0x10, 0xFF, 0x00, 0x55]);
    }

    #[test]
    fn test_roundtrip_with_payload() {
        let frame = Frame::new(PacketType::SensorLogRequest, 5, vec![0xE8, 0x03, 0, 0, 0xD0, 0x07, 0, 0]);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), 13);
        assert_eq!(*bytes.last().unwrap(), END_MARK);
        let restored = Frame::decode(&bytes).unwrap();
        assert_eq!(frame, restored);
    }

    #[test]
    fn test_roundtrip_all_ids_and_sizes() {
        for id in [0u8, 1, 100, 254] {
            for size in [0usize, 1, 12, MAX_PAYLOAD_LEN] {
                let frame = Frame::new(PacketType::Beacon, id, vec![0xAB; size]);
                let restored = Frame::decode(&frame.encode().unwrap()).unwrap();
                assert_eq!(frame, restored);
            }
        }
    }

    #[test]
    fn test_decode_too_short() {
        let result = Frame::decode(&[0x03, 0x08, 0x55]);
        assert!(matches!(result, Err(FrameError::InvalidLength { .. })));
    }

    #[test]
    fn test_decode_length_mismatch() {
        // Declares 6 bytes but carries 5
        let result = Frame::decode(&[0x06, 0x08, 0x01, 0x00, 0x55]);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength {
                declared: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_decode_missing_end_mark() {
        let result = Frame::decode(&[0x05, 0x08, 0x01, 0x00, 0x54]);
        assert!(matches!(
            result,
            Err(FrameError::MissingEndMark { found: 0x54 })
        ));
    }

    #[test]
    fn test_decode_unknown_type_succeeds() {
        let frame = Frame::decode(&[0x05, 0x7E, 0x01, 0x00, 0x55]).unwrap();
        assert_eq!(frame.packet_type, 0x7E);
        assert!(frame.kind().is_none());
    }

    #[test]
    fn test_checksum_byte_ignored_in_legacy() {
        // Readers accept any checksum value, including the 8 the original
        // firmware wrote on data frames.
        let frame = Frame::decode(&[0x05, 0x08, 0x01, 0x08, 0x55]).unwrap();
        assert_eq!(frame.kind(), Some(PacketType::Ack));
    }

    #[test]
    fn test_xor_checksum_roundtrip() {
        let frame = Frame::new(PacketType::Beacon, 0xFF, vec![1, 2, 3, 4]);
        let bytes = frame.encode_with(ChecksumMode::Xor).unwrap();
        assert_ne!(bytes[3], 0);
        let restored = Frame::decode_with(&bytes, ChecksumMode::Xor).unwrap();
        assert_eq!(frame, restored);
    }

    #[test]
    fn test_xor_checksum_detects_corruption() {
        let frame = Frame::new(PacketType::Beacon, 0xFF, vec![1, 2, 3, 4]);
        let mut bytes = frame.encode_with(ChecksumMode::Xor).unwrap();
        bytes[5] ^= 0x10;
        assert!(matches!(
            Frame::decode_with(&bytes, ChecksumMode::Xor),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_payload_too_large() {
        let frame = Frame::new(PacketType::Beacon, 0, vec![0; MAX_PAYLOAD_LEN + 1]);
        assert!(matches!(
            frame.encode(),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }
}
