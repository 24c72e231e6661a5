//! # Vega - Nanosatellite telemetry link
//!
//! The shared protocol layer of the Vega telemetry system: one constrained
//! node peer and one host-side gateway peer exchanging framed binary
//! packets over a single ordered byte link.
//!
//! ## Key pieces
//!
//! - **Framing**: length-prefixed frames with an `0x55` trailer and an
//!   optional XOR checksum extension
//! - **Records**: fixed little-endian layouts for sensor samples and
//!   mode-transition events
//! - **Correlation ids**: 8-bit ids binding requests to their replies,
//!   `0xFF` reserved for unsolicited node traffic
//! - **Priority queue**: three-lane bounded send queue feeding the single
//!   link writer
//! - **Clocks**: host clock for the gateway, peer-synchronized clock for
//!   the node
//!
//! ## Quick Start
//!
//! ```rust
//! use vega::{Frame, PacketType, SensorRecord, Mode};
//!
//! // Encode a beacon frame
//! let record = SensorRecord {
//!     timestamp: 1_700_000_000,
//!     temp: 25,
//!     humidity: 50,
//!     light: 80,
//!     mode: Mode::Ok,
//!     voltage: 3.0,
//! };
//! let frame = Frame::new(PacketType::Beacon, vega::UNSOLICITED_ID, record.to_payload());
//! let bytes = frame.encode().unwrap();
//!
//! // Decode it on the other peer
//! let decoded = Frame::decode(&bytes).unwrap();
//! assert_eq!(decoded.kind(), Some(PacketType::Beacon));
//! let restored = SensorRecord::from_payload(&decoded.payload).unwrap();
//! assert_eq!(restored, record);
//! ```
//!
//! ## Modules
//!
//! - [`frame`]: frame codec and validation
//! - [`protocol`]: packet types, modes, events, record layouts
//! - [`ident`]: correlation id allocation
//! - [`queue`]: three-lane priority send queue
//! - [`link`]: byte-link abstraction and in-memory implementation
//! - [`clock`]: wall-clock sources

pub mod clock;
pub mod error;
pub mod frame;
pub mod ident;
pub mod link;
pub mod protocol;
pub mod queue;

pub use clock::{ManualClock, SyncedClock, SystemClock, WallClock};
pub use error::{FrameError, LinkError, QueueError, RecordError, Result, VegaError};
pub use frame::{ChecksumMode, Frame};
pub use ident::IdAllocator;
pub use link::{Link, LinkMetrics, MemoryLink};
pub use protocol::{EventKind, EventRecord, Mode, PacketType, SensorRecord};
pub use queue::{Lane, SendQueue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trailer byte closing every frame
pub const END_MARK: u8 = 0x55;

/// Frame bytes not occupied by payload: length, type, id, checksum, trailer
pub const FRAME_OVERHEAD: usize = 5;

/// Largest frame the node's packet buffer can hold
pub const MAX_FRAME_LEN: usize = 128;

/// Largest payload a frame can carry
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - FRAME_OVERHEAD;

/// Correlation id reserved for unsolicited node-originated frames
pub const UNSOLICITED_ID: u8 = 0xFF;

/// Highest id the allocator will hand out
pub const MAX_REQUEST_ID: u8 = 0xFE;
