//! Correlation id allocation
//!
//! Every gateway-originated request carries an 8-bit id that the node echoes
//! in its replies. Ids cycle through 0..=254; `0xFF` is reserved for frames
//! the node sends on its own (beacons, events, its boot-time clock request).

use std::sync::atomic::{AtomicU8, Ordering};

use crate::MAX_REQUEST_ID;

/// Monotonic allocator for correlation ids
///
/// Wraps from 254 back to 0 and never yields the reserved `0xFF`. The
/// allocator does not track which ids are still in flight; the caller's
/// pending-request table is responsible for refusing new requests while
/// all 255 ids are outstanding.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU8,
}

impl IdAllocator {
    /// Create an allocator starting at id 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator whose next id is `first`
    ///
    /// Useful for deterministic tests; `first` is clamped into 0..=254.
    pub fn starting_at(first: u8) -> Self {
        Self {
            next: AtomicU8::new(first.min(MAX_REQUEST_ID)),
        }
    }

    /// Hand out the next id
    pub fn allocate(&self) -> u8 {
        let step = |v: u8| Some(if v >= MAX_REQUEST_ID { 0 } else { v + 1 });
        match self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, step)
        {
            Ok(prev) | Err(prev) => prev,
        }
    }
}
