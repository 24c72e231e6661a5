// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Priority send queue
//!
//! All outbound frames of a peer funnel through one [`SendQueue`] with three
//! lanes. The transmit loop is the single consumer: it always drains `High`
//! before `Medium` before `Low`, and FIFO within a lane. Beacons ride the
//! high lane, events the medium lane, command replies and user-initiated
//! requests the low lane — which is why a beacon may overtake frames of a
//! log reply stream.
//!
//! Each lane has a fixed byte budget. Enqueue is all-or-nothing: a frame
//! that does not fit leaves the lane untouched.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::QueueError;

/// Default byte budget per lane
pub const LANE_CAPACITY: usize = 256;

/// Priority lane of the send queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Beacons
    High,
    /// Event notifications
    Medium,
    /// Command replies and user-initiated traffic
    Low,
}

impl Lane {
    /// All lanes in drain order
    pub const ALL: [Lane; 3] = [Lane::High, Lane::Medium, Lane::Low];

    fn index(self) -> usize {
        match self {
            Lane::High => 0,
            Lane::Medium => 1,
            Lane::Low => 2,
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::High => write!(f, "high"),
            Lane::Medium => write!(f, "medium"),
            Lane::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Default)]
struct LaneState {
    frames: VecDeque<Vec<u8>>,
    bytes: usize,
}

/// Bounded three-lane FIFO of encoded frames
#[derive(Debug)]
pub struct SendQueue {
    lanes: Mutex<[LaneState; 3]>,
    ready: Condvar,
    lane_capacity: usize,
}

impl SendQueue {
    /// Create a queue with the default per-lane byte budget
    pub fn new() -> Self {
        Self::with_lane_capacity(LANE_CAPACITY)
    }

    /// Create a queue with a custom per-lane byte budget
    pub fn with_lane_capacity(lane_capacity: usize) -> Self {
        Self {
            lanes: Mutex::new(Default::default()),
            ready: Condvar::new(),
            lane_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, [LaneState; 3]> {
        self.lanes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue an encoded frame into a lane
    ///
    /// Fails with [`QueueError::Full`] without partial insertion when the
    /// lane's remaining budget is smaller than the frame.
    pub fn enqueue(&self, lane: Lane, frame: Vec<u8>) -> Result<(), QueueError> {
        let mut lanes = self.lock();
        let state = &mut lanes[lane.index()];
        let available = self.lane_capacity.saturating_sub(state.bytes);
        if frame.len() > available {
            return Err(QueueError::Full {
                lane,
                needed: frame.len(),
                available,
            });
        }
        state.bytes += frame.len();
        state.frames.push_back(frame);
        drop(lanes);
        self.ready.notify_one();
        Ok(())
    }

    fn take(lanes: &mut [LaneState; 3]) -> Option<Vec<u8>> {
        for lane in Lane::ALL {
            let state = &mut lanes[lane.index()];
            if let Some(frame) = state.frames.pop_front() {
                state.bytes -= frame.len();
                return Some(frame);
            }
        }
        None
    }

    /// Remove the next frame without blocking
    pub fn try_pop(&self) -> Option<Vec<u8>> {
        Self::take(&mut self.lock())
    }

    /// Remove the next frame, blocking until one is available
    pub fn pop(&self) -> Vec<u8> {
        let mut lanes = self.lock();
        loop {
            if let Some(frame) = Self::take(&mut lanes) {
                return frame;
            }
            lanes = self
                .ready
                .wait(lanes)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Remove the next frame, waiting up to `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut lanes = self.lock();
        loop {
            if let Some(frame) = Self::take(&mut lanes) {
                return Some(frame);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, _timed_out) = self
                .ready
                .wait_timeout(lanes, remaining)
                .unwrap_or_else(|e| e.into_inner());
            lanes = guard;
        }
    }

    /// Number of queued frames across all lanes
    pub fn len(&self) -> usize {
        self.lock().iter().map(|s| s.frames.len()).sum()
    }

    /// Whether all lanes are empty
    pub fn is_empty(&self) -> bool {
        self.lock().iter().all(|s| s.frames.is_empty())
    }

    /// Bytes queued in one lane
    pub fn lane_bytes(&self, lane: Lane) -> usize {
        self.lock()[lane.index()].bytes
    }
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}
