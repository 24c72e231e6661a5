// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Link abstraction
//!
//! The two peers talk over one reliable, ordered, byte-oriented channel —
//! in production a serial line, whose setup lives outside this crate. The
//! [`Link`] trait is the seam: engines write raw bytes to it and the
//! integration layer pumps received bytes back into them.
//!
//! [`MemoryLink`] is an in-process implementation for tests and demos.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::LinkError;

/// Statistics about link usage
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkMetrics {
    /// Total bytes written
    pub bytes_sent: u64,
    /// Total bytes read
    pub bytes_received: u64,
    /// Number of send calls
    pub sends: u64,
    /// Number of successful receive calls
    pub receives: u64,
}

/// A reliable ordered byte channel between the two peers
pub trait Link: Send {
    /// Write bytes to the peer
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Read whatever bytes are available, waiting up to `timeout` for at
    /// least one
    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>, LinkError>;

    /// Whether the link is still usable
    fn is_open(&self) -> bool;

    /// Usage counters
    fn metrics(&self) -> LinkMetrics;

    /// Shut the link down
    fn close(&mut self);
}

#[derive(Debug, Default)]
struct PipeState {
    buf: VecDeque<u8>,
    open: bool,
}

/// One direction of byte flow between two [`MemoryLink`] halves
#[derive(Debug)]
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState {
                buf: VecDeque::new(),
                open: true,
            }),
            ready: Condvar::new(),
        })
    }

    fn push(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.open {
            return Err(LinkError::Disconnected {
                reason: "link closed".to_string(),
            });
        }
        state.buf.extend(bytes);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    fn pull(&self, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if !state.buf.is_empty() {
                return Ok(state.buf.drain(..).collect());
            }
            if !state.open {
                return Err(LinkError::Disconnected {
                    reason: "link closed".to_string(),
                });
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Err(LinkError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            };
            let (guard, _) = self
                .ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.open = false;
        drop(state);
        self.ready.notify_all();
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).open
    }
}

/// In-memory byte link for tests and local wiring
///
/// Created in cross-connected pairs: bytes sent on one half appear on the
/// other half's receive side, preserving order.
#[derive(Debug)]
pub struct MemoryLink {
    tx: Arc<Pipe>,
    rx: Arc<Pipe>,
    metrics: LinkMetrics,
}

impl MemoryLink {
    /// Create a connected pair of link endpoints
    pub fn pair() -> (MemoryLink, MemoryLink) {
        let a_to_b = Pipe::new();
        let b_to_a = Pipe::new();
        (
            MemoryLink {
                tx: Arc::clone(&a_to_b),
                rx: Arc::clone(&b_to_a),
                metrics: LinkMetrics::default(),
            },
            MemoryLink {
                tx: b_to_a,
                rx: a_to_b,
                metrics: LinkMetrics::default(),
            },
        )
    }

    /// Read without blocking; returns an empty vector when nothing is queued
    pub fn drain(&mut self) -> Vec<u8> {
        let mut state = self.rx.state.lock().unwrap_or_else(|e| e.into_inner());
        let bytes: Vec<u8> = state.buf.drain(..).collect();
        drop(state);
        if !bytes.is_empty() {
            self.metrics.bytes_received += bytes.len() as u64;
            self.metrics.receives += 1;
        }
        bytes
    }
}

impl Link for MemoryLink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.tx.push(bytes)?;
        self.metrics.bytes_sent += bytes.len() as u64;
        self.metrics.sends += 1;
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let bytes = self.rx.pull(timeout)?;
        self.metrics.bytes_received += bytes.len() as u64;
        self.metrics.receives += 1;
        Ok(bytes)
    }

    fn is_open(&self) -> bool {
        self.tx.is_open() && self.rx.is_open()
    }

    fn metrics(&self) -> LinkMetrics {
        self.metrics
    }

    fn close(&mut self) {
        self.tx.close();
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_send_receive() {
        let (mut node, mut gateway) = MemoryLink::pair();
        node.send(&[1, 2, 3]).unwrap();
        node.send(&[4]).unwrap();

        let bytes = gateway.recv(Duration::from_millis(100)).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_bidirectional() {
        let (mut a, mut b) = MemoryLink::pair();
        a.send(&[10]).unwrap();
        b.send(&[20]).unwrap();
        assert_eq!(b.recv(Duration::from_millis(100)).unwrap(), vec![10]);
        assert_eq!(a.recv(Duration::from_millis(100)).unwrap(), vec![20]);
    }

    #[test]
    fn test_recv_timeout() {
        let (_a, mut b) = MemoryLink::pair();
        let result = b.recv(Duration::from_millis(20));
        assert!(matches!(result, Err(LinkError::Timeout { .. })));
    }

    #[test]
    fn test_send_after_close() {
        let (mut a, _b) = MemoryLink::pair();
        a.close();
        assert!(!a.is_open());
        assert!(matches!(
            a.send(&[1]),
            Err(LinkError::Disconnected { .. })
        ));
    }

    #[test]
    fn test_metrics() {
        let (mut a, mut b) = MemoryLink::pair();
        a.send(&[1, 2, 3]).unwrap();
        b.recv(Duration::from_millis(100)).unwrap();

        assert_eq!(a.metrics().bytes_sent, 3);
        assert_eq!(a.metrics().sends, 1);
        assert_eq!(b.metrics().bytes_received, 3);
    }

    #[test]
    fn test_drain_non_blocking() {
        let (mut a, mut b) = MemoryLink::pair();
        assert!(b.drain().is_empty());
        a.send(&[9, 9]).unwrap();
        assert_eq!(b.drain(), vec![9, 9]);
    }
}
