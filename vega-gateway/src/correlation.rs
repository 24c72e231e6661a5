// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Request/response correlation
//!
//! Many clients multiplex over the single serial link. Each outbound
//! request gets an id and an entry here; reply frames carry the id back
//! and resolve the entry. Entries die on a terminal reply (ack, nack,
//! end-of-stream, time report) or when the deadline passes and the sweep
//! evicts them.
//!
//! Lock discipline: the table lock is never held while delivering to a
//! client — lookups clone the client handle out first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::client::ClientRef;
use crate::error::GatewayError;

/// Deadline applied to pending requests unless overridden
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Most requests that may be pending at once (one per usable id)
pub const MAX_PENDING: usize = 255;

/// What kind of terminal reply a pending request expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A single ack or nack
    Ack,
    /// Zero or more log frames closed by an end-of-stream frame
    LogStream,
    /// A time report
    CurrentTime,
}

/// One in-flight request awaiting frames from the node
pub struct PendingRequest {
    /// Correlation id on the wire
    pub id: u8,
    /// Client to notify with results
    pub client: ClientRef,
    /// Expected reply shape
    pub expect: ReplyKind,
    /// Eviction time
    pub deadline: Instant,
    /// Raw payload bytes streamed so far
    pub partial: Vec<u8>,
}

impl PendingRequest {
    /// Create a request expiring `timeout` from now
    pub fn new(id: u8, client: ClientRef, expect: ReplyKind, timeout: Duration) -> Self {
        Self {
            id,
            client,
            expect,
            deadline: Instant::now() + timeout,
            partial: Vec::new(),
        }
    }
}

/// Concurrent map from correlation id to pending request
#[derive(Default)]
pub struct CorrelationTable {
    entries: Mutex<HashMap<u8, PendingRequest>>,
}

impl CorrelationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u8, PendingRequest>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a pending request under its id
    pub fn register(&self, request: PendingRequest) -> Result<(), GatewayError> {
        let mut entries = self.entries();
        if entries.contains_key(&request.id) {
            return Err(GatewayError::DuplicateRequest { id: request.id });
        }
        entries.insert(request.id, request);
        Ok(())
    }

    /// Remove and return the request for a terminal reply
    pub fn complete(&self, id: u8) -> Option<PendingRequest> {
        self.entries().remove(&id)
    }

    /// Clone out the client registered under `id`, if any
    pub fn lookup(&self, id: u8) -> Option<ClientRef> {
        self.entries().get(&id).map(|req| Arc::clone(&req.client))
    }

    /// Append a streamed chunk and clone out the client to notify
    pub fn stream_append(&self, id: u8, chunk: &[u8]) -> Option<ClientRef> {
        let mut entries = self.entries();
        let request = entries.get_mut(&id)?;
        request.partial.extend_from_slice(chunk);
        Some(Arc::clone(&request.client))
    }

    /// Remove and return every request whose deadline has passed
    pub fn sweep(&self, now: Instant) -> Vec<PendingRequest> {
        let mut entries = self.entries();
        let expired: Vec<u8> = entries
            .iter()
            .filter(|(_, req)| req.deadline <= now)
            .map(|(&id, _)| id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| entries.remove(&id))
            .collect()
    }

    /// Whether `id` has a pending request
    pub fn contains(&self, id: u8) -> bool {
        self.entries().contains_key(&id)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Whether every usable id is taken
    pub fn is_full(&self) -> bool {
        self.entries().len() >= MAX_PENDING
    }
}
