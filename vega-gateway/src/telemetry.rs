// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! In-memory telemetry history
//!
//! Every sensor record the gateway sees from a log reply stream is kept in
//! an ordered, timestamp-keyed store so repeated client queries can be
//! answered without asking the node again. At most one record exists per
//! timestamp; replays of the same second are ignored.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use vega::SensorRecord;

/// Ordered set of sensor records keyed by timestamp
#[derive(Debug, Default)]
pub struct TelemetryStore {
    records: Mutex<BTreeMap<u32, SensorRecord>>,
}

impl TelemetryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<u32, SensorRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a record at its sorted position
    ///
    /// A record with the same timestamp as an existing one is silently
    /// ignored; the first value wins.
    pub fn insert(&self, record: SensorRecord) {
        self.records().entry(record.timestamp).or_insert(record);
    }

    /// Record at an exact timestamp
    pub fn get(&self, timestamp: u32) -> Option<SensorRecord> {
        self.records().get(&timestamp).copied()
    }

    /// Records with `lo <= timestamp <= hi`, in order
    ///
    /// Returns `None` when the store is empty or `lo` lies beyond the
    /// newest record — the caller asked about a future the store knows
    /// nothing about. A range that overlaps known history but matches
    /// nothing yields an empty vector.
    pub fn range(&self, lo: u32, hi: u32) -> Option<Vec<SensorRecord>> {
        let records = self.records();
        let (&newest, _) = records.iter().next_back()?;
        if lo > newest {
            return None;
        }
        Some(records.range(lo..=hi).map(|(_, rec)| *rec).collect())
    }

    /// Newest record
    pub fn latest(&self) -> Option<SensorRecord> {
        self.records().iter().next_back().map(|(_, rec)| *rec)
    }

    /// All records, oldest first
    pub fn all(&self) -> Vec<SensorRecord> {
        self.records().values().copied().collect()
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether the store holds nothing
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Drop all records
    pub fn clear(&self) {
        self.records().clear();
    }
}
