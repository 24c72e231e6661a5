// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Append-only log stores
//!
//! Two variants back the node's history queries: [`sensor::SensorLog`]
//! buckets sensor records by calendar day with a bounded bucket count, and
//! [`event::EventLog`] is a single flat file of event records. Both store
//! records in their fixed wire layouts, in write order — which is
//! timestamp-monotonic under normal operation, and the range scans assume
//! it.
//!
//! File operations retry a few times with a fixed backoff before giving up;
//! a write that exhausts its retries is dropped and reported.

pub mod event;
pub mod sensor;

use std::io;
use std::time::Duration;

use chrono::DateTime;
use tracing::warn;

use crate::error::LogError;

/// Maximum number of day buckets kept on disk; older buckets are evicted
///
/// Seven buckets cap retrievable sensor history at one week. Consumers
/// asking for older ranges get [`LogError::NoSuchBucket`].
pub const MAX_BUCKETS: usize = 7;

/// Attempts before a failing file operation is abandoned
pub const MAX_WRITE_RETRIES: u32 = 7;

/// Whether a range extraction filled the caller's budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStatus {
    /// Exactly `max_entries` records were returned; more may exist
    Complete,
    /// Fewer than `max_entries` records matched
    Partial,
}

/// Result of a range extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction<R> {
    /// Matching records, oldest first
    pub records: Vec<R>,
    /// Whether the budget was filled
    pub status: ExtractStatus,
}

impl<R> Extraction<R> {
    fn new(records: Vec<R>, max_entries: usize) -> Self {
        let status = if records.len() == max_entries {
            ExtractStatus::Complete
        } else {
            ExtractStatus::Partial
        };
        Self { records, status }
    }
}

/// Retry behavior for file operations
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first failure
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_WRITE_RETRIES,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Run a file operation under the retry policy
pub(crate) fn with_retries<T>(
    policy: &RetryPolicy,
    what: &str,
    mut op: impl FnMut() -> io::Result<T>,
) -> io::Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt > policy.max_retries {
                    return Err(err);
                }
                warn!(%what, %attempt, %err, "log file operation failed, retrying");
                std::thread::sleep(policy.backoff);
            }
        }
    }
}

/// Day-bucket name for a timestamp: `YYYYMMDD` in UTC
pub(crate) fn bucket_name(timestamp: u32) -> String {
    match DateTime::from_timestamp(i64::from(timestamp), 0) {
        Some(dt) => dt.format("%Y%m%d").to_string(),
        None => String::from("00000000"),
    }
}

/// Validate an extraction range and budget
pub(crate) fn check_range(lo: u32, hi: u32, max_entries: usize) -> Result<(), LogError> {
    if hi < lo || max_entries == 0 {
        return Err(LogError::InvalidRange);
    }
    Ok(())
}
