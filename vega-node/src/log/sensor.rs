// Vega - Nanosatellite telemetry link
// Copyright (c) 2025 Vega Telemetry Project
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Day-bucketed sensor record store
//!
//! Sensor records land in one file per calendar day, named `YYYYMMDD`
//! under the store directory. At most [`MAX_BUCKETS`] buckets exist at a
//! time: when a record opens an eighth day, the slot cursor advances
//! round-robin and the file previously occupying that slot is unlinked.
//!
//! Each bucket has its own lock, so a range scan can run against one
//! bucket while the sampler appends to another.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};
use vega::SensorRecord;

use super::{bucket_name, check_range, with_retries, Extraction, RetryPolicy, MAX_BUCKETS};
use crate::error::LogError;

#[derive(Debug, Default)]
struct Rotation {
    names: [Option<String>; MAX_BUCKETS],
    cursor: usize,
}

/// Bucketed append-only store of sensor records
#[derive(Debug)]
pub struct SensorLog {
    dir: PathBuf,
    retry: RetryPolicy,
    rotation: Mutex<Rotation>,
    locks: [Mutex<()>; MAX_BUCKETS],
}

impl SensorLog {
    /// Open the store under `dir`, creating it if needed
    ///
    /// Existing bucket files are adopted, newest [`MAX_BUCKETS`] by name,
    /// so history survives a restart.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LogError> {
        Self::with_retry_policy(dir, RetryPolicy::default())
    }

    /// Open with a custom file-retry policy
    pub fn with_retry_policy(dir: impl Into<PathBuf>, retry: RetryPolicy) -> Result<Self, LogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut existing: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.len() == 8 && name.bytes().all(|b| b.is_ascii_digit()))
            .collect();
        existing.sort_unstable();
        if existing.len() > MAX_BUCKETS {
            existing.drain(..existing.len() - MAX_BUCKETS);
        }

        let mut rotation = Rotation::default();
        for (slot, name) in existing.iter().enumerate() {
            rotation.names[slot] = Some(name.clone());
        }
        rotation.cursor = existing.len().saturating_sub(1);

        Ok(Self {
            dir,
            retry,
            rotation: Mutex::new(rotation),
            locks: Default::default(),
        })
    }

    fn rotation(&self) -> MutexGuard<'_, Rotation> {
        self.rotation.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append one record to its day bucket, rotating slots as needed
    pub fn append(&self, record: &SensorRecord) -> Result<(), LogError> {
        let bucket = bucket_name(record.timestamp);

        let (slot, fresh, evict) = {
            let mut rot = self.rotation();
            let cursor = rot.cursor;
            if rot.names[cursor].as_deref() == Some(bucket.as_str()) {
                (cursor, false, None)
            } else if rot.names[cursor].is_none() {
                rot.names[cursor] = Some(bucket.clone());
                (cursor, true, None)
            } else {
                let next = (cursor + 1) % MAX_BUCKETS;
                rot.cursor = next;
                let evict = rot.names[next].take();
                rot.names[next] = Some(bucket.clone());
                (next, true, evict)
            }
        };

        let _guard = self.locks[slot].lock().unwrap_or_else(|e| e.into_inner());

        if let Some(old) = evict {
            let path = self.dir.join(&old);
            match fs::remove_file(&path) {
                Ok(()) => info!(bucket = %old, "evicted oldest sensor bucket"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(bucket = %old, %err, "failed to unlink evicted bucket"),
            }
        }

        let path = self.dir.join(&bucket);
        let payload = record.to_payload();
        let mut truncate = fresh;
        with_retries(&self.retry, "sensor append", || {
            let mut file = if truncate {
                OpenOptions::new().write(true).create(true).truncate(true).open(&path)?
            } else {
                OpenOptions::new().append(true).create(true).open(&path)?
            };
            file.write_all(&payload)?;
            file.sync_all()?;
            truncate = false;
            Ok(())
        })?;
        Ok(())
    }

    /// Extract records with `lo <= timestamp <= hi`, up to `max_entries`
    ///
    /// Fails with [`LogError::NoSuchBucket`] when either endpoint's day
    /// bucket is not on disk; history is capped at [`MAX_BUCKETS`] days.
    pub fn extract(
        &self,
        lo: u32,
        hi: u32,
        max_entries: usize,
    ) -> Result<Extraction<SensorRecord>, LogError> {
        check_range(lo, hi, max_entries)?;

        let lo_bucket = bucket_name(lo);
        let hi_bucket = bucket_name(hi);
        let (lo_slot, hi_slot) = {
            let rot = self.rotation();
            let find = |name: &str| rot.names.iter().position(|n| n.as_deref() == Some(name));
            let lo_slot = find(&lo_bucket).ok_or_else(|| LogError::NoSuchBucket {
                bucket: lo_bucket.clone(),
            })?;
            let hi_slot = find(&hi_bucket).ok_or_else(|| LogError::NoSuchBucket {
                bucket: hi_bucket.clone(),
            })?;
            (lo_slot, hi_slot)
        };

        let records = if lo_slot == hi_slot {
            self.read_bucket(lo_slot, &lo_bucket, lo, hi, max_entries)?
        } else {
            let mut records = self.read_bucket(lo_slot, &lo_bucket, lo, u32::MAX, max_entries)?;
            if records.len() < max_entries {
                let remaining = max_entries - records.len();
                records.extend(self.read_bucket(hi_slot, &hi_bucket, 0, hi, remaining)?);
            }
            records
        };

        Ok(Extraction::new(records, max_entries))
    }

    /// Names of the buckets currently on disk, oldest slot first
    pub fn buckets(&self) -> Vec<String> {
        self.rotation().names.iter().flatten().cloned().collect()
    }

    fn read_bucket(
        &self,
        slot: usize,
        name: &str,
        lo: u32,
        hi: u32,
        limit: usize,
    ) -> Result<Vec<SensorRecord>, LogError> {
        let _guard = self.locks[slot].lock().unwrap_or_else(|e| e.into_inner());
        let path = self.dir.join(name);
        let file = with_retries(&self.retry, "sensor open", || File::open(&path))?;
        let mut reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut buf = [0u8; SensorRecord::WIRE_SIZE];
        loop {
            match reader.read_exact(&mut buf) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            }
            let record = SensorRecord::from_payload(&buf)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            // Records are stored in timestamp order; stop past the range.
            if record.timestamp > hi {
                break;
            }
            if record.timestamp >= lo {
                records.push(record);
                if records.len() >= limit {
                    break;
                }
            }
        }
        Ok(records)
    }
}
