//! Flat event record store
//!
//! Mode-transition events go to a single append-only file named `event`.
//! Events are rare, so there is no bucketing and no retention policy; the
//! file grows by five bytes per transition and survives restarts.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use vega::EventRecord;

use super::{check_range, with_retries, Extraction, RetryPolicy};
use crate::error::LogError;

/// File name of the event log inside its directory
pub const EVENT_FILE: &str = "event";

/// Single-file append-only store of event records
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    retry: RetryPolicy,
    lock: Mutex<()>,
}

impl EventLog {
    /// Open the store under `dir`, creating the directory and file if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LogError> {
        Self::with_retry_policy(dir, RetryPolicy::default())
    }

    /// Open with a custom file-retry policy
    pub fn with_retry_policy(dir: impl Into<PathBuf>, retry: RetryPolicy) -> Result<Self, LogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let path = dir.join(EVENT_FILE);
        // Touch the file so extraction before the first event sees an
        // empty log rather than a missing one.
        OpenOptions::new().append(true).create(true).open(&path)?;
        Ok(Self {
            path,
            retry,
            lock: Mutex::new(()),
        })
    }

    /// Append one event record
    pub fn append(&self, record: &EventRecord) -> Result<(), LogError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let payload = record.to_payload();
        with_retries(&self.retry, "event append", || {
            let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
            file.write_all(&payload)?;
            file.sync_all()?;
            Ok(())
        })?;
        Ok(())
    }

    /// Extract events with `lo <= timestamp <= hi`, up to `max_entries`
    pub fn extract(
        &self,
        lo: u32,
        hi: u32,
        max_entries: usize,
    ) -> Result<Extraction<EventRecord>, LogError> {
        check_range(lo, hi, max_entries)?;

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = with_retries(&self.retry, "event open", || File::open(&self.path))?;
        let mut reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut buf = [0u8; EventRecord::WIRE_SIZE];
        loop {
            match reader.read_exact(&mut buf) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            }
            let record = EventRecord::from_payload(&buf)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            if record.timestamp > hi {
                break;
            }
            if record.timestamp >= lo {
                records.push(record);
                if records.len() >= max_entries {
                    break;
                }
            }
        }
        Ok(Extraction::new(records, max_entries))
    }
}

#[cfg(test)]
mod tests {
    use super::super::ExtractStatus;
    use super::*;
    use vega::EventKind;

    fn event(kind: EventKind, timestamp: u32) -> EventRecord {
        EventRecord {
            event: kind,
            timestamp,
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            backoff: std::time::Duration::from_millis(1),
        }
    }

    #[test]
    fn test_empty_log_extracts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::with_retry_policy(dir.path(), quick_retry()).unwrap();
        let extraction = log.extract(0, 1000, 5).unwrap();
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.status, ExtractStatus::Partial);
    }

    #[test]
    fn test_append_and_extract_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::with_retry_policy(dir.path(), quick_retry()).unwrap();

        log.append(&event(EventKind::Init, 100)).unwrap();
        log.append(&event(EventKind::OkToError, 200)).unwrap();
        log.append(&event(EventKind::ErrorToOk, 300)).unwrap();

        let extraction = log.extract(150, 250, 5).unwrap();
        assert_eq!(extraction.records, vec![event(EventKind::OkToError, 200)]);
    }

    #[test]
    fn test_budget_caps_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::with_retry_policy(dir.path(), quick_retry()).unwrap();
        for ts in 0..10 {
            log.append(&event(EventKind::OkToError, ts * 10)).unwrap();
        }
        let extraction = log.extract(0, 1000, 4).unwrap();
        assert_eq!(extraction.records.len(), 4);
        assert_eq!(extraction.status, ExtractStatus::Complete);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = EventLog::with_retry_policy(dir.path(), quick_retry()).unwrap();
            log.append(&event(EventKind::Init, 50)).unwrap();
        }
        let log = EventLog::with_retry_policy(dir.path(), quick_retry()).unwrap();
        let extraction = log.extract(0, 100, 5).unwrap();
        assert_eq!(extraction.records.len(), 1);
    }

    #[test]
    fn test_invalid_range() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::with_retry_policy(dir.path(), quick_retry()).unwrap();
        assert!(matches!(log.extract(50, 10, 5), Err(LogError::InvalidRange)));
    }
}
