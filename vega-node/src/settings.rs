//! Persistent threshold storage
//!
//! The node keeps its threshold configuration across reboots. Updates from
//! the protocol handler are persisted synchronously so a power cut after an
//! acknowledged command cannot lose it; the interior mutex serialises them
//! against reads from the sampling path.
//!
//! On first boot, or when the stored file is missing or unreadable, the
//! defaults are restored and written back.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::config::{ThresholdConfig, ThresholdUpdate};
use crate::error::SettingsError;

/// Persistent key/value store for the threshold configuration
#[derive(Debug)]
pub struct ThresholdStore {
    path: PathBuf,
    current: Mutex<ThresholdConfig>,
}

impl ThresholdStore {
    /// Open the store at `path`, restoring defaults when absent or corrupt
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let current = match Self::read(&path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(path = %path.display(), %err, "threshold settings unreadable, restoring defaults");
                let defaults = ThresholdConfig::default();
                Self::write(&path, &defaults)?;
                defaults
            }
        };
        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    /// Current configuration
    pub fn get(&self) -> ThresholdConfig {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a single-field update and persist the result
    pub fn apply(&self, update: ThresholdUpdate) -> Result<ThresholdConfig, SettingsError> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.apply(update);
        Self::write(&self.path, &current)?;
        Ok(*current)
    }

    fn read(path: &Path) -> Result<ThresholdConfig, SettingsError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write(path: &Path, cfg: &ThresholdConfig) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(cfg)?;
        fs::write(path, text)?;
        Ok(())
    }
}
