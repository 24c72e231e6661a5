//! # Vega Node
//!
//! The satellite-side peer of the Vega telemetry link: evaluates sensor
//! samples against operational thresholds, logs history to bounded on-disk
//! stores, and serves the gateway's requests over the framed protocol.
//!
//! ## Modules
//!
//! - [`engine`]: frame dispatch, sampling path, beacon and event emission
//! - [`mode`]: mode evaluation and transition events
//! - [`config`]: threshold configuration and single-field updates
//! - [`settings`]: persistent threshold storage
//! - [`log`]: day-bucketed sensor store and flat event store
//!
//! Hardware stays outside: sensor drivers produce [`SensorReading`]s, the
//! serial port consumes what the send queue drains, and task scheduling
//! belongs to the integration layer.

pub mod config;
pub mod engine;
pub mod error;
pub mod log;
pub mod mode;
pub mod settings;

pub use config::{percentage_in_range, ThresholdConfig, ThresholdUpdate, MAX_PERCENTAGE};
pub use engine::{NodeEngine, BEACON_PERIOD, MAX_LOG_ENTRIES};
pub use error::{LogError, NodeError, Result, SettingsError};
pub use log::{
    event::EventLog, sensor::SensorLog, ExtractStatus, Extraction, RetryPolicy, MAX_BUCKETS,
    MAX_WRITE_RETRIES,
};
pub use mode::{classify, ModeMachine, SensorReading};
pub use settings::ThresholdStore;
