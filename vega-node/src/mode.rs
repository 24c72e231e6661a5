//! Mode evaluation and transition events
//!
//! Every sensor sample is scored against the thresholds to pick a candidate
//! mode, the candidate is compared against the previously published mode,
//! and each change emits exactly one event record. The machine starts in
//! `Uninitialized`; the first published mode emits `Init`, and self-loops
//! emit nothing.

use std::time::Duration;

use tracing::debug;
use vega::{EventKind, EventRecord, Mode, SensorRecord};

use crate::config::{ThresholdConfig, ThresholdUpdate};

/// A raw sensor sample, before the mode machine stamps mode and time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Temperature in degrees Celsius
    pub temp: u8,
    /// Relative humidity percentage
    pub humidity: u8,
    /// Light level percentage
    pub light: u8,
    /// Supply voltage in volts
    pub voltage: f32,
}

/// Candidate mode for a reading under the given thresholds
///
/// Out-of-range readings put the node in `Error`, except that a supply
/// voltage below the safe floor overrides to `Safe`: a brown-out is handled
/// by conserving power, not by alarming.
pub fn classify(limits: &ThresholdConfig, reading: &SensorReading) -> Mode {
    let mut in_range = true;

    if reading.humidity < limits.min_humidity {
        debug!(humidity = reading.humidity, min = limits.min_humidity, "humidity below minimum");
        in_range = false;
    }
    if reading.temp < limits.min_temp || reading.temp > limits.max_temp {
        debug!(temp = reading.temp, min = limits.min_temp, max = limits.max_temp, "temperature out of range");
        in_range = false;
    }
    if reading.light < limits.min_light {
        debug!(light = reading.light, min = limits.min_light, "light below minimum");
        in_range = false;
    }
    if reading.voltage < limits.safe_voltage {
        debug!(voltage = reading.voltage, floor = limits.safe_voltage, "voltage below safe floor");
        in_range = false;
    }

    if in_range {
        Mode::Ok
    } else if reading.voltage < limits.safe_voltage {
        Mode::Safe
    } else {
        Mode::Error
    }
}

/// Tracks the published mode and turns changes into events
#[derive(Debug)]
pub struct ModeMachine {
    mode: Mode,
    limits: ThresholdConfig,
}

impl ModeMachine {
    /// Create a machine in `Uninitialized` with the given thresholds
    pub fn new(limits: ThresholdConfig) -> Self {
        Self {
            mode: Mode::Uninitialized,
            limits,
        }
    }

    /// The currently published mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The thresholds in effect
    pub fn limits(&self) -> ThresholdConfig {
        self.limits
    }

    /// Apply a threshold update to the live evaluation
    pub fn apply(&mut self, update: ThresholdUpdate) {
        self.limits.apply(update);
    }

    /// Evaluate a reading taken at `timestamp`
    ///
    /// Returns the stamped record and, when the mode changed, the single
    /// event describing the transition.
    pub fn observe(
        &mut self,
        reading: &SensorReading,
        timestamp: u32,
    ) -> (SensorRecord, Option<EventRecord>) {
        let candidate = classify(&self.limits, reading);
        let event = EventKind::transition(self.mode, candidate)
            .map(|event| EventRecord { event, timestamp });
        self.mode = candidate;

        let record = SensorRecord {
            timestamp,
            temp: reading.temp,
            humidity: reading.humidity,
            light: reading.light,
            mode: candidate,
            voltage: reading.voltage,
        };
        (record, event)
    }

    /// Time until the next sample: the configured period, doubled in safe
    /// mode to stretch the remaining charge
    pub fn sample_interval(&self) -> Duration {
        let period = Duration::from_secs(u64::from(self.limits.period_s));
        if self.mode == Mode::Safe {
            period * 2
        } else {
            period
        }
    }
}
