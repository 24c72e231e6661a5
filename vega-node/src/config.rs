//! Operational threshold configuration
//!
//! The node evaluates every sensor sample against these thresholds to pick
//! its operating mode. The gateway updates individual fields over the link;
//! percentage-valued fields are rejected above [`MAX_PERCENTAGE`].

use serde::{Deserialize, Serialize};

/// Upper bound for percentage-valued thresholds and temperatures
pub const MAX_PERCENTAGE: u8 = 100;

/// Sampling cadence and sensor thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Sampling period in seconds (doubled in safe mode)
    pub period_s: u8,
    /// Minimum acceptable temperature, degrees Celsius
    pub min_temp: u8,
    /// Maximum acceptable temperature, degrees Celsius
    pub max_temp: u8,
    /// Minimum acceptable humidity percentage
    pub min_humidity: u8,
    /// Minimum acceptable light percentage
    pub min_light: u8,
    /// Supply voltage below which the node conserves power
    pub safe_voltage: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            period_s: 6,
            min_temp: 15,
            max_temp: 30,
            min_humidity: 20,
            min_light: 70,
            safe_voltage: 2.2,
        }
    }
}

/// A single-field threshold update, the grain of the wire commands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdUpdate {
    /// New minimum temperature
    MinTemp(u8),
    /// New maximum temperature
    MaxTemp(u8),
    /// New minimum humidity
    MinHumidity(u8),
    /// New minimum light level
    MinLight(u8),
    /// New safe-voltage floor (no range check by design)
    SafeVoltage(f32),
}

impl ThresholdConfig {
    /// Apply a single-field update in place
    pub fn apply(&mut self, update: ThresholdUpdate) {
        match update {
            ThresholdUpdate::MinTemp(v) => self.min_temp = v,
            ThresholdUpdate::MaxTemp(v) => self.max_temp = v,
            ThresholdUpdate::MinHumidity(v) => self.min_humidity = v,
            ThresholdUpdate::MinLight(v) => self.min_light = v,
            ThresholdUpdate::SafeVoltage(v) => self.safe_voltage = v,
        }
    }
}

/// Whether a percentage-valued command payload is acceptable
pub fn percentage_in_range(value: u8) -> bool {
    value <= MAX_PERCENTAGE
}
