//! Sensor configuration parameters.
//!
//! Tunable parameters for the distance sampler.  A [`SensorConfig`] is
//! validated once when the sampler is built and is immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pins::{self, PinNumbering};

/// Upper bound on retry attempts; sizes the fixed-capacity attempt record.
pub const MAX_TRIES_LIMIT: usize = 16;

/// Retry / validation policy for [`measure_with_retry`].
///
/// [`measure_with_retry`]: crate::sensors::distance::DistanceSampler::measure_with_retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Pause between the two samples of one attempt (milliseconds)
    pub interval_ms: u32,
    /// Attempts before the reading is declared unreliable
    pub max_tries: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 250,
            max_tries: 4,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tries == 0 {
            return Err(ConfigError::ValidationFailed("max_tries must be at least 1"));
        }
        if self.max_tries as usize > MAX_TRIES_LIMIT {
            return Err(ConfigError::ValidationFailed("max_tries exceeds 16"));
        }
        Ok(())
    }
}

/// Ultrasonic sensor configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    // --- Wiring ---
    /// Output pin driving the sensor's TRIG input
    pub trigger_pin: u8,
    /// Input pin reading the sensor's ECHO output
    pub echo_pin: u8,

    // --- Timing ---
    /// Quiet time before each trigger so earlier echoes die out (milliseconds)
    pub settle_time_ms: u32,

    // --- Acceptance ---
    /// Readings at or below this are rejected (cm)
    pub range_min_cm: f64,
    /// Readings at or above this are rejected (cm)
    pub range_max_cm: f64,

    // --- Retry ---
    pub retry: RetryPolicy,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            trigger_pin: pins::DISTANCE_TRIGGER_PIN,
            echo_pin: pins::DISTANCE_ECHO_PIN,

            settle_time_ms: 1000,

            // HC-SR04 datasheet: 2 cm – 4 m usable, 5 m hard ceiling
            range_min_cm: 2.0,
            range_max_cm: 500.0,

            retry: RetryPolicy::default(),
        }
    }
}

impl SensorConfig {
    /// Config for the given wiring with every other field defaulted.
    pub fn with_pins(trigger_pin: u8, echo_pin: u8) -> Self {
        Self {
            trigger_pin,
            echo_pin,
            ..Self::default()
        }
    }

    /// Reject values that would make the sampler misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger_pin == self.echo_pin {
            return Err(ConfigError::ValidationFailed(
                "trigger_pin and echo_pin must differ",
            ));
        }
        if !self.range_min_cm.is_finite() || !self.range_max_cm.is_finite() {
            return Err(ConfigError::ValidationFailed("range bounds must be finite"));
        }
        if self.range_min_cm < 0.0 {
            return Err(ConfigError::ValidationFailed("range_min_cm must be >= 0"));
        }
        if self.range_min_cm >= self.range_max_cm {
            return Err(ConfigError::ValidationFailed(
                "range_min_cm must be below range_max_cm",
            ));
        }
        self.retry.validate()
    }

    /// Strict open-interval range check.
    pub fn in_range(&self, cm: f64) -> bool {
        cm > self.range_min_cm && cm < self.range_max_cm
    }
}

/// GPIO adapter options, passed in when the adapter is built instead of
/// being configured process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortOptions {
    pub numbering: PinNumbering,
    /// Restore each pin's original mode and level when it is released or
    /// the adapter is dropped.  Off, outputs keep their last level after
    /// the process exits.
    pub reset_on_release: bool,
}

impl Default for PortOptions {
    fn default() -> Self {
        Self {
            numbering: PinNumbering::Bcm,
            reset_on_release: true,
        }
    }
}

impl PortOptions {
    pub fn numbered(numbering: PinNumbering) -> Self {
        Self {
            numbering,
            ..Self::default()
        }
    }

    /// Options for a command whose outputs must outlive the process,
    /// e.g. switching a relay on and exiting.
    pub fn holding_state(numbering: PinNumbering) -> Self {
        Self {
            numbering,
            reset_on_release: false,
        }
    }
}
