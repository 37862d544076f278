//! HC-SR04 ultrasonic pulse-echo distance sampler.
//!
//! A 10 µs HIGH pulse on TRIG makes the sensor emit an ultrasonic burst.
//! ECHO then goes HIGH for the round-trip flight time of that burst.  The
//! sampler busy-polls ECHO through the [`GpioPort`], timestamps the last
//! LOW sample before the rise and the last HIGH sample before the fall,
//! and converts the width to centimetres.
//!
//! ## Per-measurement state machine
//!
//! ```text
//!  Idle ──▶ Triggering ──▶ AwaitingEchoRise ──▶ AwaitingEchoFall ──▶ Computed
//!                               │                     │
//!                          [> 5 s]               [> 5 s]
//!                               ▼                     ▼
//!                           TimedOut              TimedOut
//! ```
//!
//! A reading accepted by the retry loop is marked `Validated`.  Retries
//! always restart the machine from `Idle`.
//!
//! ## Validation
//!
//! Echoes pick up spurious reflections and double bounces, so a single
//! sample is never trusted.  [`DistanceSampler::measure_with_retry`] takes
//! two samples `retry.interval_ms` apart and accepts the first one only if
//! they agree within 5 cm and both lie strictly inside the configured
//! range.  Exhausted attempts surface as [`SensorError::Unreliable`].

use heapless::Vec;
use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::{GpioPort, Level};
use crate::cancel::CancelToken;
use crate::config::{MAX_TRIES_LIMIT, RetryPolicy, SensorConfig};
use crate::error::{Error, SensorError};

/// Width of the TRIG pulse.  The datasheet minimum is 10 µs.
pub const TRIGGER_PULSE_US: u64 = 10;
/// Give up on an echo edge after this long.
pub const ECHO_TIMEOUT_US: u64 = 5_000_000;
/// Two samples closer than this are considered the same reading.
pub const CONSISTENCY_TOLERANCE_CM: f64 = 5.0;
/// Half the speed of sound at ~20 °C; the halving accounts for the round trip.
pub const HALF_SPEED_OF_SOUND_CM_PER_S: f64 = 17_150.0;

/// Sleeps longer than this are sliced so a cancel request is noticed.
const SLEEP_SLICE_US: u64 = 10_000;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SamplerState {
    Idle,
    Triggering,
    AwaitingEchoRise,
    AwaitingEchoFall,
    Computed,
    Validated,
    TimedOut,
}

/// Timestamps of one echo pulse on the port's monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseMeasurement {
    pub start_us: u64,
    pub end_us: u64,
}

impl PulseMeasurement {
    pub fn duration_us(&self) -> u64 {
        self.end_us.saturating_sub(self.start_us)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_us() as f64 / 1_000_000.0
    }

    pub fn distance(&self) -> DistanceReading {
        DistanceReading::from_pulse_secs(self.duration_secs())
    }
}

/// Distance in centimetres, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct DistanceReading(f64);

impl DistanceReading {
    pub fn from_cm(cm: f64) -> Self {
        Self(round_2dp(cm))
    }

    /// `round(duration * 17150, 2)`.
    pub fn from_pulse_secs(secs: f64) -> Self {
        Self::from_cm(secs * HALF_SPEED_OF_SOUND_CM_PER_S)
    }

    pub fn cm(self) -> f64 {
        self.0
    }
}

impl core::fmt::Display for DistanceReading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2} cm", self.0)
    }
}

/// Round to two decimals from the exact decimal expansion of `v`.
/// Scaling by 100 first rounds twice and turns 12.004999… into 12.01.
fn round_2dp(v: f64) -> f64 {
    format!("{v:.2}").parse().unwrap_or(v)
}

/// Outcome of one two-sample attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Accepted,
    /// The samples differ by 5 cm or more.
    Inconsistent,
    /// The samples agree but at least one is outside the range.
    OutOfRange,
    /// One of the samples timed out.
    NoEcho,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub first: Option<DistanceReading>,
    pub second: Option<DistanceReading>,
    pub verdict: Verdict,
}

/// Every attempt made by one validated measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryReport {
    pub attempts: Vec<AttemptRecord, MAX_TRIES_LIMIT>,
    pub reading: Option<DistanceReading>,
}

impl RetryReport {
    /// Number of raw samples taken, including ones that timed out.
    pub fn raw_samples(&self) -> usize {
        self.attempts
            .iter()
            .map(|a| if a.first.is_some() { 2 } else { 1 })
            .sum()
    }

    /// Collapse the report into the caller-facing result.
    pub fn into_result(self) -> Result<DistanceReading, SensorError> {
        match self.reading {
            Some(r) => Ok(r),
            None => Err(SensorError::Unreliable {
                attempts: self.attempts.len() as u8,
                last_raw: self.attempts.iter().rev().find_map(|a| a.first),
            }),
        }
    }
}

/// Accept/reject policy for one pair of samples.
pub fn judge(config: &SensorConfig, first: DistanceReading, second: DistanceReading) -> Verdict {
    if (second.cm() - first.cm()).abs() >= CONSISTENCY_TOLERANCE_CM {
        Verdict::Inconsistent
    } else if !config.in_range(first.cm()) || !config.in_range(second.cm()) {
        Verdict::OutOfRange
    } else {
        Verdict::Accepted
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Owns a trigger/echo pin pair on `P` for its whole lifetime.
pub struct DistanceSampler<P: GpioPort> {
    port: P,
    config: SensorConfig,
    state: SamplerState,
    released: bool,
}

impl<P: GpioPort> DistanceSampler<P> {
    /// Validate `config` and claim both pins.  If the echo pin can't be
    /// claimed the trigger pin is handed back before returning.
    pub fn new(mut port: P, config: SensorConfig) -> Result<Self, Error> {
        config.validate()?;

        port.set_output(config.trigger_pin)?;
        let claimed = port
            .write(config.trigger_pin, Level::Low)
            .and_then(|()| port.set_input(config.echo_pin));
        if let Err(e) = claimed {
            if let Err(release_err) = port.release(config.trigger_pin) {
                warn!(
                    "trigger pin {} not released after failed setup: {}",
                    config.trigger_pin, release_err
                );
            }
            return Err(e.into());
        }

        info!(
            "Distance sampler on trig={} echo={} (range {}..{} cm)",
            config.trigger_pin, config.echo_pin, config.range_min_cm, config.range_max_cm
        );

        Ok(Self {
            port,
            config,
            state: SamplerState::Idle,
            released: false,
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// State reached by the most recent measurement step.
    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Give the port back.  Pins stay claimed unless [`release`] ran first.
    ///
    /// [`release`]: Self::release
    pub fn into_port(self) -> P {
        self.port
    }

    // ── Raw measurement ───────────────────────────────────────

    /// One unfiltered reading.  No range check is applied.
    pub fn measure_once(&mut self) -> Result<DistanceReading, SensorError> {
        self.measure_pulse(None).map(|p| p.distance())
    }

    /// [`measure_once`](Self::measure_once) that stops early when `cancel` fires.
    pub fn measure_once_cancellable(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<DistanceReading, SensorError> {
        self.measure_pulse(Some(cancel)).map(|p| p.distance())
    }

    /// Run the trigger/echo cycle and return the raw pulse timestamps.
    pub fn measure_pulse(
        &mut self,
        cancel: Option<&CancelToken>,
    ) -> Result<PulseMeasurement, SensorError> {
        if self.released {
            return Err(SensorError::Released);
        }
        let trig = self.config.trigger_pin;
        let echo = self.config.echo_pin;

        self.state = SamplerState::Idle;
        self.port.write(trig, Level::Low)?;
        self.pause_us(u64::from(self.config.settle_time_ms) * 1_000, cancel)?;

        self.state = SamplerState::Triggering;
        self.port.write(trig, Level::High)?;
        self.port.delay_us(TRIGGER_PULSE_US);
        self.port.write(trig, Level::Low)?;
        let trig_time = self.port.now_us();

        self.state = SamplerState::AwaitingEchoRise;
        let mut pulse_start = trig_time;
        loop {
            check_cancel(cancel)?;
            if self.port.read(echo)?.is_high() {
                break;
            }
            pulse_start = self.port.now_us();
            let waited_us = pulse_start.saturating_sub(trig_time);
            if waited_us > ECHO_TIMEOUT_US {
                self.state = SamplerState::TimedOut;
                warn!("No echo on pin {} after {} us", echo, waited_us);
                return Err(SensorError::EchoTimeout { waited_us });
            }
        }

        self.state = SamplerState::AwaitingEchoFall;
        let mut pulse_end = pulse_start;
        loop {
            check_cancel(cancel)?;
            if !self.port.read(echo)?.is_high() {
                break;
            }
            pulse_end = self.port.now_us();
            let waited_us = pulse_end.saturating_sub(pulse_start);
            if waited_us > ECHO_TIMEOUT_US {
                self.state = SamplerState::TimedOut;
                warn!("Echo pin {} stuck high for {} us", echo, waited_us);
                return Err(SensorError::EchoStuckHigh { waited_us });
            }
        }

        self.state = SamplerState::Computed;
        let pulse = PulseMeasurement {
            start_us: pulse_start,
            end_us: pulse_end,
        };
        debug!(
            "Echo pulse {} us -> {}",
            pulse.duration_us(),
            pulse.distance()
        );
        Ok(pulse)
    }

    // ── Validated measurement ─────────────────────────────────

    /// Validated reading using the configured [`RetryPolicy`].
    pub fn measure_with_retry(&mut self) -> Result<DistanceReading, SensorError> {
        self.measure_with_policy(self.config.retry)
    }

    /// Validated reading with an explicit policy.  `max_tries` above
    /// [`MAX_TRIES_LIMIT`] is capped; zero tries reports `Unreliable`
    /// without touching the sensor.
    pub fn measure_with_policy(
        &mut self,
        policy: RetryPolicy,
    ) -> Result<DistanceReading, SensorError> {
        self.run_attempts(policy, None)?.into_result()
    }

    pub fn measure_with_retry_cancellable(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<DistanceReading, SensorError> {
        self.run_attempts(self.config.retry, Some(cancel))?
            .into_result()
    }

    /// Like [`measure_with_retry`](Self::measure_with_retry) but returns
    /// every attempt for diagnostics.
    pub fn measure_with_report(&mut self) -> Result<RetryReport, SensorError> {
        self.run_attempts(self.config.retry, None)
    }

    pub fn measure_with_report_cancellable(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<RetryReport, SensorError> {
        self.run_attempts(self.config.retry, Some(cancel))
    }

    fn run_attempts(
        &mut self,
        policy: RetryPolicy,
        cancel: Option<&CancelToken>,
    ) -> Result<RetryReport, SensorError> {
        let mut report = RetryReport::default();
        let tries = policy.max_tries.min(MAX_TRIES_LIMIT as u8);

        for attempt in 1..=tries {
            let record = self.attempt(policy, cancel)?;
            match record.verdict {
                Verdict::Accepted => {
                    self.state = SamplerState::Validated;
                    report.reading = record.first;
                    if let Some(r) = record.first {
                        info!("Distance {} accepted on attempt {}/{}", r, attempt, tries);
                    }
                }
                verdict => {
                    warn!(
                        "Attempt {}/{} rejected ({:?}): first={:?} second={:?}",
                        attempt, tries, verdict, record.first, record.second
                    );
                }
            }
            if report.attempts.push(record).is_err() || report.reading.is_some() {
                break;
            }
        }

        if report.reading.is_none() {
            warn!("No consistent distance after {} attempts", report.attempts.len());
        }
        Ok(report)
    }

    fn attempt(
        &mut self,
        policy: RetryPolicy,
        cancel: Option<&CancelToken>,
    ) -> Result<AttemptRecord, SensorError> {
        let first = match self.measure_pulse(cancel) {
            Ok(p) => p.distance(),
            Err(e) if e.is_transient() => {
                return Ok(AttemptRecord {
                    first: None,
                    second: None,
                    verdict: Verdict::NoEcho,
                });
            }
            Err(e) => return Err(e),
        };

        self.pause_us(u64::from(policy.interval_ms) * 1_000, cancel)?;

        let second = match self.measure_pulse(cancel) {
            Ok(p) => p.distance(),
            Err(e) if e.is_transient() => {
                return Ok(AttemptRecord {
                    first: Some(first),
                    second: None,
                    verdict: Verdict::NoEcho,
                });
            }
            Err(e) => return Err(e),
        };

        Ok(AttemptRecord {
            first: Some(first),
            second: Some(second),
            verdict: judge(&self.config, first, second),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Hand both pins back to the port.  Only the first call does any
    /// work; later calls return `Ok(())`.
    pub fn release(&mut self) -> Result<(), SensorError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.state = SamplerState::Idle;

        let trig = self.port.release(self.config.trigger_pin);
        let echo = self.port.release(self.config.echo_pin);
        info!(
            "Distance sampler released trig={} echo={}",
            self.config.trigger_pin, self.config.echo_pin
        );
        trig?;
        echo?;
        Ok(())
    }

    fn pause_us(&mut self, us: u64, cancel: Option<&CancelToken>) -> Result<(), SensorError> {
        let Some(token) = cancel else {
            if us > 0 {
                self.port.delay_us(us);
            }
            return Ok(());
        };

        let mut remaining = us;
        while remaining > 0 {
            if token.is_cancelled() {
                return Err(SensorError::Cancelled);
            }
            let step = remaining.min(SLEEP_SLICE_US);
            self.port.delay_us(step);
            remaining -= step;
        }
        Ok(())
    }
}

fn check_cancel(cancel: Option<&CancelToken>) -> Result<(), SensorError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(SensorError::Cancelled),
        _ => Ok(()),
    }
}

/// Build a sampler, run `f`, and release the pins on every exit path.
///
/// An error from `f` takes precedence over a release error.
pub fn with_sampler<P, T, F>(port: P, config: SensorConfig, f: F) -> Result<T, Error>
where
    P: GpioPort,
    F: FnOnce(&mut DistanceSampler<P>) -> Result<T, SensorError>,
{
    let mut sampler = DistanceSampler::new(port, config)?;
    let outcome = f(&mut sampler);
    let released = sampler.release();
    let value = outcome?;
    released?;
    Ok(value)
}
