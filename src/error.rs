//! Unified error types for pulse-echo.
//!
//! A single [`Error`] enum that every subsystem can convert into, plus the
//! narrower per-subsystem enums the drivers actually return.  All variants
//! are `Copy` so they can be passed around the retry loop without
//! allocation.

use core::fmt;

use crate::sensors::distance::DistanceReading;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A sensor could not produce a trustworthy reading.
    Sensor(SensorError),
    /// The GPIO / 1-Wire collaborator failed.
    Port(PortError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Port(e) => write!(f, "port: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`GpioPort`](crate::app::ports::GpioPort),
/// [`PwmPort`](crate::app::ports::PwmPort) or
/// [`W1Port`](crate::app::ports::W1Port) implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The pin is already claimed by another owner.
    PinBusy(u8),
    /// The pin does not exist on this board / numbering scheme.
    UnknownPin(u8),
    /// The pin was used before being configured (or after release).
    NotConfigured(u8),
    /// The pin is configured in the wrong direction for the request.
    WrongDirection(u8),
    /// Generic I/O failure from the underlying driver.
    Io,
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinBusy(p) => write!(f, "pin {p} is busy"),
            Self::UnknownPin(p) => write!(f, "pin {p} does not exist"),
            Self::NotConfigured(p) => write!(f, "pin {p} is not configured"),
            Self::WrongDirection(p) => write!(f, "pin {p} configured in the wrong direction"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for PortError {}

impl From<PortError> for Error {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorError {
    /// No echo rise within the timeout after the trigger pulse.  The sensor
    /// is most likely disconnected, miswired, or the target is beyond range.
    EchoTimeout { waited_us: u64 },
    /// The echo line rose but never fell within the timeout.
    EchoStuckHigh { waited_us: u64 },
    /// Every attempt was exhausted without two consistent in-range samples.
    /// `last_raw` carries the last first-sample taken, for callers that
    /// still want a best-effort value.
    Unreliable {
        attempts: u8,
        last_raw: Option<DistanceReading>,
    },
    /// A cancellation token fired while the sampler was waiting.
    Cancelled,
    /// The sampler's pins have already been released.
    Released,
    /// The 1-Wire CRC line never reported `YES`.
    TemperatureNotReady,
    /// The 1-Wire payload had no parseable `t=` field.
    TemperatureParse,
    /// The underlying port failed.
    Port(PortError),
}

impl SensorError {
    /// Best-effort value matching the legacy "return the last raw sample"
    /// behaviour on exhausted retries.
    pub fn fallback_reading(&self) -> Option<DistanceReading> {
        match self {
            Self::Unreliable { last_raw, .. } => *last_raw,
            _ => None,
        }
    }

    /// True for failures the retry loop treats as a spent attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::EchoTimeout { .. } | Self::EchoStuckHigh { .. })
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EchoTimeout { waited_us } => {
                write!(f, "timeout waiting for echo signal ({waited_us} us)")
            }
            Self::EchoStuckHigh { waited_us } => {
                write!(f, "echo line stuck high ({waited_us} us)")
            }
            Self::Unreliable { attempts, last_raw } => match last_raw {
                Some(r) => write!(
                    f,
                    "no consistent reading after {attempts} attempts (last raw {r})"
                ),
                None => write!(f, "no consistent reading after {attempts} attempts"),
            },
            Self::Cancelled => write!(f, "measurement cancelled"),
            Self::Released => write!(f, "sensor pins already released"),
            Self::TemperatureNotReady => write!(f, "temperature CRC never became valid"),
            Self::TemperatureParse => write!(f, "couldn't parse temperature file"),
            Self::Port(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<PortError> for SensorError {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::Port(p) => Self::Port(p),
            other => Self::Sensor(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
