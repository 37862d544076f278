//! Port traits — the hexagonal boundary between sensor logic and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DistanceSampler / Relay / RgbLed (domain)
//! ```
//!
//! Driven adapters (rppal, embedded-hal pins, the simulator, sysfs 1-Wire)
//! implement these traits.  The drivers consume them via generics, so the
//! domain code never touches hardware directly.
//!
//! Pin ids are plain `u8` in whatever numbering scheme the adapter was
//! constructed with; the adapter owns that choice, not process-wide state.

use crate::error::PortError;

// ───────────────────────────────────────────────────────────────
// Digital level
// ───────────────────────────────────────────────────────────────

/// Logic level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Self::High)
    }

    /// The opposite level.
    #[must_use]
    pub fn inverted(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

// ───────────────────────────────────────────────────────────────
// GPIO port (driven adapter: domain ↔ pins + monotonic clock)
// ───────────────────────────────────────────────────────────────

/// Minimal digital I/O plus timing.
///
/// `now_us` must be monotonic.  `delay_us` blocks the caller; simulated
/// adapters advance their virtual clock instead.
pub trait GpioPort {
    /// Claim `pin` and configure it as a push-pull output.
    fn set_output(&mut self, pin: u8) -> Result<(), PortError>;

    /// Claim `pin` and configure it as a floating input.
    fn set_input(&mut self, pin: u8) -> Result<(), PortError>;

    /// Drive an output pin.
    fn write(&mut self, pin: u8, level: Level) -> Result<(), PortError>;

    /// Sample an input pin.
    fn read(&mut self, pin: u8) -> Result<Level, PortError>;

    /// Microseconds on the port's monotonic clock.
    fn now_us(&self) -> u64;

    /// Block for `us` microseconds.
    fn delay_us(&mut self, us: u64);

    /// Return `pin` to its unclaimed state.  Releasing an unclaimed pin
    /// is not an error.
    fn release(&mut self, pin: u8) -> Result<(), PortError>;
}

/// Lets a driver borrow a port instead of owning it.
impl<P: GpioPort + ?Sized> GpioPort for &mut P {
    fn set_output(&mut self, pin: u8) -> Result<(), PortError> {
        (**self).set_output(pin)
    }

    fn set_input(&mut self, pin: u8) -> Result<(), PortError> {
        (**self).set_input(pin)
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), PortError> {
        (**self).write(pin, level)
    }

    fn read(&mut self, pin: u8) -> Result<Level, PortError> {
        (**self).read(pin)
    }

    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    fn delay_us(&mut self, us: u64) {
        (**self).delay_us(us);
    }

    fn release(&mut self, pin: u8) -> Result<(), PortError> {
        (**self).release(pin)
    }
}

// ───────────────────────────────────────────────────────────────
// PWM port (driven adapter: domain → software / hardware PWM)
// ───────────────────────────────────────────────────────────────

/// PWM on top of plain GPIO.  Duty cycles are percentages, 0.0–100.0.
pub trait PwmPort: GpioPort {
    /// Start PWM on an output pin.
    fn start_pwm(&mut self, pin: u8, frequency_hz: f64, duty_percent: f64)
    -> Result<(), PortError>;

    /// Change the duty cycle of a running PWM channel.
    fn set_duty(&mut self, pin: u8, duty_percent: f64) -> Result<(), PortError>;

    /// Stop PWM; the pin keeps its last static level.
    fn stop_pwm(&mut self, pin: u8) -> Result<(), PortError>;
}

impl<P: PwmPort + ?Sized> PwmPort for &mut P {
    fn start_pwm(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty_percent: f64,
    ) -> Result<(), PortError> {
        (**self).start_pwm(pin, frequency_hz, duty_percent)
    }

    fn set_duty(&mut self, pin: u8, duty_percent: f64) -> Result<(), PortError> {
        (**self).set_duty(pin, duty_percent)
    }

    fn stop_pwm(&mut self, pin: u8) -> Result<(), PortError> {
        (**self).stop_pwm(pin)
    }
}

// ───────────────────────────────────────────────────────────────
// 1-Wire port (driven adapter: kernel w1 bus → domain)
// ───────────────────────────────────────────────────────────────

/// Access to a DS18B20 `w1_slave` payload.
pub trait W1Port {
    /// Read the raw two-line `w1_slave` text.
    fn read_slave(&mut self) -> Result<String, PortError>;

    /// Block for `ms` milliseconds between CRC retries.
    fn pause_ms(&mut self, ms: u32);
}
