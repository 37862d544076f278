//! embedded-hal adapter.
//!
//! Wraps one `OutputPin` (trigger), one `InputPin` (echo) and a `DelayNs`
//! from any embedded-hal 1.0 HAL as a two-pin [`GpioPort`], so the
//! distance sampler runs unchanged on boards other than the Pi.  The
//! monotonic clock is `std::time::Instant`.

use std::time::Instant;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

use crate::app::ports::{GpioPort, Level};
use crate::error::PortError;

pub struct HalPins<T, E, D> {
    trigger_id: u8,
    echo_id: u8,
    trigger: T,
    echo: E,
    delay: D,
    start: Instant,
    trigger_claimed: bool,
    echo_claimed: bool,
}

impl<T, E, D> HalPins<T, E, D>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
{
    /// `trigger_id` / `echo_id` are the ids the sampler config will use.
    pub fn new(trigger_id: u8, trigger: T, echo_id: u8, echo: E, delay: D) -> Self {
        Self {
            trigger_id,
            echo_id,
            trigger,
            echo,
            delay,
            start: Instant::now(),
            trigger_claimed: false,
            echo_claimed: false,
        }
    }

    /// Return the wrapped HAL objects.
    pub fn into_parts(self) -> (T, E, D) {
        (self.trigger, self.echo, self.delay)
    }

    fn check_known(&self, pin: u8) -> Result<(), PortError> {
        if pin == self.trigger_id || pin == self.echo_id {
            Ok(())
        } else {
            Err(PortError::UnknownPin(pin))
        }
    }
}

impl<T, E, D> GpioPort for HalPins<T, E, D>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
{
    fn set_output(&mut self, pin: u8) -> Result<(), PortError> {
        self.check_known(pin)?;
        if pin != self.trigger_id {
            return Err(PortError::WrongDirection(pin));
        }
        self.trigger_claimed = true;
        Ok(())
    }

    fn set_input(&mut self, pin: u8) -> Result<(), PortError> {
        self.check_known(pin)?;
        if pin != self.echo_id {
            return Err(PortError::WrongDirection(pin));
        }
        self.echo_claimed = true;
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), PortError> {
        self.check_known(pin)?;
        if pin != self.trigger_id {
            return Err(PortError::WrongDirection(pin));
        }
        if !self.trigger_claimed {
            return Err(PortError::NotConfigured(pin));
        }
        self.trigger
            .set_state(PinState::from(level.is_high()))
            .map_err(|_| PortError::Io)
    }

    fn read(&mut self, pin: u8) -> Result<Level, PortError> {
        self.check_known(pin)?;
        if pin != self.echo_id {
            return Err(PortError::WrongDirection(pin));
        }
        if !self.echo_claimed {
            return Err(PortError::NotConfigured(pin));
        }
        self.echo
            .is_high()
            .map(Level::from)
            .map_err(|_| PortError::Io)
    }

    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn delay_us(&mut self, us: u64) {
        let mut remaining = us;
        while remaining > 0 {
            let step = remaining.min(u64::from(u32::MAX));
            self.delay.delay_us(step as u32);
            remaining -= step;
        }
    }

    fn release(&mut self, pin: u8) -> Result<(), PortError> {
        self.check_known(pin)?;
        if pin == self.trigger_id && self.trigger_claimed {
            self.trigger_claimed = false;
            self.trigger.set_low().map_err(|_| PortError::Io)?;
        } else if pin == self.echo_id {
            self.echo_claimed = false;
        }
        Ok(())
    }
}
