//! Raspberry Pi GPIO adapter (rppal).
//!
//! Implements [`GpioPort`] and [`PwmPort`] on top of `rppal::gpio`.  The
//! numbering scheme and reset behaviour are passed in through
//! [`PortOptions`] when the adapter is built; nothing is configured
//! process-wide, so several adapters (or test doubles) can coexist.
//!
//! rppal refuses to hand out a pin twice, which is what keeps two
//! samplers from sharing a trigger/echo pair: the second claim fails with
//! [`PortError::PinBusy`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rppal::gpio::{self, Gpio, InputPin, OutputPin};

use crate::app::ports::{GpioPort, Level, PwmPort};
use crate::error::PortError;
use crate::config::PortOptions;

/// Below this a delay spins instead of sleeping; the scheduler can't
/// honour a 10 µs sleep.
const SPIN_THRESHOLD_US: u64 = 100;

enum Claimed {
    Output(OutputPin),
    Input(InputPin),
}

pub struct RppalGpio {
    gpio: Gpio,
    options: PortOptions,
    pins: HashMap<u8, Claimed>,
    pwm_freq: HashMap<u8, f64>,
    start: Instant,
}

impl RppalGpio {
    pub fn new(options: PortOptions) -> Result<Self, PortError> {
        let gpio = Gpio::new().map_err(|e| {
            warn!("GPIO init failed: {}", e);
            PortError::Io
        })?;
        debug!("rppal GPIO ready ({:?} numbering)", options.numbering);
        Ok(Self {
            gpio,
            options,
            pins: HashMap::new(),
            pwm_freq: HashMap::new(),
            start: Instant::now(),
        })
    }

    pub fn options(&self) -> PortOptions {
        self.options
    }

    fn claim(&mut self, pin: u8) -> Result<gpio::Pin, PortError> {
        let bcm = self
            .options
            .numbering
            .to_bcm(pin)
            .ok_or(PortError::UnknownPin(pin))?;
        // Dropping a previous claim frees the line for re-configuration.
        self.pins.remove(&pin);
        self.pwm_freq.remove(&pin);
        self.gpio.get(bcm).map_err(|e| map_error(pin, &e))
    }

    fn output(&mut self, pin: u8) -> Result<&mut OutputPin, PortError> {
        match self.pins.get_mut(&pin) {
            Some(Claimed::Output(p)) => Ok(p),
            Some(Claimed::Input(_)) => Err(PortError::WrongDirection(pin)),
            None => Err(PortError::NotConfigured(pin)),
        }
    }
}

fn map_error(pin: u8, e: &gpio::Error) -> PortError {
    match e {
        gpio::Error::PinUsed(_) => PortError::PinBusy(pin),
        gpio::Error::PinNotAvailable(_) => PortError::UnknownPin(pin),
        other => {
            warn!("GPIO pin {} error: {}", pin, other);
            PortError::Io
        }
    }
}

impl GpioPort for RppalGpio {
    fn set_output(&mut self, pin: u8) -> Result<(), PortError> {
        let mut out = self.claim(pin)?.into_output();
        out.set_reset_on_drop(self.options.reset_on_release);
        self.pins.insert(pin, Claimed::Output(out));
        Ok(())
    }

    fn set_input(&mut self, pin: u8) -> Result<(), PortError> {
        let mut input = self.claim(pin)?.into_input();
        input.set_reset_on_drop(self.options.reset_on_release);
        self.pins.insert(pin, Claimed::Input(input));
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), PortError> {
        let out = self.output(pin)?;
        match level {
            Level::High => out.set_high(),
            Level::Low => out.set_low(),
        }
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, PortError> {
        match self.pins.get(&pin) {
            Some(Claimed::Input(p)) => Ok(Level::from(p.is_high())),
            Some(Claimed::Output(p)) => Ok(Level::from(p.is_set_high())),
            None => Err(PortError::NotConfigured(pin)),
        }
    }

    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn delay_us(&mut self, us: u64) {
        if us < SPIN_THRESHOLD_US {
            let until = Instant::now() + Duration::from_micros(us);
            while Instant::now() < until {
                std::hint::spin_loop();
            }
        } else {
            std::thread::sleep(Duration::from_micros(us));
        }
    }

    fn release(&mut self, pin: u8) -> Result<(), PortError> {
        self.pwm_freq.remove(&pin);
        if self.pins.remove(&pin).is_some() {
            debug!("GPIO pin {} released", pin);
        }
        Ok(())
    }
}

impl PwmPort for RppalGpio {
    fn start_pwm(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty_percent: f64,
    ) -> Result<(), PortError> {
        let duty = duty_percent.clamp(0.0, 100.0) / 100.0;
        self.output(pin)?
            .set_pwm_frequency(frequency_hz, duty)
            .map_err(|e| map_error(pin, &e))?;
        self.pwm_freq.insert(pin, frequency_hz);
        Ok(())
    }

    fn set_duty(&mut self, pin: u8, duty_percent: f64) -> Result<(), PortError> {
        let freq = *self
            .pwm_freq
            .get(&pin)
            .ok_or(PortError::NotConfigured(pin))?;
        self.start_pwm(pin, freq, duty_percent)
    }

    fn stop_pwm(&mut self, pin: u8) -> Result<(), PortError> {
        self.output(pin)?
            .clear_pwm()
            .map_err(|e| map_error(pin, &e))?;
        self.pwm_freq.remove(&pin);
        Ok(())
    }
}
