//! RGB LED driver.
//!
//! Three output pins drive discrete R/G/B LEDs (or a common-cathode RGB
//! LED).  Solid colours use plain digital writes; fades use software PWM
//! through the [`PwmPort`].  Switching to a solid colour always stops PWM
//! first, otherwise the PWM thread would keep overwriting the pin.
//!
//! | Operation       | Description                                      |
//! |-----------------|--------------------------------------------------|
//! | `color`         | One channel fully on, optionally the others off  |
//! | `change_colors` | Set per-channel duty; `None` leaves it unchanged |
//! | `cycle_colors`  | Three 100-step cross-fades                       |
//! | `sine_sweep`    | Phase-shifted sine on each channel, 0–720°       |

use log::debug;

use crate::app::ports::{Level, PwmPort};
use crate::cancel::CancelToken;
use crate::error::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbPins {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RgbPins {
    pub fn pin(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }

    /// Blue, green, red: the order PWM is started and stopped in.
    fn all(&self) -> [u8; 3] {
        [self.blue, self.green, self.red]
    }
}

/// Positive sine wave between 0 and `2 * amplitude`.
///
/// `angle_deg` is in degrees; `frequency` scales the angle.
pub fn pos_sin_wave(amplitude: f64, angle_deg: f64, frequency: f64) -> f64 {
    amplitude + amplitude * (angle_deg.to_radians() * frequency).sin()
}

pub struct RgbLed<P: PwmPort> {
    port: P,
    pins: RgbPins,
    hz: f64,
    pwm_running: bool,
    released: bool,
}

impl<P: PwmPort> RgbLed<P> {
    /// Claim the pins and switch everything off.  With `start_pwm` the
    /// channels start PWM at duty 0.
    pub fn new(mut port: P, pins: RgbPins, hz: f64, start_pwm: bool) -> Result<Self, PortError> {
        for pin in pins.all() {
            port.set_output(pin)?;
        }
        for pin in pins.all() {
            port.write(pin, Level::Low)?;
        }
        let mut led = Self {
            port,
            pins,
            hz,
            pwm_running: false,
            released: false,
        };
        if start_pwm {
            led.start_pwm(0.0)?;
        }
        Ok(led)
    }

    pub fn is_pwm_running(&self) -> bool {
        self.pwm_running
    }

    pub fn start_pwm(&mut self, duty_percent: f64) -> Result<(), PortError> {
        self.ensure_claimed()?;
        for pin in self.pins.all() {
            self.port.start_pwm(pin, self.hz, duty_percent)?;
        }
        self.pwm_running = true;
        Ok(())
    }

    pub fn stop_pwm(&mut self) -> Result<(), PortError> {
        if !self.pwm_running {
            return Ok(());
        }
        for pin in self.pins.all() {
            self.port.stop_pwm(pin)?;
        }
        self.pwm_running = false;
        Ok(())
    }

    /// Drive one channel fully on.  With `exclusive` the other two go off.
    pub fn color(&mut self, channel: Channel, exclusive: bool) -> Result<(), PortError> {
        self.ensure_claimed()?;
        self.stop_pwm()?;
        if exclusive {
            self.all_low()?;
        }
        self.port.write(self.pins.pin(channel), Level::High)
    }

    pub fn off(&mut self) -> Result<(), PortError> {
        self.ensure_claimed()?;
        self.stop_pwm()?;
        self.all_low()
    }

    /// Set each channel's duty cycle, then block for `delay_ms`.
    /// Starts PWM at duty 0 first if it isn't running.
    pub fn change_colors(
        &mut self,
        red: Option<f64>,
        green: Option<f64>,
        blue: Option<f64>,
        delay_ms: u32,
    ) -> Result<(), PortError> {
        if !self.pwm_running {
            self.start_pwm(0.0)?;
        }
        for (channel, duty) in [(Channel::Red, red), (Channel::Green, green), (Channel::Blue, blue)] {
            if let Some(duty) = duty {
                self.port.set_duty(self.pins.pin(channel), duty)?;
            }
        }
        if delay_ms > 0 {
            self.port.delay_us(u64::from(delay_ms) * 1_000);
        }
        Ok(())
    }

    /// Green→blue, blue→red, red→green/2 cross-fades, 100 steps each.
    pub fn cycle_colors(&mut self, delay_ms: u32) -> Result<(), PortError> {
        for i in 0..100 {
            let i = f64::from(i);
            self.change_colors(None, Some(100.0 - i), Some(i), delay_ms)?;
        }
        for i in 0..100 {
            let i = f64::from(i);
            self.change_colors(Some(i), None, Some(100.0 - i), delay_ms)?;
        }
        for i in 0..100 {
            let i = f64::from(i);
            self.change_colors(Some(100.0 - i), Some(i / 2.0), None, delay_ms)?;
        }
        Ok(())
    }

    /// One 0–720° sweep in 5° steps, 100 ms per step.  Red, green and blue
    /// run at 0.5×, 1× and 2× angular frequency.  Returns early when
    /// `cancel` fires.
    pub fn sine_sweep(&mut self, cancel: Option<&CancelToken>) -> Result<(), PortError> {
        for angle in (0..720).step_by(5) {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                debug!("sine sweep cancelled at {} deg", angle);
                return Ok(());
            }
            let angle = f64::from(angle);
            self.change_colors(
                Some(pos_sin_wave(50.0, angle, 0.5)),
                Some(pos_sin_wave(50.0, angle, 1.0)),
                Some(pos_sin_wave(50.0, angle, 2.0)),
                100,
            )?;
        }
        Ok(())
    }

    /// Stop PWM, switch off and hand the pins back.  Idempotent.
    pub fn release(&mut self) -> Result<(), PortError> {
        if self.released {
            return Ok(());
        }
        let off = self.off();
        self.released = true;
        for pin in self.pins.all() {
            self.port.release(pin)?;
        }
        off
    }

    pub fn into_port(self) -> P {
        self.port
    }

    fn all_low(&mut self) -> Result<(), PortError> {
        for pin in [self.pins.red, self.pins.green, self.pins.blue] {
            self.port.write(pin, Level::Low)?;
        }
        Ok(())
    }

    fn ensure_claimed(&self) -> Result<(), PortError> {
        if self.released {
            Err(PortError::NotConfigured(self.pins.red))
        } else {
            Ok(())
        }
    }
}
