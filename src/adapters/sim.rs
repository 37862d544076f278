//! Simulated GPIO board.
//!
//! A virtual-clock [`GpioPort`] + [`PwmPort`] for host-side testing and the
//! CLI's `--sim` mode.  Time only moves when the caller asks it to:
//!
//! - `delay_us` advances the clock by the requested amount;
//! - every `read` advances it by `poll_step_us` (the cost of one poll).
//!
//! The echo line follows a queue of [`EchoScript`] entries, one consumed
//! per trigger pulse.  When the queue is empty the fallback script is used
//! (default: [`EchoScript::Silent`]).

use std::collections::{HashMap, VecDeque};

use crate::app::ports::{GpioPort, Level, PwmPort};
use crate::error::PortError;
use crate::sensors::distance::HALF_SPEED_OF_SOUND_CM_PER_S;

/// Delay between the trigger falling edge and the echo rising edge on a
/// real HC-SR04 (the 8-cycle 40 kHz burst plus driver latency).
pub const DEFAULT_ECHO_DELAY_US: u64 = 450;

/// Pin id used by [`SimGpio::without_sensor`].
const NO_SENSOR_PIN: u8 = u8::MAX;

/// Echo response to a single trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoScript {
    /// Echo rises `delay_us` after the trigger falls and stays high for `width_us`.
    Pulse { delay_us: u64, width_us: u64 },
    /// Echo never rises.
    Silent,
    /// Echo rises after `delay_us` and never falls.
    StuckHigh { delay_us: u64 },
}

impl EchoScript {
    /// Pulse whose width encodes `cm` (rounded to whole microseconds).
    pub fn for_distance(cm: f64) -> Self {
        let width_us = (cm / HALF_SPEED_OF_SOUND_CM_PER_S * 1_000_000.0).round() as u64;
        Self::Pulse {
            delay_us: DEFAULT_ECHO_DELAY_US,
            width_us,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmState {
    pub frequency_hz: f64,
    pub duty_percent: f64,
}

/// Armed echo window: HIGH for `rise_at <= t < fall_at`.
#[derive(Debug, Clone, Copy)]
struct EchoWindow {
    rise_at: u64,
    fall_at: Option<u64>,
}

pub struct SimGpio {
    now_us: u64,
    poll_step_us: u64,
    trigger_pin: u8,
    echo_pin: u8,

    modes: HashMap<u8, PinMode>,
    levels: HashMap<u8, Level>,
    pwm: HashMap<u8, PwmState>,

    script: VecDeque<EchoScript>,
    fallback: EchoScript,
    window: Option<EchoWindow>,
    trigger_high_since: Option<u64>,

    trigger_widths: Vec<u64>,
    delays: Vec<u64>,
    released: Vec<u8>,
    writes: Vec<(u8, Level)>,
}

impl SimGpio {
    /// `trigger_pin` / `echo_pin` select which pins behave like an HC-SR04.
    pub fn new(trigger_pin: u8, echo_pin: u8) -> Self {
        Self {
            now_us: 0,
            poll_step_us: 1,
            trigger_pin,
            echo_pin,
            modes: HashMap::new(),
            levels: HashMap::new(),
            pwm: HashMap::new(),
            script: VecDeque::new(),
            fallback: EchoScript::Silent,
            window: None,
            trigger_high_since: None,
            trigger_widths: Vec::new(),
            delays: Vec::new(),
            released: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// A board with no HC-SR04 attached, for relay and LED use.  The
    /// sensor pins sit outside any header so no write arms an echo.
    pub fn without_sensor() -> Self {
        Self::new(NO_SENSOR_PIN, NO_SENSOR_PIN)
    }

    /// Cost of one echo poll.  Larger steps make timeout tests cheaper.
    #[must_use]
    pub fn with_poll_step_us(mut self, step: u64) -> Self {
        self.poll_step_us = step.max(1);
        self
    }

    /// Response used once the scripted queue runs dry.
    #[must_use]
    pub fn with_fallback(mut self, script: EchoScript) -> Self {
        self.fallback = script;
        self
    }

    pub fn push_echo(&mut self, script: EchoScript) {
        self.script.push_back(script);
    }

    /// Queue one pulse per distance, in order.
    pub fn push_distances(&mut self, cms: &[f64]) {
        for &cm in cms {
            self.push_echo(EchoScript::for_distance(cm));
        }
    }

    /// Force the level seen on a non-echo input pin.
    pub fn set_input_level(&mut self, pin: u8, level: Level) {
        self.levels.insert(pin, level);
    }

    // ── Inspection ────────────────────────────────────────────

    /// Completed trigger pulses (HIGH followed by LOW on the trigger pin).
    pub fn trigger_count(&self) -> usize {
        self.trigger_widths.len()
    }

    pub fn trigger_widths(&self) -> &[u64] {
        &self.trigger_widths
    }

    /// Every `delay_us` call, in order.
    pub fn delays(&self) -> &[u64] {
        &self.delays
    }

    /// Pins actually released (no-op releases are not recorded).
    pub fn released_pins(&self) -> &[u8] {
        &self.released
    }

    /// Every output write, in order.
    pub fn writes(&self) -> &[(u8, Level)] {
        &self.writes
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(&pin).copied()
    }

    pub fn is_claimed(&self, pin: u8) -> bool {
        self.modes.contains_key(&pin)
    }

    pub fn output_level(&self, pin: u8) -> Option<Level> {
        match self.mode(pin) {
            Some(PinMode::Output) => self.levels.get(&pin).copied(),
            _ => None,
        }
    }

    pub fn pwm(&self, pin: u8) -> Option<PwmState> {
        self.pwm.get(&pin).copied()
    }

    // ── Internal ──────────────────────────────────────────────

    fn claim(&mut self, pin: u8, mode: PinMode) -> Result<(), PortError> {
        match self.modes.get(&pin) {
            Some(existing) if *existing != mode => Err(PortError::PinBusy(pin)),
            _ => {
                self.modes.insert(pin, mode);
                Ok(())
            }
        }
    }

    fn require(&self, pin: u8, mode: PinMode) -> Result<(), PortError> {
        match self.modes.get(&pin) {
            None => Err(PortError::NotConfigured(pin)),
            Some(m) if *m != mode => Err(PortError::WrongDirection(pin)),
            Some(_) => Ok(()),
        }
    }

    fn arm_echo(&mut self) {
        let script = self.script.pop_front().unwrap_or(self.fallback);
        self.window = match script {
            EchoScript::Pulse { delay_us, width_us } => Some(EchoWindow {
                rise_at: self.now_us + delay_us,
                fall_at: Some(self.now_us + delay_us + width_us),
            }),
            EchoScript::StuckHigh { delay_us } => Some(EchoWindow {
                rise_at: self.now_us + delay_us,
                fall_at: None,
            }),
            EchoScript::Silent => None,
        };
    }

    fn echo_level(&self) -> Level {
        let high = self.window.is_some_and(|w| {
            self.now_us >= w.rise_at && w.fall_at.is_none_or(|fall| self.now_us < fall)
        });
        Level::from(high)
    }
}

impl GpioPort for SimGpio {
    fn set_output(&mut self, pin: u8) -> Result<(), PortError> {
        self.claim(pin, PinMode::Output)
    }

    fn set_input(&mut self, pin: u8) -> Result<(), PortError> {
        self.claim(pin, PinMode::Input)
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), PortError> {
        self.require(pin, PinMode::Output)?;
        self.writes.push((pin, level));
        self.levels.insert(pin, level);

        if pin == self.trigger_pin {
            match level {
                Level::High => {
                    self.trigger_high_since.get_or_insert(self.now_us);
                }
                Level::Low => {
                    if let Some(since) = self.trigger_high_since.take() {
                        self.trigger_widths.push(self.now_us - since);
                        self.arm_echo();
                    }
                }
            }
        }
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, PortError> {
        self.require(pin, PinMode::Input)?;
        self.now_us += self.poll_step_us;
        if pin == self.echo_pin {
            Ok(self.echo_level())
        } else {
            Ok(self.levels.get(&pin).copied().unwrap_or(Level::Low))
        }
    }

    fn now_us(&self) -> u64 {
        self.now_us
    }

    fn delay_us(&mut self, us: u64) {
        self.delays.push(us);
        self.now_us += us;
    }

    fn release(&mut self, pin: u8) -> Result<(), PortError> {
        if self.modes.remove(&pin).is_some() {
            self.pwm.remove(&pin);
            self.released.push(pin);
        }
        Ok(())
    }
}

impl PwmPort for SimGpio {
    fn start_pwm(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty_percent: f64,
    ) -> Result<(), PortError> {
        self.require(pin, PinMode::Output)?;
        self.pwm.insert(
            pin,
            PwmState {
                frequency_hz,
                duty_percent: duty_percent.clamp(0.0, 100.0),
            },
        );
        Ok(())
    }

    fn set_duty(&mut self, pin: u8, duty_percent: f64) -> Result<(), PortError> {
        self.require(pin, PinMode::Output)?;
        match self.pwm.get_mut(&pin) {
            Some(state) => {
                state.duty_percent = duty_percent.clamp(0.0, 100.0);
                Ok(())
            }
            None => Err(PortError::NotConfigured(pin)),
        }
    }

    fn stop_pwm(&mut self, pin: u8) -> Result<(), PortError> {
        self.require(pin, PinMode::Output)?;
        self.pwm.remove(&pin);
        Ok(())
    }
}
