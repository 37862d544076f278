//! Single-channel relay driver.
//!
//! Cheap relay boards are often active-LOW (the opto-isolator pulls the
//! coil in when the input is grounded), so the on level is configurable.
//! The relay is driven to its off level as soon as the pin is claimed.

use log::info;
use serde::{Deserialize, Serialize};

use crate::app::ports::{GpioPort, Level};
use crate::error::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActiveLevel {
    #[default]
    High,
    Low,
}

impl ActiveLevel {
    pub fn on_level(self) -> Level {
        match self {
            Self::High => Level::High,
            Self::Low => Level::Low,
        }
    }

    pub fn off_level(self) -> Level {
        self.on_level().inverted()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Off,
    On,
    Released,
}

pub struct Relay<P: GpioPort> {
    port: P,
    pin: u8,
    active: ActiveLevel,
    state: RelayState,
}

impl<P: GpioPort> Relay<P> {
    pub fn new(mut port: P, pin: u8, active: ActiveLevel) -> Result<Self, PortError> {
        port.set_output(pin)?;
        port.write(pin, active.off_level())?;
        Ok(Self {
            port,
            pin,
            active,
            state: RelayState::Off,
        })
    }

    pub fn on(&mut self) -> Result<(), PortError> {
        self.drive(RelayState::On)
    }

    pub fn off(&mut self) -> Result<(), PortError> {
        self.drive(RelayState::Off)
    }

    /// Behave like a momentary switch: on, hold for `hold_ms`, off.
    pub fn momentary(&mut self, hold_ms: u32) -> Result<(), PortError> {
        self.on()?;
        self.port.delay_us(u64::from(hold_ms) * 1_000);
        self.off()
    }

    pub fn is_on(&self) -> bool {
        self.state == RelayState::On
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Switch off and hand the pin back.  Idempotent.
    pub fn release(&mut self) -> Result<(), PortError> {
        if self.state == RelayState::Released {
            return Ok(());
        }
        let off = self.port.write(self.pin, self.active.off_level());
        self.state = RelayState::Released;
        self.port.release(self.pin)?;
        off
    }

    pub fn into_port(self) -> P {
        self.port
    }

    fn drive(&mut self, target: RelayState) -> Result<(), PortError> {
        if self.state == RelayState::Released {
            return Err(PortError::NotConfigured(self.pin));
        }
        let level = match target {
            RelayState::On => self.active.on_level(),
            _ => self.active.off_level(),
        };
        self.port.write(self.pin, level)?;
        if self.state != target {
            info!("Relay pin {} -> {:?}", self.pin, target);
        }
        self.state = target;
        Ok(())
    }
}
