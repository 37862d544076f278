//! Actuator drivers.

pub mod relay;
pub mod rgb_led;
