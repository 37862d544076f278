//! Application boundary.
//!
//! The sensor and actuator drivers in this crate are pure logic; every
//! interaction with pins, clocks and the 1-Wire bus happens through the
//! **port traits** defined in [`ports`], keeping that logic fully testable
//! without real peripherals.

pub mod ports;
