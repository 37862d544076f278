//! pulse-echo library.
//!
//! HC-SR04 distance sampling with retry validation, plus DS18B20
//! temperature, relay and RGB LED helpers.  All hardware access goes
//! through the port traits in [`app::ports`]; the Raspberry Pi adapter is
//! behind the `rpi` feature so everything else builds and tests on any
//! host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod cancel;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod sensors;

pub use error::{Error, Result};
pub use sensors::distance::{DistanceReading, DistanceSampler, with_sampler};
