//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter | Implements          | Connects to                    |
//! |---------|---------------------|--------------------------------|
//! | `hal`   | GpioPort            | any embedded-hal 1.0 pin pair  |
//! | `rpi`   | GpioPort, PwmPort   | Raspberry Pi GPIO via rppal    |
//! | `sim`   | GpioPort, PwmPort   | virtual clock + scripted echo  |
//! | `w1`    | W1Port              | Linux sysfs 1-Wire devices     |

pub mod hal;
#[cfg(feature = "rpi")]
pub mod rpi;
pub mod sim;
pub mod w1;
