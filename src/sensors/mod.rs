//! Sensor drivers.
//!
//! | Module        | Device   | Port         |
//! |---------------|----------|--------------|
//! | `distance`    | HC-SR04  | `GpioPort`   |
//! | `temperature` | DS18B20  | `W1Port`     |

pub mod distance;
pub mod temperature;
