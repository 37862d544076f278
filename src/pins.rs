//! Default pin assignments and header numbering.
//!
//! Single source of truth for the wiring the CLI assumes when no pins are
//! given.  All defaults are BCM (Broadcom SoC) numbers.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HC-SR04 ultrasonic sensor
// ---------------------------------------------------------------------------

/// Digital output: 10 µs HIGH pulse starts a measurement.
pub const DISTANCE_TRIGGER_PIN: u8 = 15;
/// Digital input: HIGH for the round-trip time of the ping.
/// Needs a 5 V → 3.3 V divider on the Pi.
pub const DISTANCE_ECHO_PIN: u8 = 18;

// ---------------------------------------------------------------------------
// Relay board
// ---------------------------------------------------------------------------

pub const RELAY_PIN: u8 = 24;

// ---------------------------------------------------------------------------
// RGB LED (discrete or common-cathode)
// ---------------------------------------------------------------------------

pub const LED_R_PIN: u8 = 23;
pub const LED_G_PIN: u8 = 25;
pub const LED_B_PIN: u8 = 7;

/// Software PWM base frequency for the RGB LED.
pub const LED_PWM_FREQ_HZ: f64 = 100.0;

// ---------------------------------------------------------------------------
// Numbering
// ---------------------------------------------------------------------------

/// How pin ids passed to an adapter are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PinNumbering {
    /// Broadcom GPIO numbers (GPIO0–GPIO27).
    #[default]
    Bcm,
    /// Physical pin positions on the 40-pin header.
    Board,
}

/// Physical header position → BCM number.  `None` for power and ground.
const BOARD_TO_BCM: [Option<u8>; 41] = [
    None,     // 0: no such pin
    None,     // 1: 3V3
    None,     // 2: 5V
    Some(2),  // 3
    None,     // 4: 5V
    Some(3),  // 5
    None,     // 6: GND
    Some(4),  // 7
    Some(14), // 8
    None,     // 9: GND
    Some(15), // 10
    Some(17), // 11
    Some(18), // 12
    Some(27), // 13
    None,     // 14: GND
    Some(22), // 15
    Some(23), // 16
    None,     // 17: 3V3
    Some(24), // 18
    Some(10), // 19
    None,     // 20: GND
    Some(9),  // 21
    Some(25), // 22
    Some(11), // 23
    Some(8),  // 24
    None,     // 25: GND
    Some(7),  // 26
    Some(0),  // 27: ID_SD
    Some(1),  // 28: ID_SC
    Some(5),  // 29
    None,     // 30: GND
    Some(6),  // 31
    Some(12), // 32
    Some(13), // 33
    None,     // 34: GND
    Some(19), // 35
    Some(16), // 36
    Some(26), // 37
    Some(20), // 38
    None,     // 39: GND
    Some(21), // 40
];

/// Highest BCM number exposed on the header.
pub const MAX_BCM_PIN: u8 = 27;

impl PinNumbering {
    /// Translate a pin id in this scheme to its BCM number.
    pub fn to_bcm(self, pin: u8) -> Option<u8> {
        match self {
            Self::Bcm => (pin <= MAX_BCM_PIN).then_some(pin),
            Self::Board => BOARD_TO_BCM.get(pin as usize).copied().flatten(),
        }
    }
}
