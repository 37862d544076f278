//! DS18B20 1-Wire temperature sensor.
//!
//! The kernel driver renders each conversion as two lines:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The first line ends in `YES` once the scratchpad CRC checks out; the
//! second carries the temperature in millidegrees Celsius after `t=`.

use log::{debug, warn};
use serde::Serialize;

use crate::app::ports::W1Port;
use crate::error::SensorError;

/// Wait between reads while the CRC line says `NO`.
pub const CRC_RETRY_MS: u32 = 200;
/// Reads before giving up on a sensor whose CRC never validates.
pub const DEFAULT_MAX_READS: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature {
    pub temp_c: f64,
    pub temp_f: f64,
}

impl Temperature {
    pub fn from_celsius(temp_c: f64) -> Self {
        Self {
            temp_c,
            temp_f: temp_c * 9.0 / 5.0 + 32.0,
        }
    }
}

/// Parse one `w1_slave` payload.
///
/// `Ok(None)` means the CRC line is not `YES` yet and the caller should
/// read again.
pub fn parse_w1_slave(text: &str) -> Result<Option<Temperature>, SensorError> {
    let mut lines = text.lines();
    let crc_line = lines.next().unwrap_or("");
    if !crc_line.trim().ends_with("YES") {
        return Ok(None);
    }

    let data_line = lines.next().ok_or(SensorError::TemperatureParse)?;
    let pos = data_line.find("t=").ok_or(SensorError::TemperatureParse)?;
    let milli: f64 = data_line[pos + 2..]
        .trim()
        .parse()
        .map_err(|_| SensorError::TemperatureParse)?;
    if !milli.is_finite() {
        return Err(SensorError::TemperatureParse);
    }
    Ok(Some(Temperature::from_celsius(milli / 1000.0)))
}

pub struct TemperatureSensor<W: W1Port> {
    bus: W,
    max_reads: u32,
}

impl<W: W1Port> TemperatureSensor<W> {
    pub fn new(bus: W) -> Self {
        Self {
            bus,
            max_reads: DEFAULT_MAX_READS,
        }
    }

    #[must_use]
    pub fn with_max_reads(mut self, max_reads: u32) -> Self {
        self.max_reads = max_reads.max(1);
        self
    }

    /// Read until the CRC validates, pausing [`CRC_RETRY_MS`] between reads.
    pub fn read(&mut self) -> Result<Temperature, SensorError> {
        for n in 1..=self.max_reads {
            let text = self.bus.read_slave()?;
            if let Some(t) = parse_w1_slave(&text)? {
                debug!("DS18B20 {:.3} C after {} read(s)", t.temp_c, n);
                return Ok(t);
            }
            if n < self.max_reads {
                self.bus.pause_ms(CRC_RETRY_MS);
            }
        }
        warn!("DS18B20 CRC still invalid after {} reads", self.max_reads);
        Err(SensorError::TemperatureNotReady)
    }

    pub fn into_bus(self) -> W {
        self.bus
    }
}
