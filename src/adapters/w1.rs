//! Linux sysfs 1-Wire adapter.
//!
//! The kernel `w1-gpio` + `w1-therm` drivers expose every DS18B20 as
//! `/sys/bus/w1/devices/28-xxxxxxxxxxxx/w1_slave`.  This adapter picks the
//! first `28-*` device (family code 0x28) unless a device id is given.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use crate::app::ports::W1Port;
use crate::error::PortError;

pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";
const DS18B20_FAMILY_PREFIX: &str = "28";

pub struct SysfsW1 {
    slave_file: PathBuf,
}

impl SysfsW1 {
    /// First DS18B20 under [`W1_DEVICES_DIR`].
    pub fn discover() -> Result<Self, PortError> {
        Self::discover_in(Path::new(W1_DEVICES_DIR))
    }

    /// First DS18B20 under `base` (sorted by name for a stable pick).
    pub fn discover_in(base: &Path) -> Result<Self, PortError> {
        let entries = fs::read_dir(base).map_err(|e| {
            warn!("cannot list {}: {}", base.display(), e);
            PortError::Io
        })?;

        let mut devices: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(DS18B20_FAMILY_PREFIX))
            })
            .collect();
        devices.sort();

        let device = devices.into_iter().next().ok_or_else(|| {
            warn!("no DS18B20 found under {}", base.display());
            PortError::Io
        })?;
        debug!("using 1-Wire device {}", device.display());
        Ok(Self {
            slave_file: device.join("w1_slave"),
        })
    }

    /// A specific device, e.g. `28-0316a2794aff`.
    pub fn for_device(base: &Path, device_id: &str) -> Self {
        Self {
            slave_file: base.join(device_id).join("w1_slave"),
        }
    }

    pub fn slave_file(&self) -> &Path {
        &self.slave_file
    }
}

impl W1Port for SysfsW1 {
    fn read_slave(&mut self) -> Result<String, PortError> {
        fs::read_to_string(&self.slave_file).map_err(|e| {
            warn!("read {} failed: {}", self.slave_file.display(), e);
            PortError::Io
        })
    }

    fn pause_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
