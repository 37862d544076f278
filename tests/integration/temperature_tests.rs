//! DS18B20 reader against scripted and on-disk `w1_slave` payloads.

use std::fs;
use std::path::PathBuf;

use crate::mock_hw::MockW1;

use pulse_echo::adapters::w1::SysfsW1;
use pulse_echo::error::{PortError, SensorError};
use pulse_echo::sensors::temperature::{CRC_RETRY_MS, DEFAULT_MAX_READS, TemperatureSensor};

const NOT_READY: &str = "50 05 4b 46 7f ff 0c 10 1c : crc=1c NO\n50 05 4b 46 7f ff 0c 10 1c t=85000\n";
const READY: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pulse-echo-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn retries_until_crc_validates() {
    let mut bus = MockW1::new();
    bus.push(NOT_READY);
    bus.push(NOT_READY);
    bus.push(READY);

    let mut sensor = TemperatureSensor::new(bus);
    let t = sensor.read().unwrap();
    assert!((t.temp_c - 23.125).abs() < 1e-9);

    let bus = sensor.into_bus();
    assert_eq!(bus.reads, 3);
    assert_eq!(bus.pauses, vec![CRC_RETRY_MS, CRC_RETRY_MS]);
}

#[test]
fn gives_up_after_bounded_reads() {
    let mut sensor = TemperatureSensor::new(MockW1::new());
    assert_eq!(sensor.read(), Err(SensorError::TemperatureNotReady));

    let bus = sensor.into_bus();
    assert_eq!(bus.reads, DEFAULT_MAX_READS as usize);
    assert_eq!(bus.pauses.len(), DEFAULT_MAX_READS as usize - 1);
}

#[test]
fn custom_read_limit() {
    let mut sensor = TemperatureSensor::new(MockW1::new()).with_max_reads(3);
    assert_eq!(sensor.read(), Err(SensorError::TemperatureNotReady));
    assert_eq!(sensor.into_bus().reads, 3);
}

#[test]
fn bus_error_propagates() {
    let mut bus = MockW1::new();
    bus.push_error(PortError::Io);
    let mut sensor = TemperatureSensor::new(bus);
    assert_eq!(sensor.read(), Err(SensorError::Port(PortError::Io)));
}

#[test]
fn garbled_payload_is_parse_error() {
    let mut bus = MockW1::new();
    bus.push("72 01 : crc=57 YES\n72 01 t=\n");
    let mut sensor = TemperatureSensor::new(bus);
    assert_eq!(sensor.read(), Err(SensorError::TemperatureParse));
}

#[test]
fn sysfs_discovery_picks_first_ds18b20() {
    let base = scratch_dir("w1-discover");
    fs::create_dir_all(base.join("w1_bus_master1")).unwrap();
    for id in ["28-0316a2794aff", "28-0000075a1b2c"] {
        fs::create_dir_all(base.join(id)).unwrap();
        fs::write(base.join(id).join("w1_slave"), READY).unwrap();
    }

    let bus = SysfsW1::discover_in(&base).unwrap();
    assert_eq!(
        bus.slave_file(),
        base.join("28-0000075a1b2c").join("w1_slave")
    );

    let t = TemperatureSensor::new(bus).read().unwrap();
    assert!((t.temp_f - 73.625).abs() < 1e-9);

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn sysfs_without_devices_is_io_error() {
    let base = scratch_dir("w1-empty");
    assert!(matches!(SysfsW1::discover_in(&base), Err(PortError::Io)));
    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn sysfs_missing_device_surfaces_on_read() {
    let base = scratch_dir("w1-missing");
    let bus = SysfsW1::for_device(&base, "28-deadbeef0000");
    assert_eq!(
        TemperatureSensor::new(bus).read(),
        Err(SensorError::Port(PortError::Io))
    );
    fs::remove_dir_all(&base).unwrap();
}
