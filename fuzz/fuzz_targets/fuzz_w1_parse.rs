//! Fuzz target: DS18B20 `w1_slave` parser
//!
//! Feeds arbitrary text to `parse_w1_slave` and checks:
//! - No panics on any input, including non-UTF-8 lossily decoded
//! - A parsed temperature is always finite
//! - Fahrenheit always matches Celsius
//!
//! cargo fuzz run fuzz_w1_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use pulse_echo::sensors::temperature::parse_w1_slave;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(Some(t)) = parse_w1_slave(&text) {
        assert!(t.temp_c.is_finite());
        assert!(t.temp_f.is_finite());
        assert!((t.temp_f - (t.temp_c * 9.0 / 5.0 + 32.0)).abs() < 1e-6 * t.temp_c.abs().max(1.0));
    }
});
