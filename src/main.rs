//! pulse-echo command line.
//!
//! ```text
//! pulse-echo distance [--raw | --report] [--trigger 15 --echo 18]
//! pulse-echo temperature [--device 28-xxxx]
//! pulse-echo relay [--pin 24 --active-low] on|off|momentary
//! pulse-echo led [--red 23 --green 25 --blue 7] red|green|blue|off|cycle|sine
//! ```
//!
//! `--sim` swaps the Raspberry Pi GPIO for the simulated board so every
//! command can be tried on a development host.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use tracing_subscriber::filter::LevelFilter;

use pulse_echo::adapters::sim::{EchoScript, SimGpio};
use pulse_echo::adapters::w1::{SysfsW1, W1_DEVICES_DIR};
use pulse_echo::app::ports::{GpioPort, PwmPort};
use pulse_echo::cancel::CancelToken;
use pulse_echo::config::{PortOptions, RetryPolicy, SensorConfig};
use pulse_echo::drivers::relay::{ActiveLevel, Relay};
use pulse_echo::drivers::rgb_led::{Channel, RgbLed, RgbPins};
use pulse_echo::error::SensorError;
use pulse_echo::pins::{self, PinNumbering};
use pulse_echo::sensors::distance::RetryReport;
use pulse_echo::sensors::temperature::TemperatureSensor;
use pulse_echo::{DistanceReading, Error, with_sampler};

#[derive(Parser)]
#[command(name = "pulse-echo", version, about = "HC-SR04, DS18B20, relay and RGB LED tools")]
struct Cli {
    /// Pin ids are physical header positions instead of BCM numbers
    #[arg(long, global = true)]
    board: bool,

    /// Use the simulated GPIO board instead of real hardware
    #[arg(long, global = true)]
    sim: bool,

    /// Log verbosity (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure distance with the ultrasonic sensor
    Distance(DistanceArgs),
    /// Read the DS18B20 temperature sensor
    Temperature {
        /// Device id such as 28-0316a2794aff (default: first found)
        #[arg(long)]
        device: Option<String>,
        #[arg(long, default_value = W1_DEVICES_DIR)]
        w1_dir: PathBuf,
    },
    /// Switch a relay
    Relay {
        #[arg(long, default_value_t = pins::RELAY_PIN)]
        pin: u8,
        /// Relay energises on a LOW input
        #[arg(long)]
        active_low: bool,
        #[command(subcommand)]
        action: RelayAction,
    },
    /// Drive an RGB LED
    Led {
        #[arg(long, default_value_t = pins::LED_R_PIN)]
        red: u8,
        #[arg(long, default_value_t = pins::LED_G_PIN)]
        green: u8,
        #[arg(long, default_value_t = pins::LED_B_PIN)]
        blue: u8,
        #[arg(long, default_value_t = pins::LED_PWM_FREQ_HZ)]
        hz: f64,
        /// Seconds to hold a solid colour before switching off
        #[arg(long, default_value_t = 1)]
        hold_secs: u64,
        #[arg(value_enum)]
        action: LedAction,
    },
}

#[derive(Args)]
struct DistanceArgs {
    #[arg(long, default_value_t = pins::DISTANCE_TRIGGER_PIN)]
    trigger: u8,
    #[arg(long, default_value_t = pins::DISTANCE_ECHO_PIN)]
    echo: u8,
    #[arg(long, default_value_t = 1000)]
    settle_ms: u32,
    #[arg(long, default_value_t = 2.0)]
    min_cm: f64,
    #[arg(long, default_value_t = 500.0)]
    max_cm: f64,
    #[arg(long, default_value_t = 250)]
    retry_ms: u32,
    #[arg(long, default_value_t = 4)]
    tries: u8,
    /// Single unvalidated reading
    #[arg(long, conflicts_with = "report")]
    raw: bool,
    /// Print every attempt as JSON
    #[arg(long)]
    report: bool,
    /// On an unreliable result, print the last raw sample anyway
    #[arg(long)]
    fallback: bool,
    /// Abort the measurement after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,
    /// Distance the simulated sensor reports
    #[arg(long, default_value_t = 100.0)]
    sim_cm: f64,
}

#[derive(Subcommand, Clone, Copy)]
enum RelayAction {
    On,
    Off,
    /// On, wait, off
    Momentary {
        #[arg(long, default_value_t = 1000)]
        hold_ms: u32,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum LedAction {
    Red,
    Green,
    Blue,
    Off,
    Cycle,
    Sine,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let numbering = if cli.board {
        PinNumbering::Board
    } else {
        PinNumbering::Bcm
    };

    match cli.command {
        Command::Distance(args) => distance(&args, cli.sim, numbering),
        Command::Temperature { device, w1_dir } => temperature(device.as_deref(), &w1_dir),
        Command::Relay {
            pin,
            active_low,
            action,
        } => {
            let active = if active_low {
                ActiveLevel::Low
            } else {
                ActiveLevel::High
            };
            if cli.sim {
                relay(SimGpio::without_sensor(), pin, active, action)
            } else {
                relay(open_gpio(relay_port_options(numbering, action))?, pin, active, action)
            }
        }
        Command::Led {
            red,
            green,
            blue,
            hz,
            hold_secs,
            action,
        } => {
            let led_pins = RgbPins { red, green, blue };
            if cli.sim {
                led(SimGpio::without_sensor(), led_pins, hz, hold_secs, action)
            } else {
                led(open_gpio(PortOptions::numbered(numbering))?, led_pins, hz, hold_secs, action)
            }
        }
    }
}

// ── GPIO selection ────────────────────────────────────────────

/// `on` / `off` must survive the process exit, so the pin is not reset
/// when the adapter drops.  `momentary` switches off itself.
fn relay_port_options(numbering: PinNumbering, action: RelayAction) -> PortOptions {
    match action {
        RelayAction::On | RelayAction::Off => PortOptions::holding_state(numbering),
        RelayAction::Momentary { .. } => PortOptions::numbered(numbering),
    }
}

#[cfg(feature = "rpi")]
fn open_gpio(options: PortOptions) -> Result<pulse_echo::adapters::rpi::RppalGpio> {
    pulse_echo::adapters::rpi::RppalGpio::new(options).context("opening Raspberry Pi GPIO")
}

#[cfg(not(feature = "rpi"))]
fn open_gpio(_options: PortOptions) -> Result<SimGpio> {
    anyhow::bail!("built without the `rpi` feature; rerun with --sim or rebuild with --features rpi")
}

// ── Commands ──────────────────────────────────────────────────

fn distance(args: &DistanceArgs, sim: bool, numbering: PinNumbering) -> Result<()> {
    let config = SensorConfig {
        trigger_pin: args.trigger,
        echo_pin: args.echo,
        settle_time_ms: args.settle_ms,
        range_min_cm: args.min_cm,
        range_max_cm: args.max_cm,
        retry: RetryPolicy {
            interval_ms: args.retry_ms,
            max_tries: args.tries,
        },
    };

    let cancel = CancelToken::new();
    if let Some(ms) = args.deadline_ms {
        let deadline = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(ms));
            deadline.cancel();
        });
    }

    let output = if sim {
        info!("Simulated sensor at {} cm", args.sim_cm);
        let port = SimGpio::new(args.trigger, args.echo)
            .with_fallback(EchoScript::for_distance(args.sim_cm));
        measure(port, config, args, &cancel)
    } else {
        measure(open_gpio(PortOptions::numbered(numbering))?, config, args, &cancel)
    };

    match output {
        Ok(out) => {
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Err(Error::Sensor(e @ SensorError::Unreliable { .. })) if args.fallback => {
            let fallback = e
                .fallback_reading()
                .with_context(|| format!("{e}; no sample to fall back on"))?;
            warn!("{}; printing last raw sample", e);
            println!("{}", serde_json::to_string_pretty(&fallback)?);
            Ok(())
        }
        Err(e) => Err(e).context("distance measurement failed"),
    }
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum Output {
    Reading(DistanceReading),
    Report(RetryReport),
}

fn measure<P: GpioPort>(
    port: P,
    config: SensorConfig,
    args: &DistanceArgs,
    cancel: &CancelToken,
) -> core::result::Result<Output, Error> {
    with_sampler(port, config, |sampler| {
        if args.raw {
            Ok(Output::Reading(sampler.measure_once_cancellable(cancel)?))
        } else if args.report {
            let report = sampler.measure_with_report_cancellable(cancel)?;
            if report.reading.is_none() {
                warn!("{} attempts, none accepted", report.attempts.len());
            }
            Ok(Output::Report(report))
        } else {
            Ok(Output::Reading(
                sampler.measure_with_retry_cancellable(cancel)?,
            ))
        }
    })
}

fn temperature(device: Option<&str>, w1_dir: &std::path::Path) -> Result<()> {
    let bus = match device {
        Some(id) => SysfsW1::for_device(w1_dir, id),
        None => SysfsW1::discover_in(w1_dir).context("looking for a DS18B20")?,
    };
    let temp = TemperatureSensor::new(bus)
        .read()
        .context("reading temperature")?;
    println!("{}", serde_json::to_string_pretty(&temp)?);
    Ok(())
}

fn relay<P: GpioPort>(
    port: P,
    pin: u8,
    active: ActiveLevel,
    action: RelayAction,
) -> Result<()> {
    let mut relay = Relay::new(port, pin, active).context("claiming relay pin")?;
    let result = match action {
        RelayAction::On => relay.on(),
        RelayAction::Off => relay.off(),
        RelayAction::Momentary { hold_ms } => relay.momentary(hold_ms),
    };
    // Leave the relay in its commanded state; only the momentary switch
    // returns the pin.
    if matches!(action, RelayAction::Momentary { .. }) {
        relay.release()?;
    }
    result.context("switching relay")
}

fn led<P: PwmPort>(
    port: P,
    pins: RgbPins,
    hz: f64,
    hold_secs: u64,
    action: LedAction,
) -> Result<()> {
    let mut led = RgbLed::new(port, pins, hz, false).context("claiming LED pins")?;
    let result = match action {
        LedAction::Red => hold(&mut led, Channel::Red, hold_secs),
        LedAction::Green => hold(&mut led, Channel::Green, hold_secs),
        LedAction::Blue => hold(&mut led, Channel::Blue, hold_secs),
        LedAction::Off => led.off(),
        LedAction::Cycle => led.cycle_colors(10),
        LedAction::Sine => led.sine_sweep(None),
    };
    led.release()?;
    result.context("driving LED")
}

fn hold<P: PwmPort>(
    led: &mut RgbLed<P>,
    channel: Channel,
    secs: u64,
) -> core::result::Result<(), pulse_echo::error::PortError> {
    led.color(channel, true)?;
    std::thread::sleep(Duration::from_secs(secs));
    Ok(())
}
