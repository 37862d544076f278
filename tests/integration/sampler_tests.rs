//! Integration tests for the HC-SR04 sampler against the recording mock.
//!
//! Timing is virtual: the simulated board only advances its clock on
//! `delay_us` and on echo polls, so a 5 s timeout costs a handful of
//! iterations when the poll step is large.

use crate::mock_hw::{MockGpio, PortCall};

use pulse_echo::adapters::sim::{EchoScript, SimGpio};
use pulse_echo::app::ports::{GpioPort, Level};
use pulse_echo::cancel::CancelToken;
use pulse_echo::config::{RetryPolicy, SensorConfig};
use pulse_echo::error::{PortError, SensorError};
use pulse_echo::sensors::distance::{ECHO_TIMEOUT_US, SamplerState, TRIGGER_PULSE_US, Verdict};
use pulse_echo::{DistanceSampler, Error, with_sampler};

const TRIG: u8 = 15;
const ECHO: u8 = 18;

/// Default config without the one-second settle delay.
fn fast_config() -> SensorConfig {
    SensorConfig {
        settle_time_ms: 0,
        ..SensorConfig::with_pins(TRIG, ECHO)
    }
}

fn mock_with(distances: &[f64]) -> MockGpio {
    let mut mock = MockGpio::new(TRIG, ECHO);
    mock.sim.push_distances(distances);
    mock
}

/// Silent fallback with a coarse poll step so timeouts resolve quickly.
fn silent_mock() -> MockGpio {
    MockGpio::wrap(SimGpio::new(TRIG, ECHO).with_poll_step_us(100_000))
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn consistent_pair_is_accepted_on_first_attempt() {
    let mut mock = mock_with(&[100.0, 100.0]);
    let reading = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_retry().unwrap()
    };

    assert_eq!(reading.cm(), 100.0);
    assert_eq!(mock.sim.trigger_count(), 2, "exactly two samples");
    // trigger pulse, retry interval, trigger pulse
    assert_eq!(mock.delays(), vec![TRIGGER_PULSE_US, 250_000, TRIGGER_PULSE_US]);
}

#[test]
fn trigger_pulse_is_at_least_ten_microseconds() {
    let mut mock = mock_with(&[50.0, 50.0]);
    {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_retry().unwrap();
    }
    assert!(mock.sim.trigger_widths().iter().all(|w| *w >= 10));
    assert_eq!(
        mock.writes_to(TRIG),
        vec![
            Level::Low, // claim
            Level::Low,
            Level::High,
            Level::Low,
            Level::Low,
            Level::High,
            Level::Low,
        ]
    );
}

#[test]
fn settle_delay_precedes_every_trigger() {
    let mut mock = mock_with(&[100.0]);
    let config = SensorConfig::with_pins(TRIG, ECHO);
    {
        let mut s = DistanceSampler::new(&mut mock, config).unwrap();
        s.measure_once().unwrap();
    }
    assert_eq!(mock.delays(), vec![1_000_000, TRIGGER_PULSE_US]);
}

#[test]
fn raw_reading_skips_range_check() {
    let mut mock = mock_with(&[600.0]);
    let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
    let r = s.measure_once().unwrap();
    assert!(r.cm() > 599.9 && r.cm() < 600.1, "got {}", r);
}

// ── Rejection ─────────────────────────────────────────────────

#[test]
fn inconsistent_pairs_exhaust_all_tries() {
    let mut mock = mock_with(&[100.0, 120.0, 100.0, 120.0, 100.0, 120.0, 100.0, 120.0]);
    let result = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_retry()
    };

    assert_eq!(mock.sim.trigger_count(), 8);
    match result {
        Err(SensorError::Unreliable { attempts, last_raw }) => {
            assert_eq!(attempts, 4);
            assert_eq!(last_raw.map(|r| r.cm()), Some(100.0));
        }
        other => panic!("expected Unreliable, got {:?}", other),
    }
}

#[test]
fn consistent_but_out_of_range_is_unreliable() {
    let mut mock = mock_with(&[600.0, 601.0, 600.0, 601.0, 600.0, 601.0, 600.0, 601.0]);
    let result = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_retry()
    };

    let err = result.unwrap_err();
    assert!(matches!(err, SensorError::Unreliable { attempts: 4, .. }));
    let fallback = err.fallback_reading().unwrap();
    assert!(fallback.cm() > 500.0, "legacy fallback is the raw sample");
}

#[test]
fn report_lists_every_attempt() {
    let mut mock = mock_with(&[100.0, 120.0, 100.0, 101.0]);
    let report = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_report().unwrap()
    };

    let verdicts: Vec<Verdict> = report.attempts.iter().map(|a| a.verdict).collect();
    assert_eq!(verdicts, vec![Verdict::Inconsistent, Verdict::Accepted]);
    assert_eq!(report.raw_samples(), 4);
    assert_eq!(report.reading.map(|r| r.cm()), Some(100.0));
}

// ── Timeouts ──────────────────────────────────────────────────

#[test]
fn silent_sensor_times_out_without_partial_reading() {
    let mut mock = silent_mock();
    let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();

    match s.measure_once() {
        Err(SensorError::EchoTimeout { waited_us }) => assert!(waited_us > ECHO_TIMEOUT_US),
        other => panic!("expected EchoTimeout, got {:?}", other),
    }
    assert_eq!(s.state(), SamplerState::TimedOut);
}

#[test]
fn echo_stuck_high_times_out() {
    let sim = SimGpio::new(TRIG, ECHO)
        .with_poll_step_us(100_000)
        .with_fallback(EchoScript::StuckHigh { delay_us: 450 });
    let mut mock = MockGpio::wrap(sim);
    let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();

    assert!(matches!(
        s.measure_once(),
        Err(SensorError::EchoStuckHigh { waited_us }) if waited_us > ECHO_TIMEOUT_US
    ));
}

#[test]
fn timeouts_consume_attempts() {
    let mut mock = silent_mock();
    let result = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_retry()
    };

    assert_eq!(
        result,
        Err(SensorError::Unreliable {
            attempts: 4,
            last_raw: None
        })
    );
    // The second sample of an attempt is skipped once the first times out.
    assert_eq!(mock.sim.trigger_count(), 4);
}

#[test]
fn recovers_after_a_missed_echo() {
    let mut sim = SimGpio::new(TRIG, ECHO).with_poll_step_us(1_000);
    sim.push_echo(EchoScript::Silent);
    sim.push_distances(&[100.0, 100.0]);
    let mut mock = MockGpio::wrap(sim);

    let report = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_report().unwrap()
    };

    let verdicts: Vec<Verdict> = report.attempts.iter().map(|a| a.verdict).collect();
    assert_eq!(verdicts, vec![Verdict::NoEcho, Verdict::Accepted]);
    assert!(report.reading.is_some());
    assert_eq!(mock.sim.trigger_count(), 3);
}

#[test]
fn oversized_policy_is_capped() {
    let sim = SimGpio::new(TRIG, ECHO).with_poll_step_us(1_000_000);
    let mut mock = MockGpio::wrap(sim);
    let policy = RetryPolicy {
        interval_ms: 0,
        max_tries: 40,
    };
    let result = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_policy(policy)
    };

    assert!(matches!(
        result,
        Err(SensorError::Unreliable { attempts: 16, .. })
    ));
    assert_eq!(mock.sim.trigger_count(), 16);
}

// ── Cancellation ──────────────────────────────────────────────

#[test]
fn cancelled_token_stops_before_trigger() {
    let mut mock = mock_with(&[100.0]);
    let token = CancelToken::new();
    token.cancel();
    {
        let mut s =
            DistanceSampler::new(&mut mock, SensorConfig::with_pins(TRIG, ECHO)).unwrap();
        assert_eq!(
            s.measure_once_cancellable(&token),
            Err(SensorError::Cancelled)
        );
        assert_eq!(
            s.measure_with_retry_cancellable(&token),
            Err(SensorError::Cancelled)
        );
    }
    assert_eq!(mock.sim.trigger_count(), 0);
}

#[test]
fn cancel_while_waiting_for_echo_rise() {
    let token = CancelToken::new();
    let mut mock = MockGpio::new(TRIG, ECHO).with_cancel_after_reads(100, &token);
    {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        assert_eq!(
            s.measure_once_cancellable(&token),
            Err(SensorError::Cancelled)
        );
        assert_eq!(s.state(), SamplerState::AwaitingEchoRise);
    }
    assert_eq!(mock.reads, 100);
    assert!(mock.sim.now_us() < ECHO_TIMEOUT_US / 1_000);
}

#[test]
fn cancel_while_waiting_for_echo_fall() {
    let token = CancelToken::new();
    let sim = SimGpio::new(TRIG, ECHO).with_fallback(EchoScript::StuckHigh { delay_us: 450 });
    let mut mock = MockGpio::wrap(sim).with_cancel_after_reads(1_000, &token);
    {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        assert_eq!(
            s.measure_once_cancellable(&token),
            Err(SensorError::Cancelled)
        );
        assert_eq!(s.state(), SamplerState::AwaitingEchoFall);
    }
    assert_eq!(mock.reads, 1_000);
    assert!(mock.sim.now_us() < ECHO_TIMEOUT_US / 1_000);
}

#[test]
fn cancel_aborts_retry_report_instead_of_spending_attempts() {
    let token = CancelToken::new();
    let mut mock = MockGpio::new(TRIG, ECHO).with_cancel_after_reads(50, &token);
    let result = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_report_cancellable(&token)
    };

    assert_eq!(result, Err(SensorError::Cancelled));
    assert_eq!(mock.sim.trigger_count(), 1);
}

#[test]
fn report_with_idle_token_matches_plain_report() {
    let mut mock = mock_with(&[100.0, 100.0]);
    let token = CancelToken::new();
    let report = {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.measure_with_report_cancellable(&token).unwrap()
    };
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.reading.map(|r| r.cm()), Some(100.0));
}

#[test]
fn idle_token_does_not_disturb_measurement() {
    let mut mock = mock_with(&[100.0, 100.0]);
    let token = CancelToken::new();
    let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
    assert_eq!(
        s.measure_with_retry_cancellable(&token).map(|r| r.cm()),
        Ok(100.0)
    );
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn release_is_idempotent() {
    let mut mock = mock_with(&[100.0]);
    {
        let mut s = DistanceSampler::new(&mut mock, fast_config()).unwrap();
        s.release().unwrap();
        s.release().unwrap();
        assert!(s.is_released());
        assert_eq!(s.measure_once(), Err(SensorError::Released));
    }
    assert_eq!(mock.released(), vec![TRIG, ECHO]);
    assert!(!mock.sim.is_claimed(TRIG));
    assert!(!mock.sim.is_claimed(ECHO));
}

#[test]
fn with_sampler_releases_after_success() {
    let mut mock = mock_with(&[100.0, 100.0]);
    let reading = with_sampler(&mut mock, fast_config(), |s| s.measure_with_retry()).unwrap();
    assert_eq!(reading.cm(), 100.0);
    assert_eq!(mock.released(), vec![TRIG, ECHO]);
}

#[test]
fn with_sampler_releases_after_failure() {
    let mut mock = silent_mock();
    let result = with_sampler(&mut mock, fast_config(), |s| s.measure_once());

    assert!(matches!(
        result,
        Err(Error::Sensor(SensorError::EchoTimeout { .. }))
    ));
    assert_eq!(mock.released(), vec![TRIG, ECHO]);
}

#[test]
fn failed_echo_claim_hands_trigger_back() {
    let mut mock = MockGpio::new(TRIG, ECHO).with_busy_pin(ECHO);
    let result = DistanceSampler::new(&mut mock, fast_config());

    assert!(matches!(result, Err(Error::Port(PortError::PinBusy(ECHO)))));
    assert_eq!(mock.released(), vec![TRIG]);
    assert!(!mock.sim.is_claimed(TRIG));
}

#[test]
fn invalid_config_touches_no_pins() {
    let mut mock = MockGpio::new(TRIG, ECHO);
    let mut config = fast_config();
    config.range_min_cm = 600.0;

    assert!(matches!(
        DistanceSampler::new(&mut mock, config),
        Err(Error::Config(_))
    ));
    assert!(mock.calls.is_empty());
}

#[test]
fn claim_order_is_trigger_then_echo() {
    let mut mock = MockGpio::new(TRIG, ECHO);
    drop(DistanceSampler::new(&mut mock, fast_config()).unwrap());
    assert_eq!(
        mock.calls,
        vec![
            PortCall::SetOutput(TRIG),
            PortCall::Write(TRIG, Level::Low),
            PortCall::SetInput(ECHO),
        ]
    );
}
