//! Sustained-fault escalation driven through the full control core.
//!
//! Raw counts map to units as `raw * 7.8125 / 25`, so a steady raw
//! reading of 100 settles the filter near 31.25, inside the safe band
//! around the default 29.0 target.

use perfuser_core::alert::PressureBand;
use perfuser_core::command::Command;
use perfuser_core::config::CoreCfg;
use perfuser_core::core::ControlCore;
use perfuser_core::mocks::{EchoLink, SpyValve};
use perfuser_core::pump::PumpState;
use perfuser_core::regime::Regime;
use perfuser_traits::clock::test_clock::TestClock;

type Core = ControlCore<EchoLink, SpyValve>;

fn harness() -> (Core, SpyValve) {
    let valve = SpyValve::default();
    let core = perfuser_core::build_core(
        EchoLink::default(),
        valve.clone(),
        CoreCfg::default(),
        Some(Box::new(TestClock::new())),
    )
    .expect("core builds with default config");
    (core, valve)
}

fn feed_window(core: &mut Core, raw: i16) {
    for _ in 0..10 {
        core.ingest_sample(raw);
    }
}

/// Start regulation and let the filter settle above the target so the
/// alarm monitor arms.
fn regulate_to_target(core: &mut Core) {
    core.handle_command(Command::Start).unwrap();
    for _ in 0..15 {
        feed_window(core, 100);
    }
    core.alarm_cycle();
    assert_eq!(core.regime(), Regime::Hold);
    assert_eq!(core.alerts().pressure, PressureBand::Normal);
}

/// Arm the monitor, go below the low limit and burn the full ceiling.
fn latch_via_low_pressure(core: &mut Core) {
    regulate_to_target(core);
    feed_window(core, 64);
    feed_window(core, 64);
    core.alarm_cycle();
    for _ in 0..600 {
        core.second_tick().unwrap();
    }
    assert_eq!(core.regime(), Regime::Latched);
}

#[test]
fn sustained_low_pressure_latches_after_the_ceiling() {
    let (mut core, _valve) = harness();
    regulate_to_target(&mut core);

    // Pull the reading below the low limit.
    feed_window(&mut core, 64);
    feed_window(&mut core, 64);
    core.alarm_cycle();
    assert_eq!(core.alerts().pressure, PressureBand::Low);
    assert_eq!(core.pump_status().state, PumpState::On);

    for _ in 0..599 {
        core.second_tick().unwrap();
    }
    assert_eq!(core.regime(), Regime::Hold);

    core.second_tick().unwrap();
    assert_eq!(core.regime(), Regime::Latched);
    assert_eq!(core.pump_status().state, PumpState::Off);
    assert_eq!(core.pump_status().speed, 10.0);
}

#[test]
fn latched_core_ignores_the_command_surface() {
    let (mut core, _valve) = harness();
    latch_via_low_pressure(&mut core);

    core.handle_command(Command::Start).unwrap();
    core.handle_command(Command::Regime(Regime::Hold.code())).unwrap();
    core.handle_command(Command::SetTargetPressure(50.0)).unwrap();
    assert_eq!(core.regime(), Regime::Latched);
    assert_eq!(core.pressure().target(), 29.0);

    // The final stop frame still goes out on the wire.
    core.pump_tick().unwrap();
    core.pump_tick().unwrap();
    assert!(core.pump_status().acks.stop);
}

#[test]
fn recovery_before_the_ceiling_resets_the_timer() {
    let (mut core, _valve) = harness();
    regulate_to_target(&mut core);

    feed_window(&mut core, 64);
    feed_window(&mut core, 64);
    core.alarm_cycle();
    assert_eq!(core.alerts().pressure, PressureBand::Low);

    for _ in 0..300 {
        core.second_tick().unwrap();
    }

    // Back in band: the timer drops to zero.
    for _ in 0..4 {
        feed_window(&mut core, 100);
    }
    core.alarm_cycle();
    assert_eq!(core.alerts().pressure, PressureBand::Normal);

    // A fresh full ceiling would now be needed; 599 more never latch.
    for _ in 0..599 {
        core.second_tick().unwrap();
    }
    assert_eq!(core.regime(), Regime::Hold);
}

#[test]
fn bubble_cannot_leave_the_safety_lockout() {
    let (mut core, valve) = harness();
    latch_via_low_pressure(&mut core);

    core.trigger_bubble().unwrap();
    assert_eq!(core.regime(), Regime::Latched);
    assert!(!core.purging());
    assert!(!valve.is_closed());

    // The seconds that would have ended a purge change nothing.
    for _ in 0..60 {
        core.second_tick().unwrap();
    }
    assert_eq!(core.regime(), Regime::Latched);
    assert_eq!(core.pump_status().state, PumpState::Off);
}

#[test]
fn lockout_during_a_purge_aborts_the_window() {
    let (mut core, valve) = harness();
    regulate_to_target(&mut core);
    feed_window(&mut core, 64);
    feed_window(&mut core, 64);
    core.alarm_cycle();
    for _ in 0..599 {
        core.second_tick().unwrap();
    }

    core.trigger_bubble().unwrap();
    assert_eq!(core.regime(), Regime::BubblePurge);
    assert!(valve.is_closed());

    // The next second hits the ceiling mid-purge.
    core.second_tick().unwrap();
    assert_eq!(core.regime(), Regime::Latched);
    assert!(!core.purging());
    assert_eq!(core.pump_status().state, PumpState::Off);

    // The purge never completes into Hold; the organ stays isolated.
    for _ in 0..120 {
        core.second_tick().unwrap();
    }
    assert_eq!(core.regime(), Regime::Latched);
    assert!(valve.is_closed());
}

#[test]
fn critically_high_pressure_stops_then_recovers_into_hold() {
    let (mut core, _valve) = harness();
    regulate_to_target(&mut core);

    // Push past the high limit (target + 10).
    for _ in 0..3 {
        feed_window(&mut core, 160);
    }
    core.alarm_cycle();
    assert_eq!(core.alerts().pressure, PressureBand::High);
    assert_eq!(core.pump_status().state, PumpState::Off);

    // One settling window back toward the target re-enters the band.
    feed_window(&mut core, 100);
    core.alarm_cycle();
    assert_eq!(core.alerts().pressure, PressureBand::Normal);
    assert_eq!(core.pump_status().state, PumpState::On);
    assert_eq!(core.regime(), Regime::Hold);
}
