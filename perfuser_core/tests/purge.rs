//! Bubble purge sub-mode through the full control core.

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

#[test]
fn bubble_isolates_the_organ_and_runs_the_pump_at_purge_speed() {
    let (mut core, valve) = harness();
    core.handle_command(Command::Start).unwrap();
    feed_window(&mut core, 100);
    feed_window(&mut core, 100);
    assert_eq!(core.pump_status().state, PumpState::On);

    core.handle_command(Command::EmulateBubble).unwrap();
    assert!(valve.is_closed());
    assert_eq!(core.regime(), Regime::BubblePurge);
    assert!(core.purging());

    feed_window(&mut core, 100);
    assert_eq!(core.pump_status().speed, 100.0);
    assert_eq!(core.pump_status().state, PumpState::On);
}

#[test]
fn purge_window_elapses_into_hold_and_reopens_the_valve() {
    let (mut core, valve) = harness();
    core.handle_command(Command::Start).unwrap();
    feed_window(&mut core, 100);
    feed_window(&mut core, 100);
    core.handle_command(Command::EmulateBubble).unwrap();

    for _ in 0..59 {
        core.second_tick().unwrap();
        assert!(core.purging());
        assert_eq!(core.regime(), Regime::BubblePurge);
    }

    core.second_tick().unwrap();
    assert!(!core.purging());
    assert!(!valve.is_closed());
    assert_eq!(core.regime(), Regime::Hold);
}

#[test]
fn retriggered_bubble_restarts_the_window_from_zero() {
    let (mut core, _valve) = harness();
    core.handle_command(Command::Start).unwrap();
    core.handle_command(Command::EmulateBubble).unwrap();

    for _ in 0..30 {
        core.second_tick().unwrap();
    }
    core.handle_command(Command::EmulateBubble).unwrap();

    // A full window is needed again after the restart.
    for _ in 0..59 {
        core.second_tick().unwrap();
        assert!(core.purging());
    }
    core.second_tick().unwrap();
    assert!(!core.purging());
    assert_eq!(core.regime(), Regime::Hold);
}

#[test]
fn purge_from_stopped_stages_the_pump_start() {
    let (mut core, valve) = harness();
    core.handle_command(Command::EmulateBubble).unwrap();
    assert!(valve.is_closed());
    assert_eq!(core.regime(), Regime::BubblePurge);

    // Two-phase start: purge speed first, the start frame next cycle.
    feed_window(&mut core, 100);
    assert_eq!(core.pump_status().speed, 100.0);
    assert_eq!(core.pump_status().state, PumpState::Off);

    feed_window(&mut core, 100);
    assert_eq!(core.pump_status().state, PumpState::On);
}
