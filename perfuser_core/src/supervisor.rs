//! Event-loop supervisor: the single task that owns `ControlCore`.
//!
//! Sensor threads, periodic tickers and the command surface all deliver
//! `Event`s over one channel; the supervisor applies them in arrival
//! order, so every mutation of regime, alerts and pump state happens on
//! one thread. A filter output produced by `ControlTick` is therefore
//! always visible to the alarm evaluation that follows it.

use std::time::Duration;

use crossbeam_channel as xch;
use perfuser_traits::{BubbleSensor, IsolationValve, PumpLink, TelemetrySink, TempSensor};

use crate::command::Command;
use crate::core::ControlCore;
use crate::sampler::Sampler;

/// Queue depth for the supervisor channel. Tickers drop their event
/// when the queue is full rather than stalling the timer thread.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Control-cycle cadence; one raw sample is consumed per tick, so ten
/// ticks close a filter window.
pub const CONTROL_PERIOD_MS: u64 = 100;
/// Pump-protocol service cadence.
pub const PUMP_PERIOD_MS: u64 = 5;
/// Alarm evaluation cadence.
pub const ALARM_PERIOD_MS: u64 = 60;

#[derive(Debug, Clone, Copy)]
pub enum Event {
    /// Consume the latest raw pressure sample and run the control path.
    ControlTick,
    /// Service the pump protocol state machine.
    PumpTick,
    /// Evaluate alarm bands.
    AlarmTick,
    /// 1 Hz housekeeping: escalation, purge window, telemetry.
    SecondTick,
    /// Fresh probe readings; `None` marks a missed conversion.
    Temperatures { t1: Option<f32>, t2: Option<f32> },
    /// Bubble sensor fired.
    Bubble,
    /// Host link transmission started/finished; filter compute is
    /// skipped while the flag is set.
    LinkBusy(bool),
    Command(Command),
    Shutdown,
}

pub fn channel() -> (xch::Sender<Event>, xch::Receiver<Event>) {
    xch::bounded(EVENT_QUEUE_DEPTH)
}

/// Spawn a thread that delivers `event` every `period` until the
/// receiver side disconnects.
pub fn spawn_ticker(
    tx: xch::Sender<Event>,
    period: Duration,
    event: Event,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        loop {
            std::thread::sleep(period);
            match tx.try_send(event) {
                Ok(()) => {}
                Err(xch::TrySendError::Full(_)) => {
                    // Supervisor is behind; this tick is droppable.
                    tracing::trace!(?event, "ticker event dropped, queue full");
                }
                Err(xch::TrySendError::Disconnected(_)) => break,
            }
        }
        tracing::trace!(?event, "ticker thread exiting");
    })
}

/// Deliver an event, dropping it when the queue is full. `Err` means
/// the supervisor side is gone.
fn deliver(tx: &xch::Sender<Event>, event: Event) -> std::result::Result<(), ()> {
    match tx.try_send(event) {
        Ok(()) => Ok(()),
        Err(xch::TrySendError::Full(_)) => {
            tracing::trace!(?event, "sensor event dropped, queue full");
            Ok(())
        }
        Err(xch::TrySendError::Disconnected(_)) => Err(()),
    }
}

/// Spawn a thread that polls the temperature probes and the bubble
/// sensor every `period`, delivering readings as events until the
/// receiver side disconnects. A failed probe read becomes a `None`
/// reading so the core marks the probe unhealthy.
pub fn spawn_sensor_poll<T1, T2, B>(
    tx: xch::Sender<Event>,
    mut temp1: T1,
    mut temp2: T2,
    mut bubble: B,
    period: Duration,
) -> std::thread::JoinHandle<()>
where
    T1: TempSensor + Send + 'static,
    T2: TempSensor + Send + 'static,
    B: BubbleSensor + Send + 'static,
{
    std::thread::spawn(move || {
        loop {
            std::thread::sleep(period);

            let t1 = temp1.read_celsius().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "temp probe 1 read failed");
                None
            });
            let t2 = temp2.read_celsius().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "temp probe 2 read failed");
                None
            });
            if deliver(&tx, Event::Temperatures { t1, t2 }).is_err() {
                break;
            }

            match bubble.bubble_present() {
                Ok(true) => {
                    if deliver(&tx, Event::Bubble).is_err() {
                        break;
                    }
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "bubble sensor read failed"),
            }
        }
        tracing::trace!("sensor poll thread exiting");
    })
}

/// Stall watchdog threshold: four sensor timeouts, but never less than
/// two sampling periods so a single missed sample cannot trip it.
#[inline]
fn stall_threshold_ms(sensor_timeout_ms: u64, period_ms: u64) -> u64 {
    sensor_timeout_ms
        .saturating_mul(4)
        .max(period_ms.saturating_mul(2))
        .max(1)
}

/// Run the supervisor loop until a `Shutdown` event arrives.
///
/// The sampler thread owns the pressure sensor; this loop pulls its
/// latest reading on every control tick and watchdogs the channel.
/// A fault from any one event is logged and the loop keeps serving the
/// rest; nothing short of `Shutdown` ends it.
pub fn run<L, V, T>(
    core: &mut ControlCore<L, V>,
    rx: &xch::Receiver<Event>,
    sampler: &Sampler,
    sink: &mut T,
    sensor_timeout: Duration,
) where
    L: PumpLink,
    V: IsolationValve,
    T: TelemetrySink,
{
    let threshold_ms = stall_threshold_ms(
        sensor_timeout.as_millis().min(u128::from(u64::MAX)) as u64,
        CONTROL_PERIOD_MS,
    );

    tracing::info!(threshold_ms, "supervisor loop started");

    for event in rx {
        match event {
            Event::ControlTick => match sampler.latest() {
                Some(raw) => core.ingest_sample(raw),
                None => {
                    if sampler.stalled_for_now() > threshold_ms {
                        core.note_pressure_stall();
                    }
                }
            },
            Event::PumpTick => {
                if let Err(e) = core.pump_tick() {
                    tracing::warn!(error = %e, "pump link error");
                }
            }
            Event::AlarmTick => core.alarm_cycle(),
            Event::SecondTick => {
                if let Err(e) = core.second_tick() {
                    tracing::warn!(error = %e, "housekeeping tick failed");
                }
                let record = core.telemetry_record().encode();
                if let Err(e) = sink.emit(&record) {
                    tracing::warn!(error = %e, "telemetry emit failed");
                }
            }
            Event::Temperatures { t1, t2 } => core.set_temperatures(t1, t2),
            Event::Bubble => {
                if let Err(e) = core.trigger_bubble() {
                    tracing::warn!(error = %e, "bubble isolation failed");
                }
            }
            Event::LinkBusy(busy) => core.set_link_busy(busy),
            Event::Command(cmd) => {
                if let Err(e) = core.handle_command(cmd) {
                    tracing::warn!(?cmd, error = %e, "command failed");
                }
            }
            Event::Shutdown => {
                tracing::info!("supervisor shutdown requested");
                break;
            }
        }
    }
}
