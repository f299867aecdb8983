//! Control core: single owner of all regulation state.
//!
//! Exactly one task mutates this structure; sensors, timers and the
//! command surface deliver events to it through the supervisor. Pump
//! commands always go through `PumpProtocol`; the core never touches
//! the link directly.

use std::sync::Arc;

use perfuser_traits::{Clock, IsolationValve, PumpLink};

use crate::alarm::AlarmMonitor;
use crate::alert::AlertSet;
use crate::bubble::BubbleGuard;
use crate::command::Command;
use crate::config::CoreCfg;
use crate::error::Result;
use crate::filter::PressureFilter;
use crate::pid::PidController;
use crate::pressure::{self, Pressure};
use crate::protocol::PumpCommand;
use crate::pump::{PumpProtocol, PumpStatus};
use crate::regime::{Regime, RegimeStateMachine};
use crate::telemetry::{ElapsedTime, HealthBits, KidneySide, TelemetryRecord};

pub struct ControlCore<L: PumpLink, V: IsolationValve> {
    cfg: CoreCfg,
    pressure: Pressure,
    filter: PressureFilter,
    pid: PidController,
    regimes: RegimeStateMachine,
    alarm: AlarmMonitor,
    bubble: BubbleGuard,
    pump: PumpProtocol<L>,
    valve: V,
    temp1: f32,
    temp2: f32,
    health: HealthBits,
    /// Host link mid-transmission; filter compute is skipped while set.
    link_busy: bool,
    perfusion_ratio: f32,
    side: KidneySide,
    /// Operator block: commands other than unblock are ignored.
    blocked: bool,
    elapsed: ElapsedTime,
}

impl<L: PumpLink, V: IsolationValve> ControlCore<L, V> {
    pub fn new(cfg: CoreCfg, link: L, valve: V, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let pressure = Pressure::new(cfg.target_pressure.0);
        let pid = PidController::new(&cfg.pid, cfg.target_pressure.0);
        let filter = PressureFilter::new(cfg.filter.ema_k, 1.0);
        let pump = PumpProtocol::new(link, &cfg.pump, clock);
        Self {
            pressure,
            filter,
            pid,
            regimes: RegimeStateMachine::default(),
            alarm: AlarmMonitor::new(cfg.alarm),
            bubble: BubbleGuard::new(&cfg.purge),
            pump,
            valve,
            temp1: 0.0,
            temp2: 0.0,
            health: HealthBits::default(),
            link_busy: false,
            perfusion_ratio: cfg.telemetry.perfusion_ratio,
            side: KidneySide::default(),
            blocked: false,
            elapsed: ElapsedTime::default(),
            cfg,
        }
    }

    /// Feed one raw ADC reading. Every tenth reading closes the filter
    /// window and runs a control cycle on the new smoothed value, so the
    /// filter output is visible to the policies before they evaluate.
    pub fn ingest_sample(&mut self, raw: i16) {
        self.health.pressure_sensor = true;
        let corrected = self.pressure.correct(pressure::counts_to_units(raw));
        if let Some(smoothed) = self.filter.sample(corrected, self.link_busy) {
            self.pressure.set_value(smoothed);
            self.control_cycle();
        }
    }

    /// Per-regime pump policy for one control cycle.
    ///
    /// Start sequences are staged across two cycles because the link
    /// carries one unconfirmed command at a time: the speed write goes
    /// out first, the start frame on the next cycle.
    fn control_cycle(&mut self) {
        match self.regimes.regime() {
            Regime::Hold => {
                if self.pump.is_on() {
                    let speed = self.pid.compute(self.pressure.value());
                    self.pump.issue(PumpCommand::SetSpeed(speed));
                } else {
                    match self.regimes.staged_start() {
                        None => {
                            self.pump
                                .issue(PumpCommand::SetSpeed(self.cfg.pump.startup_speed));
                            self.regimes.stage_start(self.cfg.pump.startup_speed);
                        }
                        Some(_) => {
                            self.pump.issue(PumpCommand::Start);
                            self.regimes.clear_staged_start();
                        }
                    }
                }
            }
            Regime::Flush => {
                if !self.regimes.flush_primed() {
                    match self.regimes.staged_start() {
                        None => {
                            self.pump
                                .issue(PumpCommand::SetSpeed(self.cfg.pump.flush_speed));
                            self.regimes.stage_start(self.cfg.pump.flush_speed);
                        }
                        Some(_) => {
                            if !self.pump.is_on() {
                                self.pump.issue(PumpCommand::Start);
                            }
                            self.regimes.clear_staged_start();
                            self.regimes.set_flush_primed();
                        }
                    }
                }
            }
            Regime::BubblePurge => {
                if self.pump.is_on() {
                    if self.pump.status().speed != self.cfg.pump.purge_speed {
                        self.pump
                            .issue(PumpCommand::SetSpeed(self.cfg.pump.purge_speed));
                    }
                } else {
                    match self.regimes.staged_start() {
                        None => {
                            self.pump
                                .issue(PumpCommand::SetSpeed(self.cfg.pump.purge_speed));
                            self.regimes.stage_start(self.cfg.pump.purge_speed);
                        }
                        Some(_) => {
                            self.pump.issue(PumpCommand::Start);
                            self.regimes.clear_staged_start();
                        }
                    }
                }
            }
            Regime::Stopped | Regime::Latched => {
                if self.pump.is_on() {
                    self.pump.issue(PumpCommand::Stop);
                    self.pump.reset_speed(self.cfg.pump.startup_speed);
                    self.pid.reset();
                }
            }
        }
    }

    /// One alarm evaluation over the current readings.
    pub fn alarm_cycle(&mut self) {
        let flow = self.pump.status().speed * self.perfusion_ratio;
        let resistance = if flow > 0.0 {
            self.pressure.value() / flow
        } else {
            0.0
        };
        let outcome = self.alarm.evaluate(
            &self.pressure,
            self.temp1,
            self.temp2,
            resistance,
            self.regimes.regime(),
        );
        if outcome.stop_pump && self.pump.is_on() {
            self.pump.issue(PumpCommand::Stop);
        }
        if outcome.force_hold {
            self.regimes.force_hold();
        }
        if outcome.restart_pump && !self.pump.is_on() {
            self.pump.issue(PumpCommand::Start);
        }
    }

    /// 1 Hz housekeeping: run clock, escalation ceiling, purge window.
    pub fn second_tick(&mut self) -> Result<()> {
        if !matches!(self.regimes.regime(), Regime::Stopped | Regime::Latched) {
            self.elapsed.tick();
        }

        if self.alarm.escalation_tick() {
            self.pump.issue(PumpCommand::Stop);
            self.pump.reset_speed(self.cfg.pump.startup_speed);
            self.regimes.latch();
            // An in-progress purge must not outlive the lockout; the
            // isolation valve stays closed.
            self.bubble.stop();
        }

        if self.bubble.tick() {
            self.valve
                .open()
                .map_err(|e| eyre::eyre!("isolation valve open failed: {e}"))?;
            self.regimes.finish_purge();
        }
        Ok(())
    }

    /// One pump-protocol tick. Keeps running in every regime, latched
    /// included, so a final stop frame still reaches the drive.
    pub fn pump_tick(&mut self) -> Result<()> {
        let r = self.pump.service();
        self.health.pump = !self.pump.status().offline;
        r
    }

    /// Bubble detection path, also used by the emulation command.
    /// Isolates the organ, then hands control to the purge policy.
    /// Inert while latched; the lockout is terminal.
    pub fn trigger_bubble(&mut self) -> Result<()> {
        if self.regimes.regime() == Regime::Latched {
            tracing::warn!("bubble ignored while latched");
            return Ok(());
        }
        self.valve
            .close()
            .map_err(|e| eyre::eyre!("isolation valve close failed: {e}"))?;
        self.bubble.start();
        self.regimes.enter_purge();
        Ok(())
    }

    /// Apply one inbound command. Ignored wholesale while latched; the
    /// operator block gate passes only its own toggle.
    pub fn handle_command(&mut self, cmd: Command) -> Result<()> {
        if self.regimes.regime() == Regime::Latched {
            tracing::warn!(?cmd, "command ignored while latched");
            return Ok(());
        }
        if self.blocked && cmd != Command::ToggleBlock {
            tracing::debug!(?cmd, "command ignored while blocked");
            return Ok(());
        }

        match cmd {
            Command::Start => {
                if self.regimes.request_start() {
                    self.begin_regulation();
                }
            }
            Command::Pause | Command::Stop => {
                if self.regimes.regime() == Regime::Flush {
                    self.regimes.toggle_flush();
                } else {
                    self.regimes.request_stop();
                }
            }
            Command::Regime(code) => match Regime::from_code(code) {
                Some(r) => {
                    let was = self.regimes.regime();
                    if self.regimes.select(r) && r == Regime::Hold && was == Regime::Stopped {
                        self.begin_regulation();
                    }
                }
                None => tracing::warn!(code, "unknown regime code"),
            },
            Command::SetSpeed(v) => self.pump.issue(PumpCommand::SetSpeed(v)),
            Command::SetRotateDirection(d) => self.pump.issue(PumpCommand::SetDirection(d)),
            Command::TarePressure => {
                // Current corrected reading becomes the new zero.
                let tare = self.pressure.tare() + self.pressure.value();
                self.pressure.set_tare(tare);
                tracing::info!(tare, "pressure tared");
            }
            Command::SetPerfusionRatio(v) => self.perfusion_ratio = v,
            Command::SetTargetPressure(v) => {
                self.pressure.set_target(v);
                self.pid.set_target(v);
            }
            Command::EmulateBubble => self.trigger_bubble()?,
            Command::SetTempLowLimit(v) => self.alarm.set_temp_low_limit(v),
            Command::SetTempHighLimit(v) => self.alarm.set_temp_high_limit(v),
            Command::SetP(v) => self.pid.set_kp(v),
            Command::SetI(v) => self.pid.set_ki(v),
            Command::SetD(v) => self.pid.set_kd(v),
            Command::ToggleKidneySide => {
                self.side = match self.side {
                    KidneySide::Left => KidneySide::Right,
                    KidneySide::Right => KidneySide::Left,
                };
            }
            Command::ToggleBlock => {
                self.blocked = !self.blocked;
                tracing::info!(blocked = self.blocked, "operator block toggled");
            }
        }
        Ok(())
    }

    fn begin_regulation(&mut self) {
        self.alarm.reset_stabilization();
        self.pid.reset();
        self.elapsed.reset();
    }

    /// Update temperatures from the probe task; `None` keeps the last
    /// known value and marks the probe unhealthy.
    pub fn set_temperatures(&mut self, t1: Option<f32>, t2: Option<f32>) {
        match t1 {
            Some(v) => {
                self.temp1 = v;
                self.health.temp1 = true;
            }
            None => self.health.temp1 = false,
        }
        match t2 {
            Some(v) => {
                self.temp2 = v;
                self.health.temp2 = true;
            }
            None => self.health.temp2 = false,
        }
    }

    /// Mark the pressure channel stalled (no fresh sample in time).
    pub fn note_pressure_stall(&mut self) {
        self.health.pressure_sensor = false;
    }

    pub fn set_link_busy(&mut self, busy: bool) {
        self.link_busy = busy;
    }

    pub fn link_busy(&self) -> bool {
        self.link_busy
    }

    /// Snapshot for the host link.
    pub fn telemetry_record(&self) -> TelemetryRecord {
        TelemetryRecord {
            flow: self.pump.status().speed * self.perfusion_ratio,
            pressure: self.pressure.value(),
            temp1: self.temp1,
            temp2: self.temp2,
            elapsed: self.elapsed,
            regime: self.regimes.regime(),
            side: self.side,
            blocked: self.blocked,
            alerts: self.alarm.alerts(),
            health: self.health,
            target: self.pressure.target(),
        }
    }

    pub fn regime(&self) -> Regime {
        self.regimes.regime()
    }

    pub fn pump_status(&self) -> &PumpStatus {
        self.pump.status()
    }

    pub fn alerts(&self) -> AlertSet {
        self.alarm.alerts()
    }

    pub fn pressure(&self) -> &Pressure {
        &self.pressure
    }

    pub fn purging(&self) -> bool {
        self.bubble.purging()
    }

    pub fn elapsed(&self) -> ElapsedTime {
        self.elapsed
    }
}
