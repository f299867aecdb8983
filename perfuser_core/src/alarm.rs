//! Band evaluation, hysteresis and the sustained-fault escalation timer.
//!
//! Bands are evaluated only while regulating (`Hold`) and only once the
//! pressure has reached the target at least once since regulation began;
//! ramp-up excursions never alarm. Evaluation re-derives every flag from
//! the current readings each cycle, in a fixed order where later checks
//! override earlier ones.

use crate::alert::{AlertSet, PressureBand};
use crate::config::AlarmCfg;
use crate::pressure::Pressure;
use crate::regime::Regime;

/// Pump/regime overrides requested by one evaluation cycle. Applied by
/// the control core after the cycle; the monitor itself never touches
/// the pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmOutcome {
    pub stop_pump: bool,
    pub restart_pump: bool,
    pub force_hold: bool,
}

/// Seconds of sustained out-of-band pressure. Started by the low/high
/// checks, stopped and zeroed when pressure returns to the safe band,
/// ticked at 1 Hz from outside.
#[derive(Debug, Default)]
struct EscalationTimer {
    secs: u32,
    running: bool,
}

impl EscalationTimer {
    fn start(&mut self) {
        if !self.running {
            self.secs = 0;
            self.running = true;
            tracing::warn!("escalation timer started");
        }
    }

    fn stop_and_reset(&mut self) {
        if self.running {
            tracing::info!(elapsed_secs = self.secs, "escalation timer reset");
        }
        self.secs = 0;
        self.running = false;
    }

    /// Returns true when the ceiling is reached.
    fn tick(&mut self, ceiling_secs: u32) -> bool {
        if !self.running {
            return false;
        }
        self.secs = self.secs.saturating_add(1);
        self.secs >= ceiling_secs
    }
}

#[derive(Debug)]
pub struct AlarmMonitor {
    cfg: AlarmCfg,
    alerts: AlertSet,
    /// Pressure has reached the target at least once since entering Hold.
    stabilized: bool,
    /// Critically-high excursion seen; recovery restarts the pump.
    high_beat: bool,
    escalation: EscalationTimer,
}

impl AlarmMonitor {
    pub fn new(cfg: AlarmCfg) -> Self {
        Self {
            cfg,
            alerts: AlertSet::default(),
            stabilized: false,
            high_beat: false,
            escalation: EscalationTimer::default(),
        }
    }

    pub fn alerts(&self) -> AlertSet {
        self.alerts
    }

    pub fn stabilized(&self) -> bool {
        self.stabilized
    }

    /// Call on every `Stopped -> Hold` transition so the next ramp-up
    /// is alarm-free again.
    pub fn reset_stabilization(&mut self) {
        self.stabilized = false;
        self.high_beat = false;
        self.escalation.stop_and_reset();
    }

    pub fn set_temp_low_limit(&mut self, v: f32) {
        self.cfg.temp_low_limit = v;
    }

    pub fn set_temp_high_limit(&mut self, v: f32) {
        self.cfg.temp_high_limit = v;
    }

    /// One evaluation cycle over the current readings.
    ///
    /// `resistance` is filtered pressure over estimated flow. Flags hold
    /// their previous values while evaluation is gated off.
    pub fn evaluate(
        &mut self,
        pressure: &Pressure,
        temp1: f32,
        temp2: f32,
        resistance: f32,
        regime: Regime,
    ) -> AlarmOutcome {
        let mut outcome = AlarmOutcome::default();

        if regime == Regime::Hold && !self.stabilized && pressure.value() >= pressure.target() {
            self.stabilized = true;
            tracing::info!(value = pressure.value(), "pressure stabilized, alarms armed");
        }
        if !(self.stabilized && regime == Regime::Hold) {
            return outcome;
        }

        let v = pressure.value();

        let mut band = if v > pressure.optimal_high_limit() {
            PressureBand::Rising
        } else {
            PressureBand::Normal
        };

        if v < pressure.low_limit() {
            band = PressureBand::Low;
            self.escalation.start();
        }

        if v > pressure.high_limit() {
            band = PressureBand::High;
            outcome.stop_pump = true;
            self.high_beat = true;
            self.escalation.start();
        }

        // Safe band: clear every pressure flag, drop the timer, recover
        // from a critically-high excursion if one was seen.
        if v > pressure.low_limit() && v < pressure.high_limit() {
            band = PressureBand::Normal;
            self.escalation.stop_and_reset();
            if self.high_beat {
                outcome.restart_pump = true;
                outcome.force_hold = true;
                self.high_beat = false;
                tracing::info!(value = v, "high-pressure excursion recovered");
            }
        }

        self.alerts.pressure = band;
        self.alerts.resistance_high = resistance > self.cfg.resistance_limit;

        (self.alerts.temp1_low, self.alerts.temp1_high) = temp_band(temp1, &self.cfg);
        (self.alerts.temp2_low, self.alerts.temp2_high) = temp_band(temp2, &self.cfg);

        outcome
    }

    /// 1 Hz tick. Returns true when the sustained-fault ceiling is hit;
    /// the caller must stop the pump and latch the regime.
    pub fn escalation_tick(&mut self) -> bool {
        if self.escalation.tick(self.cfg.escalation_ceiling_secs) {
            tracing::error!(
                ceiling_secs = self.cfg.escalation_ceiling_secs,
                "sustained fault, forcing safety lockout"
            );
            true
        } else {
            false
        }
    }
}

fn temp_band(temp: f32, cfg: &AlarmCfg) -> (bool, bool) {
    if temp < cfg.temp_low_limit {
        (true, false)
    } else if temp > cfg.temp_high_limit {
        (false, true)
    } else {
        (false, false)
    }
}
