//! Type-state builder for the boxed `Controller` wrapper.
//!
//! The builder enforces at compile time that the pump link and the
//! isolation valve are provided before `build()` is available;
//! `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use perfuser_traits::clock::{Clock, MonotonicClock};
use perfuser_traits::{IsolationValve, PumpLink};

use crate::command::Command;
use crate::config::CoreCfg;
use crate::core::ControlCore;
use crate::error::{BuildError, Result};
use crate::regime::Regime;
use crate::telemetry::TelemetryRecord;

/// Dynamic (boxed) controller preserving a small stable API via
/// composition.
pub struct Controller {
    pub(crate) inner: ControlCore<Box<dyn PumpLink>, Box<dyn IsolationValve>>,
}

impl core::fmt::Debug for Controller {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("regime", &self.inner.regime())
            .field("pressure", &self.inner.pressure().value())
            .field("pump", self.inner.pump_status())
            .finish()
    }
}

impl Controller {
    pub fn builder() -> ControllerBuilder<Missing, Missing> {
        ControllerBuilder::default()
    }

    pub fn ingest_sample(&mut self, raw: i16) {
        self.inner.ingest_sample(raw);
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<()> {
        self.inner.handle_command(cmd)
    }

    pub fn alarm_cycle(&mut self) {
        self.inner.alarm_cycle();
    }

    pub fn second_tick(&mut self) -> Result<()> {
        self.inner.second_tick()
    }

    pub fn pump_tick(&mut self) -> Result<()> {
        self.inner.pump_tick()
    }

    pub fn trigger_bubble(&mut self) -> Result<()> {
        self.inner.trigger_bubble()
    }

    pub fn regime(&self) -> Regime {
        self.inner.regime()
    }

    pub fn telemetry_record(&self) -> TelemetryRecord {
        self.inner.telemetry_record()
    }
}

// Type-state markers.
pub struct Missing;
pub struct Set;

pub struct ControllerBuilder<L, V> {
    link: Option<Box<dyn PumpLink>>,
    valve: Option<Box<dyn IsolationValve>>,
    cfg: Option<CoreCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _l: PhantomData<L>,
    _v: PhantomData<V>,
}

impl Default for ControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            link: None,
            valve: None,
            cfg: None,
            clock: None,
            _l: PhantomData,
            _v: PhantomData,
        }
    }
}

/// Validate configuration and construct the core. Single source of
/// truth for both `try_build()` and `build_core()`.
fn validate_and_build<L: PumpLink, V: IsolationValve>(
    link: L,
    valve: V,
    cfg: CoreCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<ControlCore<L, V>> {
    if cfg.pump.reply_timeout_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "reply_timeout_ms must be >= 1",
        )));
    }
    for (name, speed) in [
        ("startup_speed", cfg.pump.startup_speed),
        ("flush_speed", cfg.pump.flush_speed),
        ("purge_speed", cfg.pump.purge_speed),
    ] {
        if !(1.0..=100.0).contains(&speed) {
            tracing::error!(name, speed, "pump speed outside 1..=100");
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "pump speeds must be within 1..=100",
            )));
        }
    }
    if !(0.0..=1.0).contains(&cfg.filter.ema_k) || cfg.filter.ema_k == 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "ema_k must be in (0, 1]",
        )));
    }
    if cfg.target_pressure.0 <= 1.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "target pressure must exceed the 1-unit low-limit margin",
        )));
    }
    if cfg.alarm.escalation_ceiling_secs == 0 || cfg.purge.duration_secs == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "timer ceilings must be >= 1 second",
        )));
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };

    Ok(ControlCore::new(cfg, link, valve, clock))
}

impl<L, V> ControllerBuilder<L, V> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<Controller> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let valve = self
            .valve
            .ok_or_else(|| eyre::Report::new(BuildError::MissingValve))?;
        let inner = validate_and_build(link, valve, self.cfg.unwrap_or_default(), self.clock)?;
        Ok(Controller { inner })
    }

    pub fn with_config(mut self, cfg: CoreCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl<V> ControllerBuilder<Missing, V> {
    pub fn with_link(self, link: impl PumpLink + 'static) -> ControllerBuilder<Set, V> {
        ControllerBuilder {
            link: Some(Box::new(link)),
            valve: self.valve,
            cfg: self.cfg,
            clock: self.clock,
            _l: PhantomData,
            _v: PhantomData,
        }
    }
}

impl<L> ControllerBuilder<L, Missing> {
    pub fn with_valve(self, valve: impl IsolationValve + 'static) -> ControllerBuilder<L, Set> {
        ControllerBuilder {
            link: self.link,
            valve: Some(Box::new(valve)),
            cfg: self.cfg,
            clock: self.clock,
            _l: PhantomData,
            _v: PhantomData,
        }
    }
}

impl ControllerBuilder<Set, Set> {
    /// Only available once link and valve are set.
    pub fn build(self) -> Result<Controller> {
        self.try_build()
    }
}

/// Build a generic, statically-dispatched core from concrete parts.
pub fn build_core<L, V>(
    link: L,
    valve: V,
    cfg: CoreCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<ControlCore<L, V>>
where
    L: PumpLink + 'static,
    V: IsolationValve + 'static,
{
    validate_and_build(link, valve, cfg, clock)
}
