#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core perfusion control logic (hardware-agnostic).
//!
//! This crate regulates circuit pressure to a target via a motor-driven
//! pump, watches for dangerous conditions (over/under pressure, bad
//! temperature, air bubbles, flow resistance) and locks the system down
//! when a fault is not cleared in time. All hardware interactions go
//! through the `perfuser_traits` seams.
//!
//! ## Architecture
//!
//! - **Pressure**: tare, setpoint and derived alarm limits (`pressure`)
//! - **Filtering**: trimmed-mean window plus EMA smoothing (`filter`)
//! - **Control**: PID pressure regulation and per-regime pump policies
//!   (`pid`, `regime`, `core`)
//! - **Pump link**: Modbus RTU framing with retry/confirm (`protocol`,
//!   `pump`)
//! - **Safety**: band evaluation, escalation lockout, bubble purge
//!   (`alarm`, `bubble`)
//! - **Supervision**: single-owner event loop and sampling thread
//!   (`supervisor`, `sampler`)

pub mod alarm;
pub mod alert;
pub mod bubble;
pub mod builder;
pub mod command;
pub mod config;
pub mod core;
pub mod error;
pub mod filter;
pub mod mocks;
pub mod pid;
pub mod pressure;
pub mod protocol;
pub mod pump;
pub mod regime;
pub mod sampler;
pub mod supervisor;
pub mod telemetry;
pub mod util;

pub use crate::alarm::{AlarmMonitor, AlarmOutcome};
pub use crate::alert::{AlertSet, PressureBand};
pub use crate::bubble::BubbleGuard;
pub use crate::builder::{Controller, ControllerBuilder, build_core};
pub use crate::command::Command;
pub use crate::config::{
    AlarmCfg, CoreCfg, FilterCfg, PidCfg, PumpCfg, PurgeCfg, TargetPressure, TelemetryCfg,
};
pub use crate::core::ControlCore;
pub use crate::error::{BuildError, CoreError, Result};
pub use crate::filter::PressureFilter;
pub use crate::pid::PidController;
pub use crate::pressure::Pressure;
pub use crate::protocol::{PumpCommand, RotateDirection};
pub use crate::pump::{PumpProtocol, PumpState, PumpStatus};
pub use crate::regime::{Regime, RegimeStateMachine};
pub use crate::sampler::Sampler;
pub use crate::supervisor::Event;
pub use crate::telemetry::{ElapsedTime, HealthBits, KidneySide, TelemetryRecord};
