#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the perfusion bench controller.
//!
//! `Config` and sub-structs are deserialized from TOML and validated.
//! Every threshold and gain the control core uses is set here; the core
//! itself carries no tunable literals beyond these defaults, which
//! mirror the bench firmware values.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PressureSection {
    /// Setpoint in circuit pressure units (inHg on the bench).
    pub target: f32,
}

impl Default for PressureSection {
    fn default() -> Self {
        Self { target: 29.0 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PidSection {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Controller timestep in milliseconds (fixed, not derived from the
    /// actual call cadence).
    pub dt_ms: u64,
}

impl Default for PidSection {
    fn default() -> Self {
        Self {
            kp: 0.2,
            ki: 0.2,
            kd: 0.2,
            dt_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PumpSection {
    /// Modbus slave id of the pump drive.
    pub device_id: u8,
    /// Give up waiting for a reply after this long; the command is then
    /// re-issued and the drive reported offline.
    pub reply_timeout_ms: u64,
    /// Low speed commanded before starting the pump in Hold.
    pub startup_speed: f32,
    /// Fixed speed used for the Flush regime.
    pub flush_speed: f32,
    /// Fixed speed used while purging a bubble.
    pub purge_speed: f32,
}

impl Default for PumpSection {
    fn default() -> Self {
        Self {
            device_id: 1,
            reply_timeout_ms: 2000,
            startup_speed: 10.0,
            flush_speed: 100.0,
            purge_speed: 100.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct AlarmSection {
    pub temp_low_limit: f32,
    pub temp_high_limit: f32,
    /// Flow-resistance alarm threshold (pressure / flow).
    pub resistance_limit: f32,
    /// Sustained out-of-band pressure budget before the safety lockout.
    pub escalation_ceiling_secs: u32,
}

impl Default for AlarmSection {
    fn default() -> Self {
        Self {
            temp_low_limit: 4.0,
            temp_high_limit: 10.0,
            resistance_limit: 1.1,
            escalation_ceiling_secs: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PurgeSection {
    /// Bubble purge window in seconds.
    pub duration_secs: u32,
}

impl Default for PurgeSection {
    fn default() -> Self {
        Self { duration_secs: 60 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FilterSection {
    /// Exponential smoothing factor applied after the trimmed mean.
    pub ema_k: f32,
    /// Raw ADC sampling rate in Hz (informational; drives loop pacing).
    pub sample_rate_hz: u32,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            ema_k: 0.2,
            sample_rate_hz: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct TelemetrySection {
    /// Scalar converting commanded pump speed to a flow estimate.
    pub perfusion_ratio: f32,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            perfusion_ratio: 0.6,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pressure: PressureSection,
    pub pid: PidSection,
    pub pump: PumpSection,
    pub alarm: AlarmSection,
    pub purge: PurgeSection,
    pub filter: FilterSection,
    pub telemetry: TelemetrySection,
}

impl Config {
    /// Range-check every section; returns the first violation found.
    pub fn validate(&self) -> eyre::Result<()> {
        let finite = |v: f32, name: &str| -> eyre::Result<()> {
            if v.is_finite() {
                Ok(())
            } else {
                Err(eyre::eyre!("{name} must be finite"))
            }
        };

        finite(self.pressure.target, "pressure.target")?;
        if self.pressure.target <= 0.0 {
            return Err(eyre::eyre!("pressure.target must be > 0"));
        }

        for (v, name) in [
            (self.pid.kp, "pid.kp"),
            (self.pid.ki, "pid.ki"),
            (self.pid.kd, "pid.kd"),
        ] {
            finite(v, name)?;
            if v < 0.0 {
                return Err(eyre::eyre!("{name} must be >= 0"));
            }
        }
        if self.pid.dt_ms == 0 {
            return Err(eyre::eyre!("pid.dt_ms must be > 0"));
        }

        if self.pump.device_id == 0 || self.pump.device_id > 247 {
            return Err(eyre::eyre!("pump.device_id must be in 1..=247"));
        }
        if self.pump.reply_timeout_ms == 0 {
            return Err(eyre::eyre!("pump.reply_timeout_ms must be > 0"));
        }
        for (v, name) in [
            (self.pump.startup_speed, "pump.startup_speed"),
            (self.pump.flush_speed, "pump.flush_speed"),
            (self.pump.purge_speed, "pump.purge_speed"),
        ] {
            finite(v, name)?;
            if !(0.0..=100.0).contains(&v) || v == 0.0 {
                return Err(eyre::eyre!("{name} must be in (0, 100]"));
            }
        }

        finite(self.alarm.temp_low_limit, "alarm.temp_low_limit")?;
        finite(self.alarm.temp_high_limit, "alarm.temp_high_limit")?;
        if self.alarm.temp_low_limit >= self.alarm.temp_high_limit {
            return Err(eyre::eyre!(
                "alarm.temp_low_limit must be below alarm.temp_high_limit"
            ));
        }
        finite(self.alarm.resistance_limit, "alarm.resistance_limit")?;
        if self.alarm.resistance_limit <= 0.0 {
            return Err(eyre::eyre!("alarm.resistance_limit must be > 0"));
        }
        if self.alarm.escalation_ceiling_secs == 0 {
            return Err(eyre::eyre!("alarm.escalation_ceiling_secs must be > 0"));
        }

        if self.purge.duration_secs == 0 {
            return Err(eyre::eyre!("purge.duration_secs must be > 0"));
        }

        finite(self.filter.ema_k, "filter.ema_k")?;
        if !(0.0..=1.0).contains(&self.filter.ema_k) || self.filter.ema_k == 0.0 {
            return Err(eyre::eyre!("filter.ema_k must be in (0, 1]"));
        }
        if self.filter.sample_rate_hz == 0 {
            return Err(eyre::eyre!("filter.sample_rate_hz must be > 0"));
        }

        finite(self.telemetry.perfusion_ratio, "telemetry.perfusion_ratio")?;
        if self.telemetry.perfusion_ratio <= 0.0 {
            return Err(eyre::eyre!("telemetry.perfusion_ratio must be > 0"));
        }

        Ok(())
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_path(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("reading {}: {e}", path.display()))?;
    let cfg = load_toml(&text)?;
    cfg.validate()?;
    Ok(cfg)
}
