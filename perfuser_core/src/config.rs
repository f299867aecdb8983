//! Runtime configuration for the control core.
//!
//! These are the validated structs the core consumes. They are separate
//! from the TOML-deserialized schema in `perfuser_config`; `CoreCfg`
//! can be produced from a parsed `perfuser_config::Config`.

/// PID gains and timestep.
#[derive(Debug, Clone, Copy)]
pub struct PidCfg {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Fixed controller timestep in milliseconds. The bench firmware ran
    /// the PID with a constant 100 ms step regardless of call cadence.
    pub dt_ms: u64,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 0.2,
            ki: 0.2,
            kd: 0.2,
            dt_ms: 100,
        }
    }
}

/// Pump drive link and speed policy.
#[derive(Debug, Clone, Copy)]
pub struct PumpCfg {
    /// Modbus slave id.
    pub device_id: u8,
    /// Reply window before the drive is reported offline and the frame
    /// is re-issued.
    pub reply_timeout_ms: u64,
    /// Low speed staged before starting the pump in Hold; also the value
    /// the commanded speed resets to on stop.
    pub startup_speed: f32,
    /// Fixed speed for the Flush regime.
    pub flush_speed: f32,
    /// Fixed maximum speed while purging a bubble.
    pub purge_speed: f32,
}

impl Default for PumpCfg {
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

/// Alarm bands and the escalation budget.
#[derive(Debug, Clone, Copy)]
pub struct AlarmCfg {
    pub temp_low_limit: f32,
    pub temp_high_limit: f32,
    /// Flow-resistance threshold (pressure / flow).
    pub resistance_limit: f32,
    /// Seconds of sustained out-of-band pressure before the lockout.
    pub escalation_ceiling_secs: u32,
}

impl Default for AlarmCfg {
    fn default() -> Self {
        Self {
            temp_low_limit: 4.0,
            temp_high_limit: 10.0,
            resistance_limit: 1.1,
            escalation_ceiling_secs: 600,
        }
    }
}

/// Bubble purge window.
#[derive(Debug, Clone, Copy)]
pub struct PurgeCfg {
    pub duration_secs: u32,
}

impl Default for PurgeCfg {
    fn default() -> Self {
        Self { duration_secs: 60 }
    }
}

/// Pressure filter parameters. The 10-sample window is structural (it
/// bounds memory and the sort cost) and is not configurable.
#[derive(Debug, Clone, Copy)]
pub struct FilterCfg {
    /// Exponential smoothing factor applied after the trimmed mean.
    pub ema_k: f32,
    /// Raw sampling rate in Hz (informational; drives loop pacing).
    pub sample_rate_hz: u32,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            ema_k: 0.2,
            sample_rate_hz: 10,
        }
    }
}

/// Telemetry derivation constants.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryCfg {
    /// Scalar converting commanded pump speed to a flow estimate.
    pub perfusion_ratio: f32,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            perfusion_ratio: 0.6,
        }
    }
}

/// Complete runtime configuration bundle for `ControlCore`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreCfg {
    pub target_pressure: TargetPressure,
    pub pid: PidCfg,
    pub pump: PumpCfg,
    pub alarm: AlarmCfg,
    pub purge: PurgeCfg,
    pub filter: FilterCfg,
    pub telemetry: TelemetryCfg,
}

/// Newtype so the default setpoint travels with the bundle.
#[derive(Debug, Clone, Copy)]
pub struct TargetPressure(pub f32);

impl Default for TargetPressure {
    fn default() -> Self {
        Self(29.0)
    }
}

impl From<&perfuser_config::Config> for CoreCfg {
    fn from(c: &perfuser_config::Config) -> Self {
        Self {
            target_pressure: TargetPressure(c.pressure.target),
            pid: PidCfg {
                kp: c.pid.kp,
                ki: c.pid.ki,
                kd: c.pid.kd,
                dt_ms: c.pid.dt_ms,
            },
            pump: PumpCfg {
                device_id: c.pump.device_id,
                reply_timeout_ms: c.pump.reply_timeout_ms,
                startup_speed: c.pump.startup_speed,
                flush_speed: c.pump.flush_speed,
                purge_speed: c.pump.purge_speed,
            },
            alarm: AlarmCfg {
                temp_low_limit: c.alarm.temp_low_limit,
                temp_high_limit: c.alarm.temp_high_limit,
                resistance_limit: c.alarm.resistance_limit,
                escalation_ceiling_secs: c.alarm.escalation_ceiling_secs,
            },
            purge: PurgeCfg {
                duration_secs: c.purge.duration_secs,
            },
            filter: FilterCfg {
                ema_k: c.filter.ema_k,
                sample_rate_hz: c.filter.sample_rate_hz,
            },
            telemetry: TelemetryCfg {
                perfusion_ratio: c.telemetry.perfusion_ratio,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_cfg_mirrors_parsed_config() {
        let parsed = perfuser_config::load_toml(
            "[pressure]\ntarget = 32.0\n[pump]\nstartup_speed = 8.0\n",
        )
        .expect("parse");
        let cfg = CoreCfg::from(&parsed);
        assert_eq!(cfg.target_pressure.0, 32.0);
        assert_eq!(cfg.pump.startup_speed, 8.0);
        assert_eq!(cfg.alarm.escalation_ceiling_secs, 600);
    }
}
