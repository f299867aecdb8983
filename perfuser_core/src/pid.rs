//! PID controller mapping filtered pressure error to pump speed.
//!
//! Runs once per completed filter window, with a fixed timestep.
//! Direction is normal: rising error (pressure below target) raises the
//! output. Output is clamped to `[1, 100]`; the integral term stops
//! accumulating while the output is saturated so the controller does
//! not wind up during long saturation (e.g. ramp-up).

use crate::config::PidCfg;

pub const OUTPUT_MIN: f32 = 1.0;
pub const OUTPUT_MAX: f32 = 100.0;

#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    setpoint: f32,
    integral: f32,
    prev_error: f32,
    dt: f32,
}

impl PidController {
    pub fn new(cfg: &PidCfg, setpoint: f32) -> Self {
        Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            setpoint,
            integral: 0.0,
            prev_error: 0.0,
            dt: cfg.dt_ms as f32 / 1000.0,
        }
    }

    pub fn set_target(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    pub fn set_kp(&mut self, kp: f32) {
        self.kp = kp;
    }
    pub fn set_ki(&mut self, ki: f32) {
        self.ki = ki;
    }
    pub fn set_kd(&mut self, kd: f32) {
        self.kd = kd;
    }

    /// Compute the next pump speed for the given filtered pressure.
    pub fn compute(&mut self, measurement: f32) -> f32 {
        let error = self.setpoint - measurement;

        let p = self.kp * error;

        self.integral += error * self.dt;
        let i = self.ki * self.integral;

        let derivative = if self.dt > 0.0 {
            (error - self.prev_error) / self.dt
        } else {
            0.0
        };
        let d = self.kd * derivative;

        self.prev_error = error;

        let output = (p + i + d).clamp(OUTPUT_MIN, OUTPUT_MAX);

        // Conditional integration: back out this step's accumulation
        // while the output is pinned at either limit.
        if output >= OUTPUT_MAX || output <= OUTPUT_MIN {
            self.integral -= error * self.dt;
        }

        output
    }

    /// Clear accumulated state; call when regulation stops.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}
