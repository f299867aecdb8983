//! Circuit pressure model: tare, setpoint and derived alarm limits.

/// Units per raw ADC count for the differential pressure channel
/// (ADS1115 at gain 16, divided down per the bench wiring).
pub const UNITS_PER_COUNT: f32 = 7.8125 / 25.0;

/// Convert a raw ADC reading to pressure units before tare correction.
#[inline]
pub fn counts_to_units(raw: i16) -> f32 {
    f32::from(raw) * UNITS_PER_COUNT
}

/// Tare-corrected, target-relative pressure state.
///
/// The derived limits are recomputed whenever the target changes:
/// `low = target - 1`, `optimal_high = target + 1`, `high = target + 10`.
/// `value` is written only by the filter path; `tare` only by a tare
/// request.
#[derive(Debug, Clone, Copy)]
pub struct Pressure {
    target: f32,
    low_limit: f32,
    optimal_high_limit: f32,
    high_limit: f32,
    tare: f32,
    value: f32,
}

impl Pressure {
    pub fn new(target: f32) -> Self {
        let mut p = Self {
            target,
            low_limit: 0.0,
            optimal_high_limit: 0.0,
            high_limit: 0.0,
            tare: 0.0,
            value: 1.0,
        };
        p.recompute_limits();
        p
    }

    fn recompute_limits(&mut self) {
        self.low_limit = self.target - 1.0;
        self.optimal_high_limit = self.target + 1.0;
        self.high_limit = self.target + 10.0;
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
        self.recompute_limits();
    }

    pub fn set_tare(&mut self, tare: f32) {
        self.tare = tare;
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    /// Tare-correct a converted sensor reading.
    #[inline]
    pub fn correct(&self, units: f32) -> f32 {
        units - self.tare
    }

    pub fn target(&self) -> f32 {
        self.target
    }
    pub fn tare(&self) -> f32 {
        self.tare
    }
    pub fn value(&self) -> f32 {
        self.value
    }
    pub fn low_limit(&self) -> f32 {
        self.low_limit
    }
    pub fn optimal_high_limit(&self) -> f32 {
        self.optimal_high_limit
    }
    pub fn high_limit(&self) -> f32 {
        self.high_limit
    }
}

impl Default for Pressure {
    fn default() -> Self {
        Self::new(29.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_follow_target_updates() {
        let mut p = Pressure::default();
        assert_eq!(p.low_limit(), 28.0);
        assert_eq!(p.optimal_high_limit(), 30.0);
        assert_eq!(p.high_limit(), 39.0);

        p.set_target(35.0);
        assert_eq!(p.low_limit(), 34.0);
        assert_eq!(p.optimal_high_limit(), 36.0);
        assert_eq!(p.high_limit(), 45.0);
    }

    #[test]
    fn tare_shifts_corrected_readings() {
        let mut p = Pressure::default();
        p.set_tare(2.5);
        assert_eq!(p.correct(30.0), 27.5);
    }

    #[test]
    fn counts_conversion_uses_adc_scale() {
        // 25 counts * 7.8125 / 25 = 7.8125 units
        assert!((counts_to_units(25) - 7.8125).abs() < 1e-6);
        assert_eq!(counts_to_units(0), 0.0);
    }
}
