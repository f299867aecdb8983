//! Pressure sampling pipeline: trimmed-mean window plus exponential
//! smoothing.
//!
//! Raw readings arrive one per sampling tick; every tenth reading closes
//! the window and produces exactly one smoothed value for the control
//! cycle. Sorting the window and averaging only its middle band
//! suppresses transient spikes (bubbles, electrical noise) before the
//! EMA stage.

/// Samples accumulated per window. Fixed so memory and sort cost stay
/// bounded.
pub const WINDOW: usize = 10;

/// Band of the sorted window that survives trimming: `sorted[4..9]`.
const BAND_LO: usize = 4;
const BAND_HI: usize = 9;

#[derive(Debug, Clone)]
pub struct PressureFilter {
    window: [f32; WINDOW],
    len: usize,
    smoothed: f32,
    k: f32,
}

impl PressureFilter {
    /// `k` is the exponential smoothing factor; `initial` seeds the
    /// smoothed state (the bench uses 1.0, the power-on sensor reading).
    pub fn new(k: f32, initial: f32) -> Self {
        Self {
            window: [0.0; WINDOW],
            len: 0,
            smoothed: initial,
            k,
        }
    }

    /// Feed one tare-corrected reading.
    ///
    /// Returns the new smoothed value when this reading completes the
    /// window, `None` otherwise; callers must not advance control logic
    /// on a partial window. When `link_busy` is set at window completion
    /// the compute step is skipped but the window still resets, so the
    /// pipeline never stalls while the host link is mid-transmission.
    pub fn sample(&mut self, corrected: f32, link_busy: bool) -> Option<f32> {
        self.window[self.len] = corrected;
        self.len += 1;
        if self.len < WINDOW {
            return None;
        }

        // Window closed: reset unconditionally before deciding whether
        // to compute, so a busy link cannot wedge the pipeline.
        self.len = 0;
        if link_busy {
            return None;
        }

        let mut sorted = self.window;
        sorted.sort_unstable_by(f32::total_cmp);
        let band = &sorted[BAND_LO..BAND_HI];
        let avg = band.iter().sum::<f32>() / band.len() as f32;

        self.smoothed += (avg - self.smoothed) * self.k;
        Some(self.smoothed)
    }

    /// Last computed smoothed value.
    pub fn value(&self) -> f32 {
        self.smoothed
    }

    /// Samples currently accumulated in the open window.
    pub fn pending(&self) -> usize {
        self.len
    }
}

impl Default for PressureFilter {
    fn default() -> Self {
        Self::new(0.2, 1.0)
    }
}
