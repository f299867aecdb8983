//! Bounded purge window for a detected air bubble.
//!
//! The guard only tracks the window; closing the isolation valve,
//! switching the regime and driving the pump at purge speed are the
//! control core's job. A detection while already purging restarts the
//! window from zero.

use crate::config::PurgeCfg;

#[derive(Debug)]
pub struct BubbleGuard {
    duration_secs: u32,
    secs: u32,
    purging: bool,
}

impl BubbleGuard {
    pub fn new(cfg: &PurgeCfg) -> Self {
        Self {
            duration_secs: cfg.duration_secs,
            secs: 0,
            purging: false,
        }
    }

    pub fn purging(&self) -> bool {
        self.purging
    }

    /// Begin (or restart) the purge window.
    pub fn start(&mut self) {
        if self.purging {
            tracing::warn!(elapsed_secs = self.secs, "purge restarted from zero");
        } else {
            tracing::warn!("bubble detected, purge started");
        }
        self.secs = 0;
        self.purging = true;
    }

    pub fn stop(&mut self) {
        self.secs = 0;
        self.purging = false;
    }

    /// 1 Hz tick. Returns true exactly once, when the window elapses;
    /// the guard stops itself on completion.
    pub fn tick(&mut self) -> bool {
        if !self.purging {
            return false;
        }
        self.secs = self.secs.saturating_add(1);
        if self.secs >= self.duration_secs {
            tracing::info!(duration_secs = self.duration_secs, "purge window elapsed");
            self.stop();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> BubbleGuard {
        BubbleGuard::new(&PurgeCfg { duration_secs: 60 })
    }

    #[test]
    fn window_elapses_after_the_configured_duration() {
        let mut g = guard();
        g.start();
        for _ in 0..59 {
            assert!(!g.tick());
        }
        assert!(g.tick());
        assert!(!g.purging());
    }

    #[test]
    fn ticks_are_inert_while_idle() {
        let mut g = guard();
        assert!(!g.tick());
        assert!(!g.purging());
    }

    #[test]
    fn restart_while_purging_resets_the_window() {
        let mut g = guard();
        g.start();
        for _ in 0..40 {
            assert!(!g.tick());
        }
        g.start();
        // A full window is needed again after the restart.
        for _ in 0..59 {
            assert!(!g.tick());
        }
        assert!(g.tick());
    }
}
