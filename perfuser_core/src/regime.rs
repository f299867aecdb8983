//! Top-level operating regime and its transition rules.
//!
//! Exactly one regime is active at a time; it is the single source of
//! truth for which control policy runs each cycle. Transitions are
//! requested by commands, the bubble guard, or the alarm monitor; the
//! per-cycle pump policy dispatch lives in `ControlCore`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Regime {
    #[default]
    Stopped,
    /// Normal pressure regulation under PID.
    Hold,
    /// Fixed maximum-speed operation.
    Flush,
    /// Bounded purge window driven by the bubble guard.
    BubblePurge,
    /// Safety lockout; terminal until an external reset.
    Latched,
}

impl Regime {
    /// Wire code used in the telemetry status byte (low 3 bits).
    pub fn code(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Hold => 1,
            Self::Flush => 2,
            Self::BubblePurge => 3,
            Self::Latched => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Stopped),
            1 => Some(Self::Hold),
            2 => Some(Self::Flush),
            3 => Some(Self::BubblePurge),
            4 => Some(Self::Latched),
            _ => None,
        }
    }
}

/// Regime holder plus the small amount of per-regime dispatch state
/// (staged pump start, Flush first-entry priming).
#[derive(Debug, Default)]
pub struct RegimeStateMachine {
    regime: Regime,
    /// Speed already commanded for a two-phase start; the pump start
    /// frame goes out on the following control tick.
    staged_start: Option<f32>,
    /// Flush has commanded its fixed speed and started the pump.
    flush_primed: bool,
}

impl RegimeStateMachine {
    pub fn regime(&self) -> Regime {
        self.regime
    }

    /// Start request: `Stopped -> Hold`. Returns true when the
    /// transition happened (callers reset stabilization and the elapsed
    /// clock on it).
    pub fn request_start(&mut self) -> bool {
        if self.regime == Regime::Stopped {
            self.set(Regime::Hold);
            true
        } else {
            false
        }
    }

    /// Stop/pause request: `Hold -> Stopped`.
    pub fn request_stop(&mut self) -> bool {
        if self.regime == Regime::Hold {
            self.set(Regime::Stopped);
            true
        } else {
            false
        }
    }

    /// Flush toggle: `Stopped <-> Flush`.
    pub fn toggle_flush(&mut self) -> bool {
        match self.regime {
            Regime::Stopped => {
                self.set(Regime::Flush);
                true
            }
            Regime::Flush => {
                self.set(Regime::Stopped);
                true
            }
            _ => false,
        }
    }

    /// Bubble detected: any regime except the lockout yields to the
    /// purge.
    pub fn enter_purge(&mut self) {
        if self.regime == Regime::Latched {
            tracing::warn!("purge refused while latched");
            return;
        }
        self.set(Regime::BubblePurge);
    }

    /// Purge window elapsed: always back to Hold, whatever ran before.
    /// The lockout is terminal; a purge must not end it.
    pub fn finish_purge(&mut self) {
        if self.regime == Regime::Latched {
            return;
        }
        self.set(Regime::Hold);
    }

    /// Alarm recovery after a critically-high excursion.
    pub fn force_hold(&mut self) {
        self.set(Regime::Hold);
    }

    /// Escalation ceiling reached: terminal lockout.
    pub fn latch(&mut self) {
        self.set(Regime::Latched);
    }

    /// Direct regime selection from the command surface. Refused while
    /// latched (leaving the lockout is an external reset, not a
    /// command) and refused for selecting `Latched` or `BubblePurge`
    /// directly.
    pub fn select(&mut self, regime: Regime) -> bool {
        if self.regime == Regime::Latched {
            tracing::warn!(?regime, "regime change refused while latched");
            return false;
        }
        if matches!(regime, Regime::Latched | Regime::BubblePurge) {
            tracing::warn!(?regime, "regime not directly selectable");
            return false;
        }
        self.set(regime);
        true
    }

    fn set(&mut self, next: Regime) {
        if next != self.regime {
            tracing::info!(from = ?self.regime, to = ?next, "regime transition");
            self.regime = next;
        }
        // Dispatch state never survives a transition.
        self.staged_start = None;
        if next != Regime::Flush {
            self.flush_primed = false;
        }
    }

    pub fn staged_start(&self) -> Option<f32> {
        self.staged_start
    }

    pub fn stage_start(&mut self, speed: f32) {
        self.staged_start = Some(speed);
    }

    pub fn clear_staged_start(&mut self) {
        self.staged_start = None;
    }

    pub fn flush_primed(&self) -> bool {
        self.flush_primed
    }

    pub fn set_flush_primed(&mut self) {
        self.flush_primed = true;
    }
}
