//! Inbound command surface.
//!
//! Commands arrive from the host-link CLI collaborator already parsed;
//! each maps to one mutation on the control core. Delivery is over the
//! supervisor's event channel so a single owner applies them.

use crate::protocol::RotateDirection;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Start,
    Pause,
    Stop,
    /// Direct regime selection by wire code.
    Regime(u8),
    SetSpeed(f32),
    SetRotateDirection(RotateDirection),
    /// Record the current reading as the zero offset.
    TarePressure,
    SetPerfusionRatio(f32),
    SetTargetPressure(f32),
    /// Test hook: behave exactly as if the bubble sensor fired.
    EmulateBubble,
    SetTempLowLimit(f32),
    SetTempHighLimit(f32),
    SetP(f32),
    SetI(f32),
    SetD(f32),
    /// Toggle which kidney the circuit is plumbed to.
    ToggleKidneySide,
    /// Toggle the operator block flag (freezes command handling).
    ToggleBlock,
}
