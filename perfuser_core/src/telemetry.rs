//! Fixed-size telemetry record for the host link.
//!
//! Layout, little-endian floats:
//!
//! | bytes  | field                              |
//! |--------|------------------------------------|
//! | 0..4   | flow estimate (ml/min)             |
//! | 4..8   | filtered pressure                  |
//! | 8..12  | temperature 1 (C)                  |
//! | 12..16 | temperature 2 (C)                  |
//! | 16..19 | elapsed time h/m/s                 |
//! | 19     | status byte (regime, side, block)  |
//! | 20     | alert byte                         |
//! | 21     | peripheral health byte             |
//! | 22..26 | target pressure                    |
//! | 26     | terminator `0x0A`                  |

use crate::alert::AlertSet;
use crate::regime::Regime;

pub const RECORD_LEN: usize = 27;
pub const RECORD_TERMINATOR: u8 = 0x0A;

const STATUS_REGIME_MASK: u8 = 0b0000_0111;
const STATUS_SIDE_BIT: u8 = 1 << 3;
const STATUS_BLOCKED_BIT: u8 = 1 << 4;

/// Which kidney the circuit is plumbed to; toggled by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KidneySide {
    #[default]
    Left,
    Right,
}

/// Wall-clock style run counter, ticked at 1 Hz while regulating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElapsedTime {
    pub hours: u8,
    pub mins: u8,
    pub secs: u8,
}

impl ElapsedTime {
    pub fn tick(&mut self) {
        self.secs += 1;
        if self.secs == 60 {
            self.secs = 0;
            self.mins += 1;
        }
        if self.mins == 60 {
            self.mins = 0;
            self.hours = self.hours.wrapping_add(1);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Peripheral liveness flags; a set bit means the peripheral responded
/// within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthBits {
    pub pump: bool,
    pub pressure_sensor: bool,
    pub temp1: bool,
    pub temp2: bool,
}

impl Default for HealthBits {
    fn default() -> Self {
        Self {
            pump: true,
            pressure_sensor: true,
            temp1: true,
            temp2: true,
        }
    }
}

impl HealthBits {
    pub fn pack(&self) -> u8 {
        u8::from(self.pump)
            | u8::from(self.pressure_sensor) << 1
            | u8::from(self.temp1) << 2
            | u8::from(self.temp2) << 3
    }

    pub fn unpack(byte: u8) -> Self {
        Self {
            pump: byte & 1 != 0,
            pressure_sensor: byte & (1 << 1) != 0,
            temp1: byte & (1 << 2) != 0,
            temp2: byte & (1 << 3) != 0,
        }
    }
}

/// Pack regime, kidney side and the operator block flag into the status
/// byte.
pub fn pack_status(regime: Regime, side: KidneySide, blocked: bool) -> u8 {
    let mut byte = regime.code();
    if side == KidneySide::Right {
        byte |= STATUS_SIDE_BIT;
    }
    if blocked {
        byte |= STATUS_BLOCKED_BIT;
    }
    byte
}

/// Decode a status byte; `None` for an out-of-range regime code.
pub fn unpack_status(byte: u8) -> Option<(Regime, KidneySide, bool)> {
    let regime = Regime::from_code(byte & STATUS_REGIME_MASK)?;
    let side = if byte & STATUS_SIDE_BIT != 0 {
        KidneySide::Right
    } else {
        KidneySide::Left
    };
    Some((regime, side, byte & STATUS_BLOCKED_BIT != 0))
}

/// One snapshot of everything the host link reports.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryRecord {
    pub flow: f32,
    pub pressure: f32,
    pub temp1: f32,
    pub temp2: f32,
    pub elapsed: ElapsedTime,
    pub regime: Regime,
    pub side: KidneySide,
    pub blocked: bool,
    pub alerts: AlertSet,
    pub health: HealthBits,
    pub target: f32,
}

impl TelemetryRecord {
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0..4].copy_from_slice(&self.flow.to_le_bytes());
        out[4..8].copy_from_slice(&self.pressure.to_le_bytes());
        out[8..12].copy_from_slice(&self.temp1.to_le_bytes());
        out[12..16].copy_from_slice(&self.temp2.to_le_bytes());
        out[16] = self.elapsed.hours;
        out[17] = self.elapsed.mins;
        out[18] = self.elapsed.secs;
        out[19] = pack_status(self.regime, self.side, self.blocked);
        out[20] = self.alerts.pack();
        out[21] = self.health.pack();
        out[22..26].copy_from_slice(&self.target.to_le_bytes());
        out[26] = RECORD_TERMINATOR;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::PressureBand;

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            flow: 25.2,
            pressure: 29.4,
            temp1: 6.0,
            temp2: 6.5,
            elapsed: ElapsedTime {
                hours: 1,
                mins: 2,
                secs: 3,
            },
            regime: Regime::Hold,
            side: KidneySide::Right,
            blocked: false,
            alerts: AlertSet::default(),
            health: HealthBits::default(),
            target: 29.0,
        }
    }

    #[test]
    fn encoded_record_has_fixed_length_and_terminator() {
        let bytes = record().encode();
        assert_eq!(bytes.len(), RECORD_LEN);
        assert_eq!(bytes[26], RECORD_TERMINATOR);
    }

    #[test]
    fn float_fields_are_little_endian_at_documented_offsets() {
        let bytes = record().encode();
        assert_eq!(f32::from_le_bytes(bytes[4..8].try_into().unwrap()), 29.4);
        assert_eq!(f32::from_le_bytes(bytes[22..26].try_into().unwrap()), 29.0);
        assert_eq!(&bytes[16..19], &[1, 2, 3]);
    }

    #[test]
    fn status_byte_round_trips_for_all_reachable_combinations() {
        for regime in [
            Regime::Stopped,
            Regime::Hold,
            Regime::Flush,
            Regime::BubblePurge,
            Regime::Latched,
        ] {
            for side in [KidneySide::Left, KidneySide::Right] {
                for blocked in [false, true] {
                    let byte = pack_status(regime, side, blocked);
                    assert_eq!(unpack_status(byte), Some((regime, side, blocked)));
                }
            }
        }
    }

    #[test]
    fn status_byte_rejects_invalid_regime_codes() {
        assert_eq!(unpack_status(0b0000_0101), None);
        assert_eq!(unpack_status(0b0000_0111), None);
    }

    #[test]
    fn alert_byte_in_record_matches_alert_set() {
        let mut r = record();
        r.alerts.pressure = PressureBand::Low;
        r.alerts.temp2_high = true;
        let bytes = r.encode();
        assert_eq!(AlertSet::unpack(bytes[20]), Some(r.alerts));
    }

    #[test]
    fn health_bits_round_trip() {
        let h = HealthBits {
            pump: false,
            pressure_sensor: true,
            temp1: false,
            temp2: true,
        };
        assert_eq!(HealthBits::unpack(h.pack()), h);
    }

    #[test]
    fn elapsed_time_carries_minutes_and_hours() {
        let mut t = ElapsedTime {
            hours: 0,
            mins: 59,
            secs: 59,
        };
        t.tick();
        assert_eq!(
            t,
            ElapsedTime {
                hours: 1,
                mins: 0,
                secs: 0
            }
        );
    }
}
