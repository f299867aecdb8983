//! Alert flags and their wire packing.
//!
//! The pressure channel can be in exactly one band at a time, so it is
//! a tagged enum rather than independent booleans; the remaining flags
//! are independent. `pack`/`unpack` map the set onto the telemetry
//! alert byte.

/// Where the filtered pressure sits relative to its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressureBand {
    #[default]
    Normal,
    /// Below the low limit.
    Low,
    /// Above the critical high limit.
    High,
    /// Above the optimal band but not yet critical.
    Rising,
}

/// Active alert flags, as evaluated by the alarm monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertSet {
    pub pressure: PressureBand,
    pub temp1_low: bool,
    pub temp1_high: bool,
    pub temp2_low: bool,
    pub temp2_high: bool,
    pub resistance_high: bool,
}

const BIT_PRESSURE_LOW: u8 = 1 << 0;
const BIT_PRESSURE_HIGH: u8 = 1 << 1;
const BIT_PRESSURE_RISING: u8 = 1 << 2;
const BIT_TEMP1_LOW: u8 = 1 << 3;
const BIT_TEMP1_HIGH: u8 = 1 << 4;
const BIT_TEMP2_LOW: u8 = 1 << 5;
const BIT_TEMP2_HIGH: u8 = 1 << 6;
const BIT_RESISTANCE_HIGH: u8 = 1 << 7;

impl AlertSet {
    /// True when nothing is flagged.
    pub fn no_fault(&self) -> bool {
        *self == Self::default()
    }

    /// Pack into the telemetry alert byte. At most one pressure bit is
    /// ever set.
    pub fn pack(&self) -> u8 {
        let mut byte = 0u8;
        match self.pressure {
            PressureBand::Normal => {}
            PressureBand::Low => byte |= BIT_PRESSURE_LOW,
            PressureBand::High => byte |= BIT_PRESSURE_HIGH,
            PressureBand::Rising => byte |= BIT_PRESSURE_RISING,
        }
        if self.temp1_low {
            byte |= BIT_TEMP1_LOW;
        }
        if self.temp1_high {
            byte |= BIT_TEMP1_HIGH;
        }
        if self.temp2_low {
            byte |= BIT_TEMP2_LOW;
        }
        if self.temp2_high {
            byte |= BIT_TEMP2_HIGH;
        }
        if self.resistance_high {
            byte |= BIT_RESISTANCE_HIGH;
        }
        byte
    }

    /// Decode an alert byte; `None` when more than one pressure bit is
    /// set (no valid state produces that).
    pub fn unpack(byte: u8) -> Option<Self> {
        let pressure_bits = byte & (BIT_PRESSURE_LOW | BIT_PRESSURE_HIGH | BIT_PRESSURE_RISING);
        if pressure_bits.count_ones() > 1 {
            return None;
        }
        let pressure = match pressure_bits {
            0 => PressureBand::Normal,
            BIT_PRESSURE_LOW => PressureBand::Low,
            BIT_PRESSURE_HIGH => PressureBand::High,
            _ => PressureBand::Rising,
        };
        Some(Self {
            pressure,
            temp1_low: byte & BIT_TEMP1_LOW != 0,
            temp1_high: byte & BIT_TEMP1_HIGH != 0,
            temp2_low: byte & BIT_TEMP2_LOW != 0,
            temp2_high: byte & BIT_TEMP2_HIGH != 0,
            resistance_high: byte & BIT_RESISTANCE_HIGH != 0,
        })
    }
}
