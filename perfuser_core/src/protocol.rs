//! Modbus RTU framing for the pump drive.
//!
//! Register map (device id 1 by default):
//! - 1000: pump on/off, write single register, 0/1
//! - 1001: rotate direction, write single register, 0/1
//! - 1002..=1003: commanded speed as an IEEE-754 f32 split into two
//!   16-bit words; the low word carries float bytes 2-3, the high word
//!   bytes 0-1 (little-endian packing per word)
//!
//! A reply echoes the written register value (the register count for a
//! multi-register write) at byte offset 4-5.

pub const REG_STATE: u16 = 1000;
pub const REG_DIRECTION: u16 = 1001;
pub const REG_SPEED: u16 = 1002;
/// Registers occupied by the speed float.
pub const SPEED_REG_COUNT: u16 = 2;

pub const FC_WRITE_SINGLE: u8 = 0x06;
pub const FC_WRITE_MULTIPLE: u8 = 0x10;

/// Byte offset of the echoed value in a reply frame.
pub const ECHO_OFFSET: usize = 4;
/// Both reply shapes we accept are exactly this long.
pub const REPLY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    CounterClockwise,
    Clockwise,
}

impl RotateDirection {
    pub fn register_value(self) -> u16 {
        match self {
            Self::CounterClockwise => 0,
            Self::Clockwise => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpCommand {
    Start,
    Stop,
    SetSpeed(f32),
    SetDirection(RotateDirection),
}

/// Command classification used for the per-kind acknowledgement flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Stop,
    Speed,
    Direction,
}

impl PumpCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Start => CommandKind::Start,
            Self::Stop => CommandKind::Stop,
            Self::SetSpeed(_) => CommandKind::Speed,
            Self::SetDirection(_) => CommandKind::Direction,
        }
    }

    /// Value a confirming reply must echo at `ECHO_OFFSET`.
    ///
    /// Single-register writes echo the written value; the multi-register
    /// speed write echoes the register count.
    pub fn expected_echo(&self) -> u16 {
        match self {
            Self::Start => 1,
            Self::Stop => 0,
            Self::SetSpeed(_) => SPEED_REG_COUNT,
            Self::SetDirection(d) => d.register_value(),
        }
    }
}

/// Split a speed value into the drive's two-word register layout.
pub fn speed_words(speed: f32) -> [u16; 2] {
    let b = speed.to_le_bytes();
    [
        u16::from(b[2]) | (u16::from(b[3]) << 8),
        u16::from(b[0]) | (u16::from(b[1]) << 8),
    ]
}

/// Reassemble a speed value from the two-word register layout.
pub fn words_to_speed(words: [u16; 2]) -> f32 {
    let lo = words[0].to_le_bytes();
    let hi = words[1].to_le_bytes();
    f32::from_le_bytes([hi[0], hi[1], lo[0], lo[1]])
}

/// CRC-16/MODBUS over a frame body (poly 0xA001, init 0xFFFF).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

fn push_u16(frame: &mut Vec<u8>, v: u16) {
    frame.extend_from_slice(&v.to_be_bytes());
}

fn finish(mut frame: Vec<u8>) -> Vec<u8> {
    let crc = crc16(&frame);
    // CRC travels low byte first, unlike the big-endian register fields.
    frame.push((crc & 0xFF) as u8);
    frame.push((crc >> 8) as u8);
    frame
}

/// Encode one outbound request frame for the given command.
pub fn encode_request(device_id: u8, cmd: &PumpCommand) -> Vec<u8> {
    match cmd {
        PumpCommand::Start | PumpCommand::Stop => {
            write_single(device_id, REG_STATE, cmd.expected_echo())
        }
        PumpCommand::SetDirection(d) => write_single(device_id, REG_DIRECTION, d.register_value()),
        PumpCommand::SetSpeed(speed) => {
            let words = speed_words(*speed);
            let mut frame = Vec::with_capacity(13);
            frame.push(device_id);
            frame.push(FC_WRITE_MULTIPLE);
            push_u16(&mut frame, REG_SPEED);
            push_u16(&mut frame, SPEED_REG_COUNT);
            frame.push((SPEED_REG_COUNT * 2) as u8);
            push_u16(&mut frame, words[0]);
            push_u16(&mut frame, words[1]);
            finish(frame)
        }
    }
}

fn write_single(device_id: u8, register: u16, value: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(device_id);
    frame.push(FC_WRITE_SINGLE);
    push_u16(&mut frame, register);
    push_u16(&mut frame, value);
    finish(frame)
}

/// Build the confirming reply the drive sends for a request frame.
/// Single writes are echoed verbatim; multi writes echo the header and
/// register count. Used by link mocks.
pub fn echo_reply_for(request: &[u8]) -> Vec<u8> {
    if request.len() >= 2 && request[1] == FC_WRITE_MULTIPLE && request.len() >= 6 {
        finish(request[..6].to_vec())
    } else {
        request.to_vec()
    }
}

/// Validate a reply frame and extract the echoed value.
///
/// Returns `None` for frames from another device, short frames, or a
/// CRC mismatch; those count as "no valid reply" for retry purposes.
pub fn reply_echo(frame: &[u8], device_id: u8) -> Option<u16> {
    if frame.len() < REPLY_LEN {
        return None;
    }
    let frame = &frame[..REPLY_LEN];
    if frame[0] != device_id {
        return None;
    }
    let body = &frame[..REPLY_LEN - 2];
    let crc = u16::from(frame[REPLY_LEN - 2]) | (u16::from(frame[REPLY_LEN - 1]) << 8);
    if crc16(body) != crc {
        return None;
    }
    Some(u16::from_be_bytes([frame[ECHO_OFFSET], frame[ECHO_OFFSET + 1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_matches_reference_vectors() {
        // CRC-16/MODBUS check value.
        assert_eq!(crc16(b"123456789"), 0x4B37);
        // Classic request example: 01 04 00 00 00 02 -> wire bytes 71 CB.
        assert_eq!(crc16(&[0x01, 0x04, 0x00, 0x00, 0x00, 0x02]), 0xCB71);
    }

    #[test]
    fn start_frame_writes_one_to_state_register() {
        let f = encode_request(1, &PumpCommand::Start);
        assert_eq!(f.len(), 8);
        assert_eq!(&f[..6], &[0x01, 0x06, 0x03, 0xE8, 0x00, 0x01]);
        let crc = crc16(&f[..6]);
        assert_eq!(f[6], (crc & 0xFF) as u8);
        assert_eq!(f[7], (crc >> 8) as u8);
    }

    #[test]
    fn stop_frame_writes_zero_to_state_register() {
        let f = encode_request(1, &PumpCommand::Stop);
        assert_eq!(&f[..6], &[0x01, 0x06, 0x03, 0xE8, 0x00, 0x00]);
    }

    #[test]
    fn direction_frame_targets_direction_register() {
        let f = encode_request(
            1,
            &PumpCommand::SetDirection(RotateDirection::Clockwise),
        );
        assert_eq!(&f[..6], &[0x01, 0x06, 0x03, 0xE9, 0x00, 0x01]);
    }

    #[test]
    fn speed_frame_splits_float_into_documented_word_order() {
        // 42.5f32 = 0x422A0000; low word = bytes 2-3 = 0x422A,
        // high word = bytes 0-1 = 0x0000.
        assert_eq!(speed_words(42.5), [0x422A, 0x0000]);

        let f = encode_request(1, &PumpCommand::SetSpeed(42.5));
        assert_eq!(f.len(), 13);
        // id, fct 0x10, addr 1002, qty 2, byte count 4
        assert_eq!(&f[..7], &[0x01, 0x10, 0x03, 0xEA, 0x00, 0x02, 0x04]);
        assert_eq!(&f[7..11], &[0x42, 0x2A, 0x00, 0x00]);
    }

    #[test]
    fn speed_words_round_trip() {
        for v in [0.0_f32, 1.0, 10.0, 42.5, 99.9, 100.0] {
            assert_eq!(words_to_speed(speed_words(v)), v);
        }
    }

    #[test]
    fn reply_echo_extracts_value_at_offset_four() {
        // A write-single reply echoes the request frame.
        let f = encode_request(1, &PumpCommand::Start);
        assert_eq!(reply_echo(&f, 1), Some(1));
    }

    #[test]
    fn multi_write_echo_reply_carries_register_count() {
        let req = encode_request(1, &PumpCommand::SetSpeed(42.5));
        let reply = echo_reply_for(&req);
        assert_eq!(reply.len(), REPLY_LEN);
        assert_eq!(reply_echo(&reply, 1), Some(SPEED_REG_COUNT));
    }

    #[test]
    fn reply_echo_rejects_wrong_device_short_frame_and_bad_crc() {
        let f = encode_request(1, &PumpCommand::Start);
        assert_eq!(reply_echo(&f, 2), None);
        assert_eq!(reply_echo(&f[..5], 1), None);

        let mut corrupted = f.clone();
        corrupted[4] ^= 0xFF;
        assert_eq!(reply_echo(&corrupted, 1), None);
    }
}
