//! # VT03 Receiver Protocol
//!
//! 21-byte frames at 921600 baud, 8N1, protected by a CRC16 over the whole
//! frame.
//!
//! ```text
//! Bytes 0-1   : magic 0xA9 0x53
//! Bytes 2-9   : ch0[0:10] ch1[11:21] ch2[22:32] ch3[33:43] gear[44:45]
//!               pause[46] fn_l[47] fn_r[48] wheel[49:59] trigger[60]
//! Bytes 10-15 : mouse x, y, z (i16 LE)
//! Byte  16    : press_l[0:1] press_r[2:3] press_m[4:5]
//! Bytes 17-18 : keyboard bitmask (u16 LE)
//! Bytes 19-20 : CRC16 (LE)
//! ```

use std::time::Duration;

use serde::Serialize;

use super::{bits, check_channel, normalize_channel, Keyboard, Mouse, RcProtocol, Sticks};
use crate::crc::{append_crc16, verify_crc16};
use crate::error::FrameError;
use crate::input::{Button, ButtonTiming, Position, Switch};

/// VT03 frame size in bytes
pub const FRAME_LEN: usize = 21;
/// VT03 line rate
pub const BAUD_RATE: u32 = 921_600;
/// Frame prefix
pub const MAGIC: [u8; 2] = [0xA9, 0x53];

/// Three-position gear lever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GearPosition {
    Left,
    #[default]
    Mid,
    Right,
}

impl GearPosition {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl Position for GearPosition {
    fn from_raw(code: u8) -> Option<Self> {
        match code {
            0 => Some(GearPosition::Left),
            1 => Some(GearPosition::Mid),
            2 => Some(GearPosition::Right),
            _ => None,
        }
    }
}

/// Validated VT03 frame fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vt03Frame {
    pub channels: [u16; 4],
    pub gear: GearPosition,
    pub pause: bool,
    pub fn_l: bool,
    pub fn_r: bool,
    pub wheel: u16,
    pub trigger: bool,
    pub mouse: [i16; 3],
    /// 2-bit mouse button fields, asserted when non-zero
    pub press_l: u8,
    pub press_r: u8,
    pub press_m: u8,
    pub key_code: u16,
}

/// Decoded VT03 state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vt03Control {
    pub ch_lx: f32,
    pub ch_ly: f32,
    pub ch_rx: f32,
    pub ch_ry: f32,
    pub wheel: f32,
    pub gear: Switch<GearPosition>,
    pub fn_l: Button,
    pub fn_r: Button,
    pub pause: Button,
    pub trigger: Button,
    pub mouse: Mouse,
    pub keyboard: Keyboard,
}

/// VT03 protocol marker.
#[derive(Debug, Clone, Copy)]
pub struct Vt03;

impl RcProtocol for Vt03 {
    const NAME: &'static str = "vt03";
    const FRAME_LEN: usize = FRAME_LEN;
    const PRIORITY: u8 = 0;
    const DEFAULT_TIMEOUT: Duration = Duration::from_millis(120);

    type Frame = Vt03Frame;
    type Control = Vt03Control;

    fn admits(buf: &[u8]) -> bool {
        buf.len() == FRAME_LEN && buf[..2] == MAGIC
    }

    fn decode(buf: &[u8]) -> Result<Vt03Frame, FrameError> {
        decode(buf)
    }

    fn apply(control: &mut Vt03Control, frame: &Vt03Frame, now_ms: u64, timing: &ButtonTiming) {
        control.ch_rx = normalize_channel(frame.channels[0]);
        control.ch_ry = normalize_channel(frame.channels[1]);
        control.ch_lx = normalize_channel(frame.channels[2]);
        control.ch_ly = normalize_channel(frame.channels[3]);
        control.wheel = normalize_channel(frame.wheel);

        control.gear.update(frame.gear, now_ms);
        control.fn_l.update(frame.fn_l, now_ms, timing);
        control.fn_r.update(frame.fn_r, now_ms, timing);
        control.pause.update(frame.pause, now_ms, timing);
        control.trigger.update(frame.trigger, now_ms, timing);

        control.mouse.set_axes(frame.mouse);
        control.mouse.left.update(frame.press_l != 0, now_ms, timing);
        control.mouse.right.update(frame.press_r != 0, now_ms, timing);
        control.mouse.middle.update(frame.press_m != 0, now_ms, timing);
        control.keyboard.update(frame.key_code, now_ms, timing);
    }

    fn sticks(control: &Vt03Control) -> Sticks {
        Sticks {
            lx: control.ch_lx,
            ly: control.ch_ly,
            rx: control.ch_rx,
            ry: control.ch_ry,
            wheel: control.wheel,
        }
    }
}

/// Decode and validate one VT03 frame
///
/// # Errors
///
/// Returns an error if:
/// - The buffer is not exactly 21 bytes or lacks the magic prefix
/// - A stick or the wheel is outside 364..=1684
/// - The CRC16 does not match
/// - The gear field carries code 3
pub fn decode(buf: &[u8]) -> Result<Vt03Frame, FrameError> {
    let buf: &[u8; FRAME_LEN] = buf.try_into().map_err(|_| FrameError::Length {
        expected: FRAME_LEN,
        actual: buf.len(),
    })?;

    if buf[..2] != MAGIC {
        return Err(FrameError::Magic(buf[0], buf[1]));
    }

    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[2..10]);
    let word = u64::from_le_bytes(word);

    let channels = [
        check_channel("ch0", bits(word, 0, 11))?,
        check_channel("ch1", bits(word, 11, 11))?,
        check_channel("ch2", bits(word, 22, 11))?,
        check_channel("ch3", bits(word, 33, 11))?,
    ];
    let wheel = check_channel("wheel", bits(word, 49, 11))?;

    if !verify_crc16(buf) {
        return Err(FrameError::Crc);
    }

    let gear_code = bits(word, 44, 2) as u8;
    let gear = GearPosition::from_raw(gear_code).ok_or(FrameError::SwitchCode {
        name: "gear",
        code: gear_code,
    })?;

    let press = buf[16];

    Ok(Vt03Frame {
        channels,
        gear,
        pause: bits(word, 46, 1) != 0,
        fn_l: bits(word, 47, 1) != 0,
        fn_r: bits(word, 48, 1) != 0,
        wheel,
        trigger: bits(word, 60, 1) != 0,
        mouse: [
            i16::from_le_bytes([buf[10], buf[11]]),
            i16::from_le_bytes([buf[12], buf[13]]),
            i16::from_le_bytes([buf[14], buf[15]]),
        ],
        press_l: press & 0x03,
        press_r: (press >> 2) & 0x03,
        press_m: (press >> 4) & 0x03,
        key_code: u16::from_le_bytes([buf[17], buf[18]]),
    })
}

/// Pack a frame into its wire form, CRC included
pub fn encode(frame: &Vt03Frame) -> [u8; FRAME_LEN] {
    let mut word = 0u64;
    for (i, &ch) in frame.channels.iter().enumerate() {
        word |= u64::from(ch & 0x7FF) << (11 * i);
    }
    word |= u64::from(frame.gear.code()) << 44;
    word |= u64::from(frame.pause) << 46;
    word |= u64::from(frame.fn_l) << 47;
    word |= u64::from(frame.fn_r) << 48;
    word |= u64::from(frame.wheel & 0x7FF) << 49;
    word |= u64::from(frame.trigger) << 60;

    let mut buf = [0u8; FRAME_LEN];
    buf[..2].copy_from_slice(&MAGIC);
    buf[2..10].copy_from_slice(&word.to_le_bytes());
    buf[10..12].copy_from_slice(&frame.mouse[0].to_le_bytes());
    buf[12..14].copy_from_slice(&frame.mouse[1].to_le_bytes());
    buf[14..16].copy_from_slice(&frame.mouse[2].to_le_bytes());
    buf[16] = (frame.press_l & 0x03) | (frame.press_r & 0x03) << 2 | (frame.press_m & 0x03) << 4;
    buf[17..19].copy_from_slice(&frame.key_code.to_le_bytes());
    append_crc16(&mut buf);
    buf
}
