//! # DR16 Receiver Protocol
//!
//! 18-byte frames at 100000 baud, 8E1, one frame every 14 ms. No checksum.
//!
//! ```text
//! Bytes 0-5   : ch0[0:10] ch1[11:21] ch2[22:32] ch3[33:43] s1[44:45] s2[46:47]
//! Bytes 6-11  : mouse x, y, z (i16 LE)
//! Byte  12    : left mouse button
//! Byte  13    : right mouse button
//! Bytes 14-15 : keyboard bitmask (u16 LE)
//! Bytes 16-17 : wheel (u16 LE)
//! ```
//!
//! ch0/ch1 are the right stick, ch2/ch3 the left stick; s1 is the right
//! switch and s2 the left switch.

use std::time::Duration;

use serde::Serialize;

use super::{bits, check_channel, normalize_channel, Keyboard, Mouse, RcProtocol, Sticks};
use crate::error::FrameError;
use crate::input::{ButtonTiming, Position, Switch};

/// DR16 frame size in bytes
pub const FRAME_LEN: usize = 18;
/// DR16 line rate
pub const BAUD_RATE: u32 = 100_000;

/// Three-position switch of the DR16 transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchPosition {
    Up,
    #[default]
    Mid,
    Down,
}

impl SwitchPosition {
    pub fn code(self) -> u8 {
        match self {
            SwitchPosition::Up => 1,
            SwitchPosition::Mid => 3,
            SwitchPosition::Down => 2,
        }
    }
}

impl Position for SwitchPosition {
    fn from_raw(code: u8) -> Option<Self> {
        match code {
            1 => Some(SwitchPosition::Up),
            3 => Some(SwitchPosition::Mid),
            2 => Some(SwitchPosition::Down),
            _ => None,
        }
    }
}

/// Validated DR16 frame fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dr16Frame {
    /// ch0..ch3, raw
    pub channels: [u16; 4],
    pub switch_r: SwitchPosition,
    pub switch_l: SwitchPosition,
    pub mouse: [i16; 3],
    pub press_l: u8,
    pub press_r: u8,
    pub key_code: u16,
    /// Raw wheel; 0 when the transmitter does not report it
    pub wheel: u16,
}

/// Decoded DR16 state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dr16Control {
    pub ch_lx: f32,
    pub ch_ly: f32,
    pub ch_rx: f32,
    pub ch_ry: f32,
    pub wheel: f32,
    pub switch_l: Switch<SwitchPosition>,
    pub switch_r: Switch<SwitchPosition>,
    pub mouse: Mouse,
    pub keyboard: Keyboard,
}

/// DR16 protocol marker.
#[derive(Debug, Clone, Copy)]
pub struct Dr16;

impl RcProtocol for Dr16 {
    const NAME: &'static str = "dr16";
    const FRAME_LEN: usize = FRAME_LEN;
    const PRIORITY: u8 = 1;
    const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

    type Frame = Dr16Frame;
    type Control = Dr16Control;

    fn decode(buf: &[u8]) -> Result<Dr16Frame, FrameError> {
        decode(buf)
    }

    fn apply(control: &mut Dr16Control, frame: &Dr16Frame, now_ms: u64, timing: &ButtonTiming) {
        control.ch_rx = normalize_channel(frame.channels[0]);
        control.ch_ry = normalize_channel(frame.channels[1]);
        control.ch_lx = normalize_channel(frame.channels[2]);
        control.ch_ly = normalize_channel(frame.channels[3]);
        control.wheel = if frame.wheel == 0 {
            0.0
        } else {
            normalize_channel(frame.wheel)
        };

        control.switch_r.update(frame.switch_r, now_ms);
        control.switch_l.update(frame.switch_l, now_ms);

        control.mouse.set_axes(frame.mouse);
        control.mouse.left.update(frame.press_l != 0, now_ms, timing);
        control.mouse.right.update(frame.press_r != 0, now_ms, timing);
        control.keyboard.update(frame.key_code, now_ms, timing);
    }

    fn sticks(control: &Dr16Control) -> Sticks {
        Sticks {
            lx: control.ch_lx,
            ly: control.ch_ly,
            rx: control.ch_rx,
            ry: control.ch_ry,
            wheel: control.wheel,
        }
    }
}

/// Decode and validate one DR16 frame
///
/// # Errors
///
/// Returns an error if:
/// - The buffer is not exactly 18 bytes
/// - A stick (or a reported wheel) is outside 364..=1684
/// - A switch carries a code that names no position
pub fn decode(buf: &[u8]) -> Result<Dr16Frame, FrameError> {
    let buf: &[u8; FRAME_LEN] = buf.try_into().map_err(|_| FrameError::Length {
        expected: FRAME_LEN,
        actual: buf.len(),
    })?;

    let mut word = [0u8; 8];
    word[..6].copy_from_slice(&buf[..6]);
    let word = u64::from_le_bytes(word);

    let channels = [
        check_channel("ch0", bits(word, 0, 11))?,
        check_channel("ch1", bits(word, 11, 11))?,
        check_channel("ch2", bits(word, 22, 11))?,
        check_channel("ch3", bits(word, 33, 11))?,
    ];

    let switch_r = switch(word, 44, "s1")?;
    let switch_l = switch(word, 46, "s2")?;

    let wheel = u16::from_le_bytes([buf[16], buf[17]]);
    if wheel != 0 {
        check_channel("wheel", wheel)?;
    }

    Ok(Dr16Frame {
        channels,
        switch_r,
        switch_l,
        mouse: [
            i16::from_le_bytes([buf[6], buf[7]]),
            i16::from_le_bytes([buf[8], buf[9]]),
            i16::from_le_bytes([buf[10], buf[11]]),
        ],
        press_l: buf[12],
        press_r: buf[13],
        key_code: u16::from_le_bytes([buf[14], buf[15]]),
        wheel,
    })
}

fn switch(word: u64, offset: u32, name: &'static str) -> Result<SwitchPosition, FrameError> {
    let code = bits(word, offset, 2) as u8;
    SwitchPosition::from_raw(code).ok_or(FrameError::SwitchCode { name, code })
}

/// Pack a frame into its wire form
///
/// Channel values are masked to 11 bits.
pub fn encode(frame: &Dr16Frame) -> [u8; FRAME_LEN] {
    let mut word = 0u64;
    for (i, &ch) in frame.channels.iter().enumerate() {
        word |= u64::from(ch & 0x7FF) << (11 * i);
    }
    word |= u64::from(frame.switch_r.code()) << 44;
    word |= u64::from(frame.switch_l.code()) << 46;

    let mut buf = [0u8; FRAME_LEN];
    buf[..6].copy_from_slice(&word.to_le_bytes()[..6]);
    buf[6..8].copy_from_slice(&frame.mouse[0].to_le_bytes());
    buf[8..10].copy_from_slice(&frame.mouse[1].to_le_bytes());
    buf[10..12].copy_from_slice(&frame.mouse[2].to_le_bytes());
    buf[12] = frame.press_l;
    buf[13] = frame.press_r;
    buf[14..16].copy_from_slice(&frame.key_code.to_le_bytes());
    buf[16..18].copy_from_slice(&frame.wheel.to_le_bytes());
    buf
}
