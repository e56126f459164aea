//! # Referee Frame Encoder
//!
//! Builds outbound frames with the same header and CRC layout the link uses
//! inbound.

use bytes::{BufMut, Bytes, BytesMut};

use super::protocol::{
    FRAME_OVERHEAD, HEADER_SIZE, INTERACTION_HEADER_SIZE, MAX_INTERACTION_DATA, MAX_PAYLOAD_LEN, SOF,
};
use crate::crc::{append_crc16, append_crc8};
use crate::error::FrameError;

/// Encode a complete referee frame
///
/// # Arguments
///
/// * `seq` - Sequence number of this frame
/// * `cmd_id` - Command identifier
/// * `payload` - Command payload (at most 247 bytes)
///
/// # Returns
///
/// * `Result<Bytes, FrameError>` - Header, command id, payload and CRC16
///
/// # Errors
///
/// Returns `FrameError::PayloadTooLarge` if the frame would exceed 256 bytes
///
/// # Examples
///
/// ```
/// use arena_link::referee::encoder::encode_frame;
///
/// let frame = encode_frame(0, 0x0002, &[1]).unwrap();
/// assert_eq!(frame.len(), 10);
/// assert_eq!(frame[0], 0xA5);
/// ```
pub fn encode_frame(seq: u8, cmd_id: u16, payload: &[u8]) -> Result<Bytes, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut frame = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    frame.put_u8(SOF);
    frame.put_u16_le(payload.len() as u16);
    frame.put_u8(seq);
    frame.put_u8(0);
    append_crc8(&mut frame[..HEADER_SIZE]);

    frame.put_u16_le(cmd_id);
    frame.put_slice(payload);
    frame.put_u16_le(0);
    append_crc16(&mut frame);

    Ok(frame.freeze())
}

/// Build an interaction payload: sub-command, sender and receiver ids
/// followed by user data
///
/// # Errors
///
/// Returns `FrameError::PayloadTooLarge` if `data` exceeds 112 bytes
pub fn encode_interaction(sub_cmd_id: u16, sender_id: u16, receiver_id: u16, data: &[u8]) -> Result<Bytes, FrameError> {
    if data.len() > MAX_INTERACTION_DATA {
        return Err(FrameError::PayloadTooLarge {
            len: data.len(),
            max: MAX_INTERACTION_DATA,
        });
    }

    let mut payload = BytesMut::with_capacity(INTERACTION_HEADER_SIZE + data.len());
    payload.put_u16_le(sub_cmd_id);
    payload.put_u16_le(sender_id);
    payload.put_u16_le(receiver_id);
    payload.put_slice(data);

    Ok(payload.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::{crc8, verify_crc16, verify_crc8};

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(7, 0x0301, &[0xAA, 0xBB, 0xCC]).unwrap();

        assert_eq!(frame.len(), 12);
        assert_eq!(&frame[..4], &[0xA5, 0x03, 0x00, 0x07]);
        assert_eq!(frame[4], crc8(&frame[..4]));
        assert_eq!(&frame[5..7], &[0x01, 0x03]);
        assert_eq!(&frame[7..10], &[0xAA, 0xBB, 0xCC]);
        assert!(verify_crc8(&frame[..HEADER_SIZE]));
        assert!(verify_crc16(&frame));
    }

    #[test]
    fn test_largest_payload_fills_max_frame() {
        let frame = encode_frame(0, 0x0301, &[0; MAX_PAYLOAD_LEN]).unwrap();
        assert_eq!(frame.len(), 256);

        assert_eq!(
            encode_frame(0, 0x0301, &[0; MAX_PAYLOAD_LEN + 1]),
            Err(FrameError::PayloadTooLarge { len: 248, max: 247 })
        );
    }

    #[test]
    fn test_interaction_header() {
        let payload = encode_interaction(0x0201, 3, 4, &[9, 8]).unwrap();
        assert_eq!(payload.as_ref(), &[0x01, 0x02, 3, 0, 4, 0, 9, 8]);

        assert!(encode_interaction(0x0201, 3, 4, &[0; 112]).is_ok());
        assert_eq!(
            encode_interaction(0x0201, 3, 4, &[0; 113]),
            Err(FrameError::PayloadTooLarge { len: 113, max: 112 })
        );
    }
}
