//! # CRC8 / CRC16 Implementation
//!
//! Checksums used by the referee-system link and the CRC-protected radio
//! frame.
//!
//! **CRC8**: reflected polynomial 0x31 (table poly 0x8C), initial value 0xFF.
//! **CRC16**: reflected polynomial 0x1021 (table poly 0x8408), initial value
//! 0xFFFF, no final XOR (CRC-16/MCRF4XX). Stored little-endian.

/// Reflected CRC8 polynomial
const CRC8_POLY: u8 = 0x8C;

/// Reflected CRC16 polynomial
const CRC16_POLY: u16 = 0x8408;

/// CRC8 initial value
pub const CRC8_INIT: u8 = 0xFF;

/// CRC16 initial value
pub const CRC16_INIT: u16 = 0xFFFF;

/// Precomputed CRC8 lookup table
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Precomputed CRC16 lookup table
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x01) != 0 {
                crc = (crc >> 1) ^ CRC8_POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Generate CRC16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate CRC8 over `data`
///
/// # Examples
///
/// ```
/// use arena_link::crc::crc8;
///
/// let header = [0xA5, 0x01, 0x00, 0x00];
/// let crc = crc8(&header);
/// assert_ne!(crc, crc8(&[0xA5, 0x02, 0x00, 0x00]));
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;

    for &byte in data {
        crc = CRC8_TABLE[(crc ^ byte) as usize];
    }

    crc
}

/// Calculate CRC16 over `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0x00FF) as usize];
    }

    crc
}

/// Verify a buffer whose last byte is the CRC8 of the preceding bytes
pub fn verify_crc8(msg: &[u8]) -> bool {
    match msg.split_last() {
        Some((&expected, body)) => crc8(body) == expected,
        None => false,
    }
}

/// Overwrite the last byte of `msg` with the CRC8 of the preceding bytes
pub fn append_crc8(msg: &mut [u8]) {
    if let Some((last, body)) = msg.split_last_mut() {
        *last = crc8(body);
    }
}

/// Verify a buffer whose last two bytes are the little-endian CRC16 of the
/// preceding bytes
pub fn verify_crc16(msg: &[u8]) -> bool {
    if msg.len() < 2 {
        return false;
    }

    let (body, tail) = msg.split_at(msg.len() - 2);
    crc16(body) == u16::from_le_bytes([tail[0], tail[1]])
}

/// Overwrite the last two bytes of `msg` with the little-endian CRC16 of the
/// preceding bytes
pub fn append_crc16(msg: &mut [u8]) {
    if msg.len() < 2 {
        return;
    }

    let split = msg.len() - 2;
    let crc = crc16(&msg[..split]);
    msg[split..].copy_from_slice(&crc.to_le_bytes());
}

/// Bitwise CRC8 (slow, for verifying the table)
#[cfg(test)]
fn crc8_slow(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x01) != 0 {
                crc = (crc >> 1) ^ CRC8_POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Bitwise CRC16 (slow, for verifying the table)
#[cfg(test)]
fn crc16_slow(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc ^= byte as u16;

        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
