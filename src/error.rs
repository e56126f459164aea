//! # Error Types
//!
//! Custom error types for Arena Link using `thiserror`.

use thiserror::Error;

/// Main error type for Arena Link
#[derive(Debug, Error)]
pub enum ArenaLinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// A frame could not be decoded or built
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// An outbound referee message was refused
    #[error("Transmit refused: {0}")]
    Tx(String),

    /// Telemetry recording errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),
}

/// Reasons a received or outbound frame is rejected.
///
/// These never cross the receive/worker boundary: the worker logs them and
/// discards the frame, keeping the last known good state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unexpected frame length {actual} (expected {expected})")]
    Length { expected: usize, actual: usize },

    #[error("bad magic prefix 0x{0:02X} 0x{1:02X}")]
    Magic(u8, u8),

    #[error("{name} raw value {value} out of range")]
    ChannelRange { name: &'static str, value: u16 },

    #[error("{name} raw code {code} is not a valid position")]
    SwitchCode { name: &'static str, code: u8 },

    #[error("CRC mismatch")]
    Crc,

    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Result type alias for Arena Link
pub type Result<T> = std::result::Result<T, ArenaLinkError>;
