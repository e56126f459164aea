//! # Serial Communication Module
//!
//! UART plumbing for the radio receivers and the referee system.
//!
//! This module handles:
//! - Opening each UART with its protocol's line settings
//! - Splitting a port into a receive half and a [`SerialWriter`]
//! - Delivering received bursts to a link's [`RxSink`]
//!
//! The receivers send one frame per burst with a quiet line in between.
//! [`run_reader`] reproduces the line-idle interrupt: bytes are collected
//! until the line has been quiet for the idle gap, then handed to the sink in
//! one call.

pub mod port_trait;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, ReadHalf, WriteHalf};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, trace, warn};

use crate::error::{ArenaLinkError, Result};
use crate::link::RxSink;

pub use port_trait::{SerialPortIO, SerialWriter};

#[cfg(test)]
pub use port_trait::mocks;

/// Largest burst handed to a sink in one call
pub const MAX_BURST_LEN: usize = 256;

/// Quiet time that ends a burst
pub const DEFAULT_IDLE_GAP: Duration = Duration::from_millis(1);

/// Receive half of an opened UART
pub type PortReader = ReadHalf<SerialStream>;

/// Transmit half of an opened UART
pub type PortWriter = SerialWriter<WriteHalf<SerialStream>>;

/// Line settings of one UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl LineSettings {
    /// DR16 receiver: 100 kbaud, 8E1
    pub const DR16: Self = Self {
        baud_rate: crate::rc::dr16::BAUD_RATE,
        parity: Parity::Even,
        stop_bits: StopBits::One,
    };

    /// VT03 receiver: 921.6 kbaud, 8N1
    pub const VT03: Self = Self {
        baud_rate: crate::rc::vt03::BAUD_RATE,
        parity: Parity::None,
        stop_bits: StopBits::One,
    };

    /// Referee system: 115.2 kbaud, 8N1
    pub const REFEREE: Self = Self {
        baud_rate: crate::referee::protocol::BAUD_RATE,
        parity: Parity::None,
        stop_bits: StopBits::One,
    };

    /// Same framing at a different baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// An opened UART
pub struct SerialLink {
    /// Serial port handle
    port: SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Open one device
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `settings` - Line settings of the protocol on this UART
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arena_link::serial::{LineSettings, SerialLink};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let link = SerialLink::open("/dev/ttyUSB0", LineSettings::DR16)?;
    ///     println!("Opened {}", link.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, settings: LineSettings) -> Result<Self> {
        let port = open_port(path, settings)?;
        info!("Opened {} at {} baud", path, settings.baud_rate);
        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    /// Open the first device in `paths` that works
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` if none of the paths can be opened
    pub fn open_with_paths(paths: &[&str], settings: LineSettings) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open(path, settings) {
                Ok(link) => return Ok(link),
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(ArenaLinkError::SerialPortNotFound(paths.join(", ")))
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Split into a receive half and a transmit half.
    pub fn into_split(self) -> (PortReader, PortWriter) {
        let (reader, writer) = tokio::io::split(self.port);
        (reader, SerialWriter::new(writer))
    }
}

/// Open a serial port with 8 data bits and no flow control
fn open_port(path: &str, settings: LineSettings) -> Result<SerialStream> {
    let port = tokio_serial::new(path, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(settings.parity)
        .stop_bits(settings.stop_bits)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| ArenaLinkError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}

/// Read bursts from `reader` and offer each one to `sink`
///
/// A burst ends when the line stays quiet for `idle_gap` or when it reaches
/// [`MAX_BURST_LEN`] bytes. Returns when the reader reaches end of stream.
///
/// # Errors
///
/// Returns error if a read fails
pub async fn run_reader<R, S>(mut reader: R, sink: &mut S, idle_gap: Duration) -> Result<()>
where
    R: AsyncRead + Unpin,
    S: RxSink + ?Sized,
{
    let mut buf = [0u8; MAX_BURST_LEN];
    let mut burst: Vec<u8> = Vec::with_capacity(MAX_BURST_LEN);

    loop {
        let read = if burst.is_empty() {
            Some(reader.read(&mut buf).await)
        } else {
            tokio::time::timeout(idle_gap, reader.read(&mut buf)).await.ok()
        };

        match read {
            // Line idle
            None => deliver(sink, &mut burst),
            Some(Ok(0)) => {
                deliver(sink, &mut burst);
                debug!("Serial reader reached end of stream");
                return Ok(());
            }
            Some(Ok(n)) => {
                let mut bytes = &buf[..n];
                while !bytes.is_empty() {
                    let take = (MAX_BURST_LEN - burst.len()).min(bytes.len());
                    burst.extend_from_slice(&bytes[..take]);
                    bytes = &bytes[take..];

                    if burst.len() == MAX_BURST_LEN {
                        deliver(sink, &mut burst);
                    }
                }
            }
            Some(Err(e)) => {
                return Err(ArenaLinkError::Serial(format!("Failed to read serial port: {}", e)));
            }
        }
    }
}

fn deliver<S: RxSink + ?Sized>(sink: &mut S, burst: &mut Vec<u8>) {
    if burst.is_empty() {
        return;
    }
    if !sink.on_receive(burst) {
        trace!("Burst of {} bytes rejected", burst.len());
    }
    burst.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[derive(Default)]
    struct Recorder {
        bursts: Vec<Vec<u8>>,
    }

    impl RxSink for Recorder {
        fn on_receive(&mut self, buf: &[u8]) -> bool {
            self.bursts.push(buf.to_vec());
            true
        }
    }

    #[test]
    fn test_line_settings() {
        assert_eq!(LineSettings::DR16.baud_rate, 100_000);
        assert_eq!(LineSettings::DR16.parity, Parity::Even);
        assert_eq!(LineSettings::VT03.baud_rate, 921_600);
        assert_eq!(LineSettings::VT03.parity, Parity::None);
        assert_eq!(LineSettings::REFEREE.baud_rate, 115_200);
        assert_eq!(LineSettings::REFEREE.with_baud_rate(9600).parity, Parity::None);
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = SerialLink::open_with_paths(invalid_paths, LineSettings::REFEREE);

        match result.unwrap_err() {
            ArenaLinkError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = open_port("/dev/nonexistent_serial_device_12345", LineSettings::DR16);

        match result.unwrap_err() {
            ArenaLinkError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_separates_bursts() {
        let reader = Builder::new()
            .read(&[1, 2, 3])
            .wait(Duration::from_millis(14))
            .read(&[4, 5])
            .build();

        let mut sink = Recorder::default();
        run_reader(reader, &mut sink, DEFAULT_IDLE_GAP).await.unwrap();

        assert_eq!(sink.bursts, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_reads_form_one_burst() {
        let reader = Builder::new().read(&[1, 2]).read(&[3, 4]).build();

        let mut sink = Recorder::default();
        run_reader(reader, &mut sink, DEFAULT_IDLE_GAP).await.unwrap();

        assert_eq!(sink.bursts, vec![vec![1, 2, 3, 4]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_stream_is_capped() {
        let data = vec![0x5A; MAX_BURST_LEN + 10];
        let reader = Builder::new().read(&data).build();

        let mut sink = Recorder::default();
        run_reader(reader, &mut sink, DEFAULT_IDLE_GAP).await.unwrap();

        assert_eq!(sink.bursts.len(), 2);
        assert_eq!(sink.bursts[0].len(), MAX_BURST_LEN);
        assert_eq!(sink.bursts[1].len(), 10);
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let reader = Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::Other, "line fault"))
            .build();

        let mut sink = Recorder::default();
        let err = run_reader(reader, &mut sink, DEFAULT_IDLE_GAP).await.unwrap_err();
        assert!(matches!(err, ArenaLinkError::Serial(_)));
        assert!(sink.bursts.is_empty());
    }

    // Requires a receiver wired to the UART
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_read_with_real_hardware() {
        if let Ok(link) = SerialLink::open("/dev/ttyUSB0", LineSettings::DR16) {
            let (reader, _writer) = link.into_split();
            let mut sink = Recorder::default();
            let _ = tokio::time::timeout(
                Duration::from_millis(200),
                run_reader(reader, &mut sink, DEFAULT_IDLE_GAP),
            )
            .await;
            println!("Received {} bursts", sink.bursts.len());
        } else {
            println!("No receiver detected (skipping read test)");
        }
    }
}
