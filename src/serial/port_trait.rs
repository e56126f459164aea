//! Trait abstraction over the transmit side of a serial port, so outbound
//! traffic can be tested without hardware

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Write half of an opened UART implementing [`SerialPortIO`]
#[derive(Debug)]
pub struct SerialWriter<W> {
    writer: W,
}

impl<W> SerialWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> SerialPortIO for SerialWriter<W> {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use mocks::MockSerialPort;

    #[tokio::test]
    async fn test_writer_forwards_to_inner() {
        let mut writer = SerialWriter::new(Vec::new());
        writer.write_all(&[0xA5, 0x01]).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(writer.writer, vec![0xA5, 0x01]);
    }

    #[tokio::test]
    async fn test_mock_flush_error() {
        let mut port = MockSerialPort::new();
        port.set_flush_error(io::ErrorKind::TimedOut);

        port.write_all(&[1]).await.unwrap();
        let err = port.flush().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
