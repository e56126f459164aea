//! # Referee Transmit API
//!
//! Outbound messages on the referee link: raw command packets, robot-to-robot
//! interactions, operator-client UI commands and custom info text.
//!
//! Sends are refused (with [`ArenaLinkError::Tx`]) when the own robot id is
//! unknown, when a robot interaction targets the other team, or when a payload
//! does not fit its frame.

use tracing::debug;

use super::encoder::{encode_frame, encode_interaction};
use super::protocol::{client_id, is_red, is_robot_id, CmdId, UiCmd, CUSTOM_INFO_TEXT_LEN, ROBOT_COMM_SUB_CMDS};
use crate::error::{ArenaLinkError, Result};
use crate::serial::SerialPortIO;

/// Outbound side of the referee link.
#[derive(Debug)]
pub struct RefereeTx<P> {
    port: P,
    seq: u8,
    robot_id: u16,
}

impl<P: SerialPortIO> RefereeTx<P> {
    /// `robot_id` 0 means "not known yet"; only raw packets can be sent then.
    pub fn new(port: P, robot_id: u16) -> Self {
        Self {
            port,
            seq: 0,
            robot_id,
        }
    }

    pub fn robot_id(&self) -> u16 {
        self.robot_id
    }

    /// Update the own robot id, typically from the robot status record.
    ///
    /// # Errors
    ///
    /// Returns error (and keeps the current id) if `robot_id` is neither 0
    /// nor a red or blue robot id
    pub fn set_robot_id(&mut self, robot_id: u16) -> Result<()> {
        if robot_id != 0 && !is_robot_id(robot_id) {
            return Err(ArenaLinkError::Tx(format!("{} is not a robot id", robot_id)));
        }
        self.robot_id = robot_id;
        Ok(())
    }

    /// Operator client id of the own robot, if the robot id is known.
    pub fn client_id(&self) -> Option<u16> {
        client_id(self.robot_id)
    }

    /// Send one command packet
    ///
    /// # Arguments
    ///
    /// * `cmd` - Command identifier
    /// * `payload` - Command payload
    ///
    /// # Errors
    ///
    /// Returns error if the payload does not fit in a frame or the write fails
    pub async fn send_packet(&mut self, cmd: CmdId, payload: &[u8]) -> Result<()> {
        let frame = encode_frame(self.seq, cmd.id(), payload)?;
        self.seq = self.seq.wrapping_add(1);

        self.port
            .write_all(&frame)
            .await
            .map_err(|e| ArenaLinkError::Serial(format!("Failed to write referee frame: {}", e)))?;
        self.port
            .flush()
            .await
            .map_err(|e| ArenaLinkError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent referee {:?} ({} bytes)", cmd, frame.len());
        Ok(())
    }

    /// Send a message to a robot of the own team
    ///
    /// # Arguments
    ///
    /// * `receiver_id` - Robot id of the receiver
    /// * `sub_cmd_id` - Team-defined sub-command in 0x0200..=0x02FF
    /// * `data` - User payload (at most 112 bytes)
    ///
    /// # Errors
    ///
    /// Returns error if the own id is unknown, the receiver is on the other
    /// team, the sub-command is outside the robot range, the data is too large
    /// or the write fails
    pub async fn send_robot_interaction(&mut self, receiver_id: u16, sub_cmd_id: u16, data: &[u8]) -> Result<()> {
        let (sender_id, _) = self.own_ids()?;

        if is_red(sender_id) != is_red(receiver_id) {
            return Err(ArenaLinkError::Tx(format!(
                "receiver {} is not on the same team as robot {}",
                receiver_id, sender_id
            )));
        }

        if !ROBOT_COMM_SUB_CMDS.contains(&sub_cmd_id) {
            return Err(ArenaLinkError::Tx(format!(
                "sub-command 0x{:04X} is not a robot-to-robot command",
                sub_cmd_id
            )));
        }

        let payload = encode_interaction(sub_cmd_id, sender_id, receiver_id, data)?;
        self.send_packet(CmdId::RobotInteraction, &payload).await
    }

    /// Send a UI command to the own operator client
    ///
    /// `data` must be exactly [`UiCmd::payload_len`] bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the own id is unknown, the data length does not match
    /// the command or the write fails
    pub async fn send_ui_interaction(&mut self, cmd: UiCmd, data: &[u8]) -> Result<()> {
        let (sender_id, client) = self.own_ids()?;

        if data.len() != cmd.payload_len() {
            return Err(ArenaLinkError::Tx(format!(
                "UI command {:?} takes {} bytes, got {}",
                cmd,
                cmd.payload_len(),
                data.len()
            )));
        }

        let payload = encode_interaction(cmd.id(), sender_id, client, data)?;
        self.send_packet(CmdId::RobotInteraction, &payload).await
    }

    /// Show a short text on the own operator client's minimap
    ///
    /// Text longer than 30 bytes is truncated.
    ///
    /// # Errors
    ///
    /// Returns error if the own id is unknown or the write fails
    pub async fn send_custom_info(&mut self, text: &str) -> Result<()> {
        let (sender_id, client) = self.own_ids()?;

        let mut payload = [0u8; 4 + CUSTOM_INFO_TEXT_LEN];
        payload[..2].copy_from_slice(&sender_id.to_le_bytes());
        payload[2..4].copy_from_slice(&client.to_le_bytes());

        let text = text.as_bytes();
        let len = text.len().min(CUSTOM_INFO_TEXT_LEN);
        payload[4..4 + len].copy_from_slice(&text[..len]);

        self.send_packet(CmdId::CustomInfo, &payload).await
    }

    /// Own robot id and operator client id.
    fn own_ids(&self) -> Result<(u16, u16)> {
        match client_id(self.robot_id) {
            Some(client) => Ok((self.robot_id, client)),
            None if self.robot_id == 0 => Err(ArenaLinkError::Tx("own robot id is not known".to_string())),
            None => Err(ArenaLinkError::Tx(format!("own robot id {} is not a robot id", self.robot_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referee::parser::FrameSynchronizer;
    use crate::serial::mocks::MockSerialPort;
    use std::io;

    /// Parse every written frame back into (seq, cmd_id, payload).
    fn sent(port: &MockSerialPort) -> Vec<(u8, u16, Vec<u8>)> {
        let mut parser = FrameSynchronizer::new();
        let mut out = Vec::new();
        for chunk in port.get_written_data() {
            parser.feed(&chunk, |f| out.push((f.seq, f.cmd_id, f.payload.to_vec())));
        }
        out
    }

    #[tokio::test]
    async fn test_send_packet_increments_sequence() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 3);

        tx.send_packet(CmdId::MapCommand, &[1, 2]).await.unwrap();
        tx.send_packet(CmdId::MapCommand, &[3]).await.unwrap();

        let frames = sent(&port);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], (0, 0x0303, vec![1, 2]));
        assert_eq!(frames[1].0, 1);
    }

    #[tokio::test]
    async fn test_sequence_wraps() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 3);
        tx.seq = 255;

        tx.send_packet(CmdId::MapCommand, &[]).await.unwrap();
        tx.send_packet(CmdId::MapCommand, &[]).await.unwrap();

        let seqs: Vec<u8> = sent(&port).iter().map(|f| f.0).collect();
        assert_eq!(seqs, vec![255, 0]);
    }

    #[tokio::test]
    async fn test_robot_interaction_same_team() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 103);

        tx.send_robot_interaction(104, 0x0201, &[0xAB]).await.unwrap();

        let frames = sent(&port);
        assert_eq!(frames[0].1, 0x0301);
        assert_eq!(frames[0].2, vec![0x01, 0x02, 103, 0, 104, 0, 0xAB]);
    }

    #[tokio::test]
    async fn test_robot_interaction_refused_across_teams() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 3);

        let err = tx.send_robot_interaction(104, 0x0201, &[0xAB]).await.unwrap_err();
        assert!(matches!(err, ArenaLinkError::Tx(_)));
        assert!(port.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_robot_id_refused() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 0);

        assert!(tx.client_id().is_none());
        assert!(tx.send_robot_interaction(1, 0x0201, &[]).await.is_err());
        assert!(tx.send_custom_info("hello").await.is_err());
        assert!(tx.send_ui_interaction(UiCmd::Delete, &[0, 0]).await.is_err());
        assert!(port.get_written_data().is_empty());

        // Raw packets do not need an id
        tx.send_packet(CmdId::MapCommand, &[]).await.unwrap();
        assert_eq!(port.get_written_data().len(), 1);
    }

    #[tokio::test]
    async fn test_set_robot_id_rejects_non_robot_ids() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 3);

        assert!(tx.set_robot_id(u16::MAX).is_err());
        assert!(tx.set_robot_id(50).is_err());
        assert_eq!(tx.robot_id(), 3);

        tx.set_robot_id(107).unwrap();
        assert_eq!(tx.client_id(), Some(0x016B));
    }

    #[tokio::test]
    async fn test_out_of_range_id_from_constructor_refused() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), u16::MAX);

        assert!(tx.client_id().is_none());
        let err = tx.send_custom_info("hi").await.unwrap_err();
        assert!(matches!(err, ArenaLinkError::Tx(_)));
        assert!(port.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_interaction_refused() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 3);

        let err = tx.send_robot_interaction(4, 0x0201, &[0; 113]).await.unwrap_err();
        assert!(matches!(err, ArenaLinkError::Frame(_)));
        assert!(port.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_robot_interaction_rejects_ui_sub_command() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 3);

        assert!(tx.send_robot_interaction(4, 0x0101, &[0; 15]).await.is_err());
        assert!(port.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_ui_interaction_goes_to_client() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 3);

        tx.send_ui_interaction(UiCmd::Draw1, &[0x55; 15]).await.unwrap();

        let frames = sent(&port);
        let payload = &frames[0].2;
        assert_eq!(payload.len(), 6 + 15);
        assert_eq!(&payload[..6], &[0x01, 0x01, 3, 0, 0x03, 0x01]);

        assert!(tx.send_ui_interaction(UiCmd::Draw2, &[0; 15]).await.is_err());
    }

    #[tokio::test]
    async fn test_custom_info_truncates_text() {
        let port = MockSerialPort::new();
        let mut tx = RefereeTx::new(port.clone(), 101);

        tx.send_custom_info("this message is longer than thirty bytes").await.unwrap();

        let frames = sent(&port);
        assert_eq!(frames[0].1, 0x0308);
        let payload = &frames[0].2;
        assert_eq!(payload.len(), 34);
        assert_eq!(&payload[..4], &[101, 0, 0x65, 0x01]);
        assert_eq!(&payload[4..], b"this message is longer than th");
    }

    #[tokio::test]
    async fn test_write_error_is_reported() {
        let port = MockSerialPort::new();
        port.set_write_error(io::ErrorKind::BrokenPipe);
        let mut tx = RefereeTx::new(port.clone(), 3);

        let err = tx.send_packet(CmdId::MapCommand, &[]).await.unwrap_err();
        assert!(matches!(err, ArenaLinkError::Serial(_)));
    }
}
