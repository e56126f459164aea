//! # Referee Protocol Definitions
//!
//! Frame layout, command identifiers and interaction sub-commands of the
//! referee-system serial link.
//!
//! ```text
//! [SOF:1][length:2][seq:1][crc8:1][cmd_id:2][payload:length][crc16:2]
//! ```
//!
//! `length` counts payload bytes only. All multi-byte fields are
//! little-endian. CRC8 covers the 4 bytes before it; CRC16 covers everything
//! before it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Start-of-frame byte
pub const SOF: u8 = 0xA5;

/// Largest frame on the link, header and CRCs included
pub const FRAME_MAX_SIZE: usize = 256;

/// `[sof][len lo][len hi][seq][crc8]`
pub const HEADER_SIZE: usize = 5;

/// Command identifier size
pub const CMD_ID_SIZE: usize = 2;

/// Trailing CRC16 size
pub const CRC16_SIZE: usize = 2;

/// Bytes of a frame that are not payload
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CMD_ID_SIZE + CRC16_SIZE;

/// Largest payload that fits in one frame
pub const MAX_PAYLOAD_LEN: usize = FRAME_MAX_SIZE - FRAME_OVERHEAD;

/// Command identifiers at or above this value are never dispatched
pub const MAX_CMD_ID_COUNT: usize = 1024;

/// Referee link line rate
pub const BAUD_RATE: u32 = 115_200;

/// Silence after which the referee link is considered lost
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Sub-header of an inter-robot interaction payload: sub-command, sender, receiver
pub const INTERACTION_HEADER_SIZE: usize = 6;

/// Largest user payload carried by one interaction
pub const MAX_INTERACTION_DATA: usize = 112;

/// Text carried by a custom-info message
pub const CUSTOM_INFO_TEXT_LEN: usize = 30;

/// Offset between a robot id and its operator client id
pub const CLIENT_ID_OFFSET: u16 = 0x0100;

/// Robot ids below this value belong to the red team
pub const BLUE_ID_BASE: u16 = 100;

/// Closed set of command identifiers carried by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum CmdId {
    GameStatus = 0x0001,
    GameResult = 0x0002,
    GameRobotHp = 0x0003,
    FieldEvents = 0x0101,
    RefereeWarning = 0x0104,
    DartInfo = 0x0105,
    SentryCmd = 0x0120,
    RadarCmd = 0x0121,
    RobotStatus = 0x0201,
    PowerHeat = 0x0202,
    RobotPosition = 0x0203,
    Buffs = 0x0204,
    AerialEnergy = 0x0205,
    Damage = 0x0206,
    ShootData = 0x0207,
    Ammunition = 0x0208,
    Rfid = 0x0209,
    DartClientCmd = 0x020A,
    GroundRobotPositions = 0x020B,
    RadarMark = 0x020C,
    SentryInfo = 0x020D,
    RadarInfo = 0x020E,
    RobotInteraction = 0x0301,
    CustomController = 0x0302,
    MapCommand = 0x0303,
    MapRadar = 0x0305,
    CustomClient = 0x0306,
    MapPath = 0x0307,
    CustomInfo = 0x0308,
}

impl CmdId {
    pub const ALL: [CmdId; 29] = [
        CmdId::GameStatus,
        CmdId::GameResult,
        CmdId::GameRobotHp,
        CmdId::FieldEvents,
        CmdId::RefereeWarning,
        CmdId::DartInfo,
        CmdId::SentryCmd,
        CmdId::RadarCmd,
        CmdId::RobotStatus,
        CmdId::PowerHeat,
        CmdId::RobotPosition,
        CmdId::Buffs,
        CmdId::AerialEnergy,
        CmdId::Damage,
        CmdId::ShootData,
        CmdId::Ammunition,
        CmdId::Rfid,
        CmdId::DartClientCmd,
        CmdId::GroundRobotPositions,
        CmdId::RadarMark,
        CmdId::SentryInfo,
        CmdId::RadarInfo,
        CmdId::RobotInteraction,
        CmdId::CustomController,
        CmdId::MapCommand,
        CmdId::MapRadar,
        CmdId::CustomClient,
        CmdId::MapPath,
        CmdId::CustomInfo,
    ];

    /// Wire value.
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|cmd| cmd.id() == id)
    }
}

impl TryFrom<u16> for CmdId {
    type Error = u16;

    fn try_from(id: u16) -> Result<Self, u16> {
        Self::from_id(id).ok_or(id)
    }
}

/// Operator-client UI sub-commands and their fixed payload sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum UiCmd {
    Delete = 0x0100,
    Draw1 = 0x0101,
    Draw2 = 0x0102,
    Draw5 = 0x0103,
    Draw7 = 0x0104,
    DrawChar = 0x0110,
}

impl UiCmd {
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Exact user payload length the client expects.
    pub fn payload_len(self) -> usize {
        match self {
            UiCmd::Delete => 2,
            UiCmd::Draw1 => 15,
            UiCmd::Draw2 => 30,
            UiCmd::Draw5 => 75,
            UiCmd::Draw7 => 105,
            UiCmd::DrawChar => 45,
        }
    }
}

/// Sub-command range reserved for robot-to-robot messages.
pub const ROBOT_COMM_SUB_CMDS: std::ops::RangeInclusive<u16> = 0x0200..=0x02FF;

/// Whether a robot id belongs to the red team.
pub fn is_red(robot_id: u16) -> bool {
    robot_id < BLUE_ID_BASE
}

/// Whether `id` names a robot: red 1..=11, blue 101..=111.
pub fn is_robot_id(id: u16) -> bool {
    RED_ROBOT_IDS.contains(&id) || BLUE_ROBOT_IDS.contains(&id)
}

/// Robot ids of the red team
pub const RED_ROBOT_IDS: std::ops::RangeInclusive<u16> = 1..=11;
/// Robot ids of the blue team
pub const BLUE_ROBOT_IDS: std::ops::RangeInclusive<u16> = 101..=111;

/// Operator client id of a robot, `None` for ids outside the robot ranges.
pub fn client_id(robot_id: u16) -> Option<u16> {
    if !is_robot_id(robot_id) {
        return None;
    }
    robot_id.checked_add(CLIENT_ID_OFFSET)
}
