//! # Referee Telemetry Records
//!
//! Every record the link can update is kept as its raw little-endian wire
//! bytes in a fixed-size [`RawRecord`]. A received payload is copied in with
//! a bounded copy of `min(declared length, record size)` bytes, so a short
//! payload updates only the head of a record and an oversized one never
//! writes past it. Consumers read decoded, typed views.

use serde::Serialize;

use super::protocol::{CmdId, MAX_CMD_ID_COUNT, MAX_INTERACTION_DATA};

/// Fixed-size storage of one record's wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> Default for RawRecord<N> {
    fn default() -> Self {
        Self { bytes: [0; N] }
    }
}

impl<const N: usize> RawRecord<N> {
    pub const LEN: usize = N;

    /// Copy the head of `src` into the record; returns the bytes copied.
    pub fn copy_from(&mut self, src: &[u8]) -> usize {
        let len = src.len().min(N);
        self.bytes[..len].copy_from_slice(&src[..len]);
        len
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }
}

/// Little-endian field reads at fixed offsets.
struct Le<'a>(&'a [u8]);

impl Le<'_> {
    fn u8(&self, at: usize) -> u8 {
        self.0[at]
    }

    fn u16(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.0[at], self.0[at + 1]])
    }

    fn u32(&self, at: usize) -> u32 {
        u32::from_le_bytes([self.0[at], self.0[at + 1], self.0[at + 2], self.0[at + 3]])
    }

    fn u64(&self, at: usize) -> u64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.0[at..at + 8]);
        u64::from_le_bytes(b)
    }

    fn f32(&self, at: usize) -> f32 {
        f32::from_bits(self.u32(at))
    }
}

/// Match state (0x0001).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GameStatus {
    pub game_type: u8,
    pub game_progress: u8,
    pub stage_remain_time: u16,
    pub sync_timestamp: u64,
}

impl GameStatus {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            game_type: b.u8(0) & 0x0F,
            game_progress: b.u8(0) >> 4,
            stage_remain_time: b.u16(1),
            sync_timestamp: b.u64(3),
        }
    }
}

/// Match result (0x0002). `winner`: 0 draw, 1 red, 2 blue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GameResult {
    pub winner: u8,
}

impl GameResult {
    fn decode(b: &[u8]) -> Self {
        Self { winner: b[0] }
    }
}

/// Hit points of the own team's units (0x0003).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GameRobotHp {
    pub robot_1_hp: u16,
    pub robot_2_hp: u16,
    pub robot_3_hp: u16,
    pub robot_4_hp: u16,
    pub robot_7_hp: u16,
    pub outpost_hp: u16,
    pub base_hp: u16,
}

impl GameRobotHp {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            robot_1_hp: b.u16(0),
            robot_2_hp: b.u16(2),
            robot_3_hp: b.u16(4),
            robot_4_hp: b.u16(6),
            robot_7_hp: b.u16(10),
            outpost_hp: b.u16(12),
            base_hp: b.u16(14),
        }
    }
}

/// Field event bits (0x0101).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldEvents {
    pub event_type: u32,
}

impl FieldEvents {
    fn decode(b: &[u8]) -> Self {
        Self { event_type: Le(b).u32(0) }
    }
}

/// Penalty issued by the referee (0x0104).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RefereeWarning {
    pub level: u8,
    pub offending_robot_id: u8,
    pub count: u8,
}

impl RefereeWarning {
    fn decode(b: &[u8]) -> Self {
        Self {
            level: b[0],
            offending_robot_id: b[1],
            count: b[2],
        }
    }
}

/// Dart launch state (0x0105).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DartInfo {
    pub dart_remaining_time: u8,
    pub dart_info: u16,
}

impl DartInfo {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            dart_remaining_time: b.u8(0),
            dart_info: b.u16(1),
        }
    }
}

/// Own robot performance state (0x0201).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RobotStatus {
    pub robot_id: u8,
    pub robot_level: u8,
    pub current_hp: u16,
    pub maximum_hp: u16,
    pub shooter_barrel_cooling_value: u16,
    pub shooter_barrel_heat_limit: u16,
    pub chassis_power_limit: u16,
    pub gimbal_output: bool,
    pub chassis_output: bool,
    pub shooter_output: bool,
}

impl RobotStatus {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        let outputs = b.u8(12);
        Self {
            robot_id: b.u8(0),
            robot_level: b.u8(1),
            current_hp: b.u16(2),
            maximum_hp: b.u16(4),
            shooter_barrel_cooling_value: b.u16(6),
            shooter_barrel_heat_limit: b.u16(8),
            chassis_power_limit: b.u16(10),
            gimbal_output: outputs & 0x01 != 0,
            chassis_output: outputs & 0x02 != 0,
            shooter_output: outputs & 0x04 != 0,
        }
    }
}

/// Chassis buffer energy and barrel heat (0x0202).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PowerHeat {
    pub buffer_energy: u16,
    pub shooter_17mm_barrel_heat: u16,
    pub shooter_42mm_barrel_heat: u16,
}

impl PowerHeat {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            buffer_energy: b.u16(8),
            shooter_17mm_barrel_heat: b.u16(10),
            shooter_42mm_barrel_heat: b.u16(12),
        }
    }
}

/// Own robot position in metres and heading in degrees (0x0203).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RobotPosition {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

impl RobotPosition {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            x: b.f32(0),
            y: b.f32(4),
            angle: b.f32(8),
        }
    }
}

/// Active buffs (0x0204).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Buffs {
    pub recovery_buff: u8,
    pub cooling_buff: u16,
    pub defence_buff: u8,
    pub vulnerability_buff: u8,
    pub attack_buff: u16,
    pub remaining_energy: u8,
}

impl Buffs {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            recovery_buff: b.u8(0),
            cooling_buff: b.u16(1),
            defence_buff: b.u8(3),
            vulnerability_buff: b.u8(4),
            attack_buff: b.u16(5),
            remaining_energy: b.u8(7),
        }
    }
}

/// Last damage taken (0x0206).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Damage {
    pub armor_id: u8,
    pub hp_deduction_reason: u8,
}

impl Damage {
    fn decode(b: &[u8]) -> Self {
        Self {
            armor_id: b[0] & 0x0F,
            hp_deduction_reason: b[0] >> 4,
        }
    }
}

/// Last projectile launched (0x0207).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ShootData {
    pub bullet_type: u8,
    pub shooter_number: u8,
    pub launching_frequency: u8,
    pub initial_speed: f32,
}

impl ShootData {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            bullet_type: b.u8(0),
            shooter_number: b.u8(1),
            launching_frequency: b.u8(2),
            initial_speed: b.f32(3),
        }
    }
}

/// Projectile allowance and gold (0x0208).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Ammunition {
    pub projectile_allowance_17mm: u16,
    pub projectile_allowance_42mm: u16,
    pub remaining_gold_coin: u16,
    pub projectile_allowance_fortress: u16,
}

impl Ammunition {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            projectile_allowance_17mm: b.u16(0),
            projectile_allowance_42mm: b.u16(2),
            remaining_gold_coin: b.u16(4),
            projectile_allowance_fortress: b.u16(6),
        }
    }
}

/// RFID zone detection bits (0x0209).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RfidStatus {
    pub rfid_status: u32,
    pub rfid_status_2: u8,
}

impl RfidStatus {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            rfid_status: b.u32(0),
            rfid_status_2: b.u8(4),
        }
    }
}

/// Dart operator commands (0x020A).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DartClientCmd {
    pub dart_launch_opening_status: u8,
    pub target_change_time: u16,
    pub latest_launch_cmd_time: u16,
}

impl DartClientCmd {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            dart_launch_opening_status: b.u8(0),
            target_change_time: b.u16(2),
            latest_launch_cmd_time: b.u16(4),
        }
    }
}

/// Positions of the own team's ground robots, `[x, y]` in metres (0x020B).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GroundRobotPositions {
    pub hero: [f32; 2],
    pub engineer: [f32; 2],
    pub standard_3: [f32; 2],
    pub standard_4: [f32; 2],
}

impl GroundRobotPositions {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        let xy = |at: usize| [b.f32(at), b.f32(at + 4)];
        Self {
            hero: xy(0),
            engineer: xy(8),
            standard_3: xy(16),
            standard_4: xy(24),
        }
    }
}

/// Radar marking progress bits (0x020C).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RadarMark {
    pub mark_progress: u16,
}

impl RadarMark {
    fn decode(b: &[u8]) -> Self {
        Self { mark_progress: Le(b).u16(0) }
    }
}

/// Sentry decision state (0x020D).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SentryInfo {
    pub sentry_info: u32,
    pub sentry_info_2: u16,
}

impl SentryInfo {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            sentry_info: b.u32(0),
            sentry_info_2: b.u16(4),
        }
    }
}

/// Radar decision state (0x020E).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RadarInfo {
    pub radar_info: u8,
}

impl RadarInfo {
    fn decode(b: &[u8]) -> Self {
        Self { radar_info: b[0] }
    }
}

/// Minimap command from the operator client (0x0303).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MapCommand {
    pub target_position_x: f32,
    pub target_position_y: f32,
    pub cmd_keyboard: u8,
    pub target_robot_id: u8,
    pub cmd_source: u16,
}

impl MapCommand {
    fn decode(b: &[u8]) -> Self {
        let b = Le(b);
        Self {
            target_position_x: b.f32(0),
            target_position_y: b.f32(4),
            cmd_keyboard: b.u8(8),
            target_robot_id: b.u8(9),
            cmd_source: b.u16(10),
        }
    }
}

/// Last robot-to-robot message received (0x0301).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotInteraction {
    pub sub_cmd_id: u16,
    pub sender_id: u16,
    pub receiver_id: u16,
    pub user_data: [u8; MAX_INTERACTION_DATA],
}

impl RobotInteraction {
    fn decode(b: &[u8]) -> Self {
        let le = Le(b);
        let mut user_data = [0u8; MAX_INTERACTION_DATA];
        user_data.copy_from_slice(&b[6..6 + MAX_INTERACTION_DATA]);
        Self {
            sub_cmd_id: le.u16(0),
            sender_id: le.u16(2),
            receiver_id: le.u16(4),
            user_data,
        }
    }
}

/// Declares the record table: storage field, typed view, command and size.
macro_rules! referee_records {
    ($($field:ident: $view:ident = $cmd:ident[$len:expr];)*) => {
        /// Latest received copy of every referee record.
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct RefereeData {
            $($field: RawRecord<$len>,)*
        }

        impl RefereeData {
            /// Bounded copy of `payload` into the record of `cmd`.
            ///
            /// Returns the bytes copied, or `None` if `cmd` has no record.
            pub fn apply(&mut self, cmd: CmdId, payload: &[u8]) -> Option<usize> {
                match cmd {
                    $(CmdId::$cmd => Some(self.$field.copy_from(payload)),)*
                    _ => None,
                }
            }

            /// Raw wire bytes of the record of `cmd`.
            pub fn raw(&self, cmd: CmdId) -> Option<&[u8]> {
                match cmd {
                    $(CmdId::$cmd => Some(self.$field.as_bytes().as_slice()),)*
                    _ => None,
                }
            }

            /// Stored size of the record of `cmd`.
            pub fn record_len(cmd: CmdId) -> Option<usize> {
                match cmd {
                    $(CmdId::$cmd => Some($len),)*
                    _ => None,
                }
            }

            $(
                pub fn $field(&self) -> $view {
                    $view::decode(self.$field.as_bytes())
                }
            )*
        }
    };
}

referee_records! {
    game_status: GameStatus = GameStatus[11];
    game_result: GameResult = GameResult[1];
    game_robot_hp: GameRobotHp = GameRobotHp[16];
    field_events: FieldEvents = FieldEvents[4];
    referee_warning: RefereeWarning = RefereeWarning[3];
    dart_info: DartInfo = DartInfo[3];
    robot_status: RobotStatus = RobotStatus[13];
    power_heat: PowerHeat = PowerHeat[14];
    robot_position: RobotPosition = RobotPosition[16];
    buffs: Buffs = Buffs[8];
    damage: Damage = Damage[1];
    shoot_data: ShootData = ShootData[7];
    ammunition: Ammunition = Ammunition[8];
    rfid: RfidStatus = Rfid[5];
    dart_client_cmd: DartClientCmd = DartClientCmd[6];
    ground_robot_positions: GroundRobotPositions = GroundRobotPositions[40];
    radar_mark: RadarMark = RadarMark[2];
    sentry_info: SentryInfo = SentryInfo[6];
    radar_info: RadarInfo = RadarInfo[1];
    map_command: MapCommand = MapCommand[12];
    robot_interaction: RobotInteraction = RobotInteraction[118];
}

/// Allow-list of command identifiers, one bit per identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdFilter {
    bits: [u64; MAX_CMD_ID_COUNT / 64],
}

impl CmdFilter {
    /// Every identifier below the maximum count.
    pub fn all() -> Self {
        Self {
            bits: [u64::MAX; MAX_CMD_ID_COUNT / 64],
        }
    }

    pub fn none() -> Self {
        Self {
            bits: [0; MAX_CMD_ID_COUNT / 64],
        }
    }

    /// Only the listed commands; an empty list allows everything.
    pub fn from_cmds(cmds: &[CmdId]) -> Self {
        if cmds.is_empty() {
            return Self::all();
        }

        let mut filter = Self::none();
        for cmd in cmds {
            filter.allow(cmd.id());
        }
        filter
    }

    /// Identifiers at or above the maximum count are ignored.
    pub fn allow(&mut self, id: u16) {
        let id = usize::from(id);
        if id < MAX_CMD_ID_COUNT {
            self.bits[id / 64] |= 1 << (id % 64);
        }
    }

    pub fn allows(&self, id: u16) -> bool {
        let id = usize::from(id);
        id < MAX_CMD_ID_COUNT && self.bits[id / 64] & (1 << (id % 64)) != 0
    }
}

impl Default for CmdFilter {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_copy_short_payload_keeps_tail() {
        let mut rec = RawRecord::<4>::default();
        rec.copy_from(&[1, 2, 3, 4]);
        assert_eq!(rec.copy_from(&[9, 9]), 2);
        assert_eq!(rec.as_bytes(), &[9, 9, 3, 4]);
    }

    #[test]
    fn test_bounded_copy_never_overflows() {
        for len in 0..=40 {
            let payload: Vec<u8> = (0..len as u8).collect();
            let mut rec = RawRecord::<13>::default();
            assert_eq!(rec.copy_from(&payload), len.min(13));
        }
    }

    #[test]
    fn test_apply_touches_only_target_record() {
        let mut data = RefereeData::default();
        assert_eq!(data.apply(CmdId::GameResult, &[1]), Some(1));

        assert_eq!(data.game_result().winner, 1);
        let mut expected = RefereeData::default();
        expected.game_result.copy_from(&[1]);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_apply_without_record_is_noop() {
        let mut data = RefereeData::default();
        assert_eq!(data.apply(CmdId::AerialEnergy, &[1, 2, 3]), None);
        assert_eq!(data.apply(CmdId::CustomInfo, &[0; 34]), None);
        assert_eq!(data, RefereeData::default());
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(RefereeData::record_len(CmdId::GameStatus), Some(11));
        assert_eq!(RefereeData::record_len(CmdId::RobotStatus), Some(13));
        assert_eq!(RefereeData::record_len(CmdId::GroundRobotPositions), Some(40));
        assert_eq!(RefereeData::record_len(CmdId::RobotInteraction), Some(118));
        assert_eq!(RefereeData::record_len(CmdId::SentryCmd), None);
    }

    #[test]
    fn test_game_status_view() {
        let mut data = RefereeData::default();
        let mut payload = vec![0x34];
        payload.extend_from_slice(&180u16.to_le_bytes());
        payload.extend_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());
        data.apply(CmdId::GameStatus, &payload);

        let status = data.game_status();
        assert_eq!(status.game_type, 4);
        assert_eq!(status.game_progress, 3);
        assert_eq!(status.stage_remain_time, 180);
        assert_eq!(status.sync_timestamp, 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_robot_status_view() {
        let payload = [7, 2, 0x90, 0x01, 0xF4, 0x01, 40, 0, 0x40, 0x01, 80, 0, 0b101];
        let mut data = RefereeData::default();
        data.apply(CmdId::RobotStatus, &payload);

        let status = data.robot_status();
        assert_eq!(status.robot_id, 7);
        assert_eq!(status.current_hp, 400);
        assert_eq!(status.maximum_hp, 500);
        assert_eq!(status.shooter_barrel_heat_limit, 320);
        assert_eq!(status.chassis_power_limit, 80);
        assert!(status.gimbal_output);
        assert!(!status.chassis_output);
        assert!(status.shooter_output);
    }

    #[test]
    fn test_float_views() {
        let mut payload = Vec::new();
        for v in [1.5f32, -2.25, 90.0, 0.0] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        let mut data = RefereeData::default();
        data.apply(CmdId::RobotPosition, &payload);
        assert_eq!(data.robot_position(), RobotPosition { x: 1.5, y: -2.25, angle: 90.0 });

        data.apply(CmdId::ShootData, &[1, 1, 20, 0x00, 0x00, 0xF0, 0x41]);
        assert_eq!(data.shoot_data().initial_speed, 30.0);
    }

    #[test]
    fn test_filter() {
        let filter = CmdFilter::from_cmds(&[CmdId::GameResult, CmdId::PowerHeat]);
        assert!(filter.allows(0x0002));
        assert!(filter.allows(0x0202));
        assert!(!filter.allows(0x0001));
        assert!(!filter.allows(0x0400));

        let all = CmdFilter::from_cmds(&[]);
        assert!(all.allows(0x0001));
        assert!(all.allows(1023));
        assert!(!all.allows(1024));
    }
}
