//! Telemetry record types

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::link::LinkStatus;
use crate::rc::{RcHub, RcSource, Sticks};
use crate::referee::records::{GameStatus, PowerHeat, RobotStatus};
use crate::referee::{ParserStats, RefereeHandle};

/// Online state of one link
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub name: &'static str,
    pub online: bool,
    pub last_alive_ms: u64,
}

impl From<&LinkStatus> for LinkSnapshot {
    fn from(status: &LinkStatus) -> Self {
        Self {
            name: status.name(),
            online: status.is_online(),
            last_alive_ms: status.last_alive_ms(),
        }
    }
}

/// Referee fields worth recording
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RefereeSnapshot {
    pub game_status: GameStatus,
    pub robot_status: RobotStatus,
    pub power_heat: PowerHeat,
    pub parser: ParserStats,
}

impl From<&RefereeHandle> for RefereeSnapshot {
    fn from(handle: &RefereeHandle) -> Self {
        let (game_status, robot_status, power_heat) =
            handle.read(|d| (d.game_status(), d.robot_status(), d.power_heat()));
        Self {
            game_status,
            robot_status,
            power_heat,
            parser: handle.stats(),
        }
    }
}

/// One JSONL line
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    /// RFC 3339 wall-clock time, millisecond precision
    pub timestamp: String,
    pub links: Vec<LinkSnapshot>,
    pub rc_source: Option<RcSource>,
    pub sticks: Option<Sticks>,
    pub referee: Option<RefereeSnapshot>,
}

impl TelemetryRecord {
    /// Capture the current state of every configured link.
    pub fn capture(hub: &RcHub, referee: Option<&RefereeHandle>) -> Self {
        let mut links = Vec::with_capacity(3);
        if let Some(vt03) = hub.vt03() {
            links.push(LinkSnapshot::from(vt03.status().as_ref()));
        }
        if let Some(dr16) = hub.dr16() {
            links.push(LinkSnapshot::from(dr16.status().as_ref()));
        }
        if let Some(referee) = referee {
            links.push(LinkSnapshot::from(referee.status().as_ref()));
        }

        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            links,
            rc_source: hub.active(),
            sticks: hub.sticks(),
            referee: referee.filter(|r| r.is_online()).map(RefereeSnapshot::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::PrioritySequence;
    use crate::rc::{Dr16, RcLink};
    use crate::referee::RefereeLink;
    use std::sync::Arc;

    #[test]
    fn test_capture_with_everything_offline() {
        let seq = Arc::new(PrioritySequence::new());
        let (_rx, _worker, dr16) = RcLink::<Dr16>::new(Arc::clone(&seq)).build();
        let (_ref_rx, _ref_worker, referee) = RefereeLink::new().build();
        let hub = RcHub::new(seq).with_dr16(dr16);

        let record = TelemetryRecord::capture(&hub, Some(&referee));

        assert_eq!(record.links.len(), 2);
        assert_eq!(record.links[0].name, "dr16");
        assert!(record.links.iter().all(|l| !l.online));
        assert!(record.rc_source.is_none());
        assert!(record.sticks.is_none());
        assert!(record.referee.is_none());
        assert!(record.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_record_serializes_as_one_line() {
        let seq = Arc::new(PrioritySequence::new());
        let record = TelemetryRecord::capture(&RcHub::new(seq), None);

        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert!(value["links"].as_array().unwrap().is_empty());
        assert!(value["rc_source"].is_null());
    }
}
