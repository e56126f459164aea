//! # Arena Link Library
//!
//! Radio-control and referee-system link decoding for competitive combat
//! robots.
//!
//! Three serial links feed the robot's control stack: two redundant radio
//! receivers (VT03 and DR16) and the referee-system uplink. This library turns
//! their byte streams into validated, lock-guarded state with per-link
//! liveness, arbitrates between the receivers by priority and provides the
//! outbound referee API.

pub mod clock;
pub mod config;
pub mod crc;
pub mod error;
pub mod input;
pub mod link;
pub mod rc;
pub mod referee;
pub mod serial;
pub mod telemetry;
