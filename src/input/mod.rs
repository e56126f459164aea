//! # Input Module
//!
//! Logical-event extraction for every physical button, key and switch carried
//! by the radio links.
//!
//! This module handles:
//! - Debouncing momentary buttons and keys
//! - Press / hold / click-repeat classification
//! - Edge transitions of discrete switches

pub mod button;
pub mod switch;

pub use button::{Button, KeyEvent};
pub use switch::{Position, Switch, SwitchEvent};

use crate::config::InputConfig;

/// Time thresholds of the momentary button state machine, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonTiming {
    /// Minimum time a raw level must persist to be accepted
    pub debounce_ms: u64,
    /// Asserted time after which a press becomes a hold
    pub hold_ms: u64,
    /// Time after a release during which a new press counts as a repeat
    pub repeat_window_ms: u64,
}

impl Default for ButtonTiming {
    fn default() -> Self {
        Self {
            debounce_ms: 10,
            hold_ms: 200,
            repeat_window_ms: 220,
        }
    }
}

impl From<&InputConfig> for ButtonTiming {
    fn from(config: &InputConfig) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            hold_ms: config.hold_ms,
            repeat_window_ms: config.repeat_window_ms,
        }
    }
}
