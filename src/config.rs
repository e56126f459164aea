//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ArenaLinkError, Result};
use crate::referee::CmdId;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub rc: RcConfig,
    pub referee: RefereeConfig,
    pub input: InputConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Radio receiver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RcConfig {
    #[serde(default = "default_vt03")]
    pub vt03: Vt03Config,

    #[serde(default = "default_dr16")]
    pub dr16: Dr16Config,
}

/// VT03 receiver (primary source)
#[derive(Debug, Deserialize, Clone)]
pub struct Vt03Config {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_vt03_port")]
    pub port: String,

    #[serde(default = "default_vt03_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_vt03_timeout_ms")]
    pub timeout_ms: u64,
}

/// DR16 receiver (fallback source)
#[derive(Debug, Deserialize, Clone)]
pub struct Dr16Config {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_dr16_port")]
    pub port: String,

    #[serde(default = "default_dr16_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_dr16_timeout_ms")]
    pub timeout_ms: u64,
}

/// Referee-system link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RefereeConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_referee_port")]
    pub port: String,

    #[serde(default = "default_referee_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_referee_timeout_ms")]
    pub timeout_ms: u64,

    /// Own robot id; 0 until the robot status record reports it
    #[serde(default)]
    pub robot_id: u16,

    /// Commands that update the store (empty = all)
    #[serde(default)]
    pub subscriptions: Vec<CmdId>,
}

/// Button and key timing
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,

    #[serde(default = "default_repeat_window_ms")]
    pub repeat_window_ms: u64,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,
}

/// Diagnostic log configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory of the daily-rolling log file; console only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_enabled() -> bool { true }

fn default_vt03() -> Vt03Config {
    Vt03Config {
        enabled: default_enabled(),
        port: default_vt03_port(),
        baud_rate: default_vt03_baud_rate(),
        timeout_ms: default_vt03_timeout_ms(),
    }
}
fn default_vt03_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_vt03_baud_rate() -> u32 { crate::rc::vt03::BAUD_RATE }
fn default_vt03_timeout_ms() -> u64 { 120 }

fn default_dr16() -> Dr16Config {
    Dr16Config {
        enabled: default_enabled(),
        port: default_dr16_port(),
        baud_rate: default_dr16_baud_rate(),
        timeout_ms: default_dr16_timeout_ms(),
    }
}
fn default_dr16_port() -> String { "/dev/ttyUSB1".to_string() }
fn default_dr16_baud_rate() -> u32 { crate::rc::dr16::BAUD_RATE }
fn default_dr16_timeout_ms() -> u64 { 100 }

fn default_referee_port() -> String { "/dev/ttyUSB2".to_string() }
fn default_referee_baud_rate() -> u32 { crate::referee::protocol::BAUD_RATE }
fn default_referee_timeout_ms() -> u64 { 2000 }

fn default_debounce_ms() -> u64 { 10 }
fn default_hold_ms() -> u64 { 200 }
fn default_repeat_window_ms() -> u64 { 220 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }

fn invalid(msg: impl std::fmt::Display) -> ArenaLinkError {
    ArenaLinkError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arena_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        let links = [
            ("rc.vt03", self.rc.vt03.enabled, &self.rc.vt03.port, self.rc.vt03.timeout_ms),
            ("rc.dr16", self.rc.dr16.enabled, &self.rc.dr16.port, self.rc.dr16.timeout_ms),
            ("referee", self.referee.enabled, &self.referee.port, self.referee.timeout_ms),
        ];

        for (name, enabled, port, timeout_ms) in links {
            if enabled && port.is_empty() {
                return Err(invalid(format!("{} port cannot be empty when enabled", name)));
            }
            if timeout_ms == 0 || timeout_ms > 10000 {
                return Err(invalid(format!("{} timeout_ms must be between 1 and 10000", name)));
            }
        }

        if self.rc.vt03.enabled && self.rc.dr16.enabled && self.rc.vt03.port == self.rc.dr16.port {
            return Err(invalid("rc.vt03 and rc.dr16 cannot share a port"));
        }

        // Validate baud rates
        if ![115200, 460800, 921600, 1000000].contains(&self.rc.vt03.baud_rate) {
            return Err(invalid("rc.vt03 baud_rate must be one of: 115200, 460800, 921600, 1000000"));
        }

        if self.rc.dr16.baud_rate != crate::rc::dr16::BAUD_RATE {
            return Err(invalid("rc.dr16 baud_rate must be 100000"));
        }

        if ![9600, 57600, 115200, 230400].contains(&self.referee.baud_rate) {
            return Err(invalid("referee baud_rate must be one of: 9600, 57600, 115200, 230400"));
        }

        // Robot ids: red 1..=11, blue 101..=111, 0 = not known yet
        let id = self.referee.robot_id;
        if id != 0 && !crate::referee::protocol::is_robot_id(id) {
            return Err(invalid(format!("referee robot_id {} is not a robot id (1-11 or 101-111)", id)));
        }

        // Validate input timing
        if self.input.debounce_ms >= self.input.hold_ms {
            return Err(invalid("input debounce_ms must be less than hold_ms"));
        }

        if self.input.repeat_window_ms == 0 {
            return Err(invalid("input repeat_window_ms must be greater than 0"));
        }

        if self.input.hold_ms > 10000 || self.input.repeat_window_ms > 10000 {
            return Err(invalid("input hold_ms and repeat_window_ms must be at most 10000"));
        }

        // Validate telemetry configuration
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if matches!(&self.logging.dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging dir cannot be empty"));
        }

        Ok(())
    }
}

impl Vt03Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Dr16Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RefereeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
