//! Configuration file parsing and structures.
//!
//! bleward reads a single TOML file. Only the `[scanner]` section is required; every other
//! section falls back to defaults that match a plain run in the working directory.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use crate::integrations::notify::Config as NotifyConfig;
use crate::integrations::scanner::CommandScannerConfig;

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    pub scanner: CommandScannerConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"bleward::store" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

fn default_known_path() -> PathBuf {
    PathBuf::from("known_devices.csv")
}

fn default_unknown_path() -> PathBuf {
    PathBuf::from("unknown_devices.csv")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("ble_log.csv")
}

/// Locations of the persisted registries and the observation log
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Two-column CSV of `address,tag` (default: "known_devices.csv")
    #[serde(default = "default_known_path")]
    pub known_path: PathBuf,

    /// Deduplicated registry of untagged devices (default: "unknown_devices.csv")
    #[serde(default = "default_unknown_path")]
    pub unknown_path: PathBuf,

    /// Append-only observation log (default: "ble_log.csv")
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Reload the known registry before every Nth cycle; 0 loads it once at start-up
    #[serde(default)]
    pub known_reload_cycles: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            known_path: default_known_path(),
            unknown_path: default_unknown_path(),
            log_path: default_log_path(),
            known_reload_cycles: 0,
        }
    }
}

fn default_scan_interval_secs() -> u64 {
    300
}

fn default_recovery_delay_secs() -> u64 {
    60
}

/// Cycle cadence
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds to sleep after a successful cycle (default: 300)
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Seconds to sleep after a failed cycle (default: 60)
    #[serde(default = "default_recovery_delay_secs")]
    pub recovery_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            recovery_delay_secs: default_recovery_delay_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(self.recovery_delay_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.program.trim().is_empty() {
            return Err(ConfigError::Invalid("scanner.program must not be empty"));
        }
        if self.schedule.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "schedule.scan_interval_secs must be greater than zero",
            ));
        }
        if self.schedule.recovery_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "schedule.recovery_delay_secs must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
