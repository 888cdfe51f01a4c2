//! Discovery through an external scan command.
//!
//! The command performs one discovery pass and prints newline-delimited JSON on stdout, one
//! object per device:
//!
//! ```text
//! {"type":"ble","mac":"D4:CA:6E:12:34:56","name":"","rssi":-65,"mfr":76}
//! ```
//!
//! `mac` (or `address`) and `rssi` are required, `name` is optional. Objects whose `type` is
//! present and not `"ble"` are ignored, so mixed WiFi/BLE streams can be piped in unchanged.
//! Every other field becomes device metadata, in document order.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::ScanError;
use super::Scanner;
use crate::device::DiscoveredDevice;
use crate::device::Metadata;

fn default_timeout_secs() -> u64 {
    60
}

/// Configuration for the command scanner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Program to run for each discovery pass
    pub program: String,

    /// Arguments passed to the program
    #[serde(default)]
    pub args: Vec<String>,

    /// Seconds to wait for the program before the pass is abandoned (default: 60)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Scanner that runs an external command once per cycle.
#[derive(Debug)]
pub struct CommandScanner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandScanner {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    /// Override the timeout (used by tests to avoid long waits)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    fn name(&self) -> &str {
        &self.program
    }

    async fn discover(&mut self) -> Result<Vec<DiscoveredDevice>, ScanError> {
        debug!("Running scan command: {} {:?}", self.program, self.args);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ScanError::Timeout(self.program.clone(), self.timeout))?
            .map_err(|e| ScanError::Spawn(self.program.clone(), e))?;

        if !output.status.success() {
            return Err(ScanError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let devices = parse_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!("Scan command reported {} devices", devices.len());
        Ok(devices)
    }
}

fn parse_output(stdout: &str) -> Result<Vec<DiscoveredDevice>, ScanError> {
    let mut devices = Vec::new();
    for (idx, line) in stdout.lines().enumerate() {
        match parse_discovery_line(line) {
            Ok(Some(device)) => devices.push(device),
            Ok(None) => {}
            Err(message) => {
                return Err(ScanError::InvalidRecord {
                    line: idx + 1,
                    message,
                })
            }
        }
    }
    Ok(devices)
}

/// Parse one NDJSON discovery line.
///
/// Returns `Ok(None)` for blank lines and for non-BLE records.
pub fn parse_discovery_line(line: &str) -> Result<Option<DiscoveredDevice>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let fields = match serde_json::from_str::<Value>(line).map_err(|e| e.to_string())? {
        Value::Object(fields) => fields,
        other => return Err(format!("expected a JSON object, found {}", other)),
    };

    let mut kind = None;
    let mut address = None;
    let mut name = None;
    let mut rssi = None;
    let mut metadata = Metadata::new();

    for (key, value) in fields {
        match key.as_str() {
            "type" => kind = value.as_str().map(str::to_string),
            "mac" | "address" => address = value.as_str().map(str::to_string),
            "name" => name = value.as_str().map(str::to_string),
            "rssi" => rssi = Some(value),
            _ => {
                if let Some(text) = metadata_text(&value) {
                    metadata.insert(key, text);
                }
            }
        }
    }

    if kind.as_deref().is_some_and(|k| k != "ble") {
        return Ok(None);
    }

    let address = address
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| "missing device address".to_string())?;
    let rssi = rssi
        .as_ref()
        .and_then(Value::as_i64)
        .ok_or_else(|| "missing or non-integer rssi".to_string())?;
    let rssi = i16::try_from(rssi).map_err(|_| format!("rssi {} out of range", rssi))?;

    Ok(Some(DiscoveredDevice {
        address,
        name,
        rssi,
        metadata: (!metadata.is_empty()).then_some(metadata),
    }))
}

fn metadata_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
