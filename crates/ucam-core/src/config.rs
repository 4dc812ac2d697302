//! Session configuration
//!
//! Port, retry and timing settings for a camera session, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::protocol::{
    Backoff, PortSettings, BACKOFF_BASE_MS, BACKOFF_STEP_MS, BAUD_SETTLE_MS, DEFAULT_BAUD_RATE,
    DEFAULT_READ_TIMEOUT_MS, MAX_ATTEMPTS, SHUTTER_DELAY_MS, SYNC_SETTLE_MS,
};

/// Settings for one camera session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate used to open the port
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Attempts per command before giving up
    pub max_attempts: u32,
    /// Backoff after the first failed attempt, in milliseconds
    pub backoff_base_ms: u64,
    /// Backoff growth per failed attempt, in milliseconds
    pub backoff_step_ms: u64,
    /// Wait after SYNC before the first command
    pub sync_settle_ms: u64,
    /// Wait after reopening the port at a new baud rate
    pub baud_settle_ms: u64,
    /// Wait after SNAPSHOT before the picture is available
    pub shutter_delay_ms: u64,
    /// Log every frame sent and received
    pub logging: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_attempts: MAX_ATTEMPTS,
            backoff_base_ms: BACKOFF_BASE_MS,
            backoff_step_ms: BACKOFF_STEP_MS,
            sync_settle_ms: SYNC_SETTLE_MS,
            baud_settle_ms: BAUD_SETTLE_MS,
            shutter_delay_ms: SHUTTER_DELAY_MS,
            logging: false,
        }
    }
}

impl SessionConfig {
    /// Defaults for the given port
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Settings for opening the port at the configured baud rate
    pub fn port_settings(&self) -> PortSettings {
        PortSettings {
            port_name: self.port_name.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    /// Retry backoff at its baseline
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_step_ms),
        )
    }

    /// Wait after the SYNC handshake
    pub fn sync_settle(&self) -> Duration {
        Duration::from_millis(self.sync_settle_ms)
    }

    /// Wait after reopening at a new baud rate
    pub fn baud_settle(&self) -> Duration {
        Duration::from_millis(self.baud_settle_ms)
    }

    /// Wait after SNAPSHOT
    pub fn shutter_delay(&self) -> Duration {
        Duration::from_millis(self.shutter_delay_ms)
    }
}
