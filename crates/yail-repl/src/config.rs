//! Sync session configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_PORT: u16 = 8001;
pub const COMPANION_PACKAGE: &str = "edu.mit.appinventor.aicompanion3";
pub const COMPANION_ACTIVITY: &str = ".Screen1";

const TROUBLESHOOTING: &str = "Unable to reach the companion on the device. \
    Check that the device is plugged in, USB debugging is enabled, \
    and the companion app is installed.";

/// Retry schedule used when reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub attempts: u32,
    pub initial_delay_ms: u64,
    pub factor: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            initial_delay_ms: 3000,
            factor: 2,
        }
    }
}

impl BackoffPolicy {
    /// Delay before each retry: 3, 6, 12, 24 seconds by default.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delay = self.initial_delay_ms;
        (0..self.attempts)
            .map(|_| {
                let d = Duration::from_millis(delay);
                delay = delay.saturating_mul(u64::from(self.factor));
                d
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local and device port of the REPL socket.
    pub port: u16,
    pub app_package: String,
    pub app_activity: String,
    pub backoff: BackoffPolicy,
    pub queue_shutdown_timeout_ms: u64,
    /// Shown when every reconnect attempt fails.
    pub troubleshooting_message: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            app_package: COMPANION_PACKAGE.to_string(),
            app_activity: COMPANION_ACTIVITY.to_string(),
            backoff: BackoffPolicy::default(),
            queue_shutdown_timeout_ms: 5000,
            troubleshooting_message: TROUBLESHOOTING.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn queue_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_shutdown_timeout_ms)
    }
}
