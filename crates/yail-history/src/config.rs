//! Auto-save configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Most history entries kept; the oldest is evicted first.
    pub capacity: usize,
    /// Quiet time after the last change before an idle save is due.
    pub idle_seconds: u64,
    /// Consecutive save failures before saving is reported as fatal.
    pub save_failure_limit: u32,
    pub tick_interval_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            idle_seconds: 5,
            save_failure_limit: 3,
            tick_interval_ms: 1000,
        }
    }
}

impl AutoSaveConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_seconds)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AutoSaveConfig::from_json("{}").unwrap();
        assert_eq!(config.capacity, 20);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_override() {
        let config = AutoSaveConfig::from_json(r#"{ "save_failure_limit": 5 }"#).unwrap();
        assert_eq!(config.save_failure_limit, 5);
        assert_eq!(config.idle_seconds, 5);
    }
}
