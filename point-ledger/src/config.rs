//! Configuration for the point ledger

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Per-user lock configuration
    pub lock: LockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "point-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            lock: LockConfig::default(),
        }
    }
}

/// Per-user lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Maximum wait for a user's lock (milliseconds)
    pub timeout_ms: u64,

    /// Drop lock entries once no operation references them
    pub evict_idle: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000, // 10s
            evict_idle: true,
        }
    }
}

impl LockConfig {
    /// Lock wait as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(timeout) = std::env::var("POINT_LOCK_TIMEOUT_MS") {
            config.lock.timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid POINT_LOCK_TIMEOUT_MS {:?}: {}", timeout, e))
            })?;
        }

        if let Ok(evict) = std::env::var("POINT_LOCK_EVICT_IDLE") {
            config.lock.evict_idle = evict.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid POINT_LOCK_EVICT_IDLE {:?}: {}", evict, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.lock.timeout_ms == 0 {
            return Err(crate::Error::Config(
                "lock.timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
