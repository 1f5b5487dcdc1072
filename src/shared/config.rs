//! Core configuration module
//!
//! Provides configuration types for the lock manager and change tracker,
//! with defaults suitable for interactive editing sessions and a TOML
//! loader for deployments that tune the maintenance cadences.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Lock manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Default lock TTL in milliseconds, used when a request leaves it unset
    pub default_ttl_ms: u64,
    /// Interval of the expiry sweep in milliseconds
    pub expiry_sweep_interval_ms: u64,
    /// Interval of the queue-reprocessing loop in milliseconds
    pub queue_interval_ms: u64,
    /// Interval of the deadlock detector in milliseconds (longer cadence)
    pub deadlock_interval_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 300_000,
            expiry_sweep_interval_ms: 2_000,
            queue_interval_ms: 1_000,
            deadlock_interval_ms: 5_000,
            event_capacity: 256,
        }
    }
}

impl LockConfig {
    /// Default lock TTL as a `Duration`
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Expiry sweep interval as a `Duration`
    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_sweep_interval_ms)
    }

    /// Queue-reprocessing interval as a `Duration`
    pub fn queue_interval(&self) -> Duration {
        Duration::from_millis(self.queue_interval_ms)
    }

    /// Deadlock-detection interval as a `Duration`
    pub fn deadlock_interval(&self) -> Duration {
        Duration::from_millis(self.deadlock_interval_ms)
    }
}

/// Change tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of tracked changes before oldest-first eviction
    pub capacity: usize,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            event_capacity: 64,
        }
    }
}

/// Aggregate configuration for the concurrency core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabConfig {
    /// Lock manager settings
    pub locks: LockConfig,
    /// Change tracker settings
    pub history: HistoryConfig,
}

impl CollabConfig {
    /// Parse a configuration from a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locks.expiry_sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidValue("locks.expiry_sweep_interval_ms"));
        }
        if self.locks.queue_interval_ms == 0 {
            return Err(ConfigError::InvalidValue("locks.queue_interval_ms"));
        }
        if self.locks.deadlock_interval_ms == 0 {
            return Err(ConfigError::InvalidValue("locks.deadlock_interval_ms"));
        }
        if self.locks.event_capacity == 0 {
            return Err(ConfigError::InvalidValue("locks.event_capacity"));
        }
        if self.history.capacity == 0 {
            return Err(ConfigError::InvalidValue("history.capacity"));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    Parse(String),
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
}
