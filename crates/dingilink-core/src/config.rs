//! Configuration module for Dingilink
//!
//! This module defines the configuration structures for the batching,
//! messaging and pagination components. Configuration is read from a TOML
//! file and `DINGILINK_` prefixed environment variables, with nested keys
//! separated by a double underscore (`DINGILINK_MESSAGING__CHANNEL_CAPACITY`).

use std::path::Path;
use std::time::Duration;

use dingilink_common::{DingilinkError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::pagination::DEFAULT_PAGE_LIMIT;

/// Server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Batch loader configuration
    pub loader: LoaderConfig,

    /// Event delivery configuration
    pub messaging: MessagingConfig,

    /// History pagination configuration
    pub pagination: PaginationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Batch loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// How long a window stays open after its first load, in milliseconds.
    /// Zero flushes once a scheduling tick passes without new loads.
    pub batch_delay_ms: u64,

    /// A window holding this many distinct keys flushes immediately
    pub max_batch_size: usize,
}

/// Event delivery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Capacity of each subscriber's inbound channel
    pub channel_capacity: usize,

    /// How long a publish may wait on a full subscriber channel, in milliseconds
    pub send_timeout_ms: u64,

    /// Prefix of per-user event topics
    pub topic_prefix: String,
}

/// History pagination configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when a query does not ask for one
    pub default_limit: i64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter, in `EnvFilter` syntax
    pub level: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_delay_ms: 16,
            max_batch_size: 100,
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            send_timeout_ms: 5_000,
            topic_prefix: "user".to_string(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl MessagingConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file, overridden by the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DINGILINK_").split("__"))
            .extract()
            .map_err(|e| DingilinkError::Config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.loader.max_batch_size == 0 {
            return Err(DingilinkError::Config("max_batch_size cannot be 0".into()));
        }
        if self.messaging.channel_capacity == 0 {
            return Err(DingilinkError::Config("channel_capacity cannot be 0".into()));
        }
        if self.messaging.topic_prefix.is_empty() {
            return Err(DingilinkError::Config("topic_prefix cannot be empty".into()));
        }
        if self.pagination.default_limit <= 0 {
            return Err(DingilinkError::Config("default_limit must be positive".into()));
        }
        Ok(())
    }
}
