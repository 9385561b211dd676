//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::utils::retry::RetryPolicy;

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub retry: RetryConfig,
    pub entry: EntryConfig,
    pub waiting_list: WaitingListConfig,
    pub push: Option<PushConfig>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub json: bool,
}

/// Periodic pass intervals, in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    pub status_interval_secs: u64,
    pub auto_delete_interval_secs: u64,
    pub auto_finalize_interval_secs: u64,
    pub outbox_interval_secs: u64,
    pub waiting_list_requeue_interval_secs: u64,
}

/// Bounded retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub fetch_attempts: u32,
    pub fetch_backoff_ms: u64,
    pub delivery_attempts: u32,
    pub delivery_backoff_ms: u64,
}

/// Entry gate configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntryConfig {
    /// Password attempts allowed per participant and event per minute, 0 disables the limit
    pub max_attempts_per_minute: u32,
}

/// Waiting list configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaitingListConfig {
    pub requeue_after_minutes: i64,
}

/// Push gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub batch_size: i64,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::from_file("config")
    }

    /// Load settings from the given file (extension optional) layered under the environment
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Settings::default())?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ENCONTRO").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::EncontroError> {
        super::validation::validate_settings(self)
    }
}

impl SchedulerConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn auto_delete_interval(&self) -> Duration {
        Duration::from_secs(self.auto_delete_interval_secs)
    }

    pub fn auto_finalize_interval(&self) -> Duration {
        Duration::from_secs(self.auto_finalize_interval_secs)
    }

    pub fn outbox_interval(&self) -> Duration {
        Duration::from_secs(self.outbox_interval_secs)
    }

    pub fn waiting_list_requeue_interval(&self) -> Duration {
        Duration::from_secs(self.waiting_list_requeue_interval_secs)
    }
}

impl RetryConfig {
    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch_attempts, Duration::from_millis(self.fetch_backoff_ms))
    }

    pub fn delivery_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.delivery_attempts, Duration::from_millis(self.delivery_backoff_ms))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/encontro".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
                json: false,
            },
            scheduler: SchedulerConfig {
                status_interval_secs: 60,
                auto_delete_interval_secs: 120,
                auto_finalize_interval_secs: 6 * 60 * 60,
                outbox_interval_secs: 30,
                waiting_list_requeue_interval_secs: 600,
            },
            retry: RetryConfig {
                fetch_attempts: 3,
                fetch_backoff_ms: 2000,
                delivery_attempts: 2,
                delivery_backoff_ms: 1000,
            },
            entry: EntryConfig {
                max_attempts_per_minute: 5,
            },
            waiting_list: WaitingListConfig {
                requeue_after_minutes: 30,
            },
            push: None,
        }
    }
}
