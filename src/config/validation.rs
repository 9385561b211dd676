//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{EncontroError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_logging_config(&settings.logging)?;
    validate_scheduler_config(&settings.scheduler)?;
    validate_retry_config(&settings.retry)?;
    validate_waiting_list_config(&settings.waiting_list)?;

    if let Some(ref push_config) = settings.push {
        validate_push_config(push_config)?;
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(EncontroError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(EncontroError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(EncontroError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(EncontroError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(EncontroError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    if config.directory.is_empty() {
        return Err(EncontroError::Config(
            "Log directory is required".to_string()
        ));
    }

    Ok(())
}

/// Validate scheduler intervals
fn validate_scheduler_config(config: &super::SchedulerConfig) -> Result<()> {
    let intervals = [
        ("status_interval_secs", config.status_interval_secs),
        ("auto_delete_interval_secs", config.auto_delete_interval_secs),
        ("auto_finalize_interval_secs", config.auto_finalize_interval_secs),
        ("outbox_interval_secs", config.outbox_interval_secs),
        ("waiting_list_requeue_interval_secs", config.waiting_list_requeue_interval_secs),
    ];

    for (name, value) in intervals {
        if value == 0 {
            return Err(EncontroError::Config(
                format!("Scheduler interval {} must be greater than 0", name)
            ));
        }
    }

    Ok(())
}

/// Validate retry configuration
fn validate_retry_config(config: &super::RetryConfig) -> Result<()> {
    if config.fetch_attempts == 0 || config.delivery_attempts == 0 {
        return Err(EncontroError::Config(
            "Retry attempts must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate waiting list configuration
fn validate_waiting_list_config(config: &super::WaitingListConfig) -> Result<()> {
    if config.requeue_after_minutes <= 0 {
        return Err(EncontroError::Config(
            "Waiting list requeue delay must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate push gateway configuration
fn validate_push_config(config: &super::PushConfig) -> Result<()> {
    if config.gateway_url.is_empty() {
        return Err(EncontroError::Config(
            "Push gateway URL is required".to_string()
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(EncontroError::Config(
            "Push gateway timeout must be greater than 0".to_string()
        ));
    }

    if config.batch_size <= 0 {
        return Err(EncontroError::Config(
            "Push batch size must be greater than 0".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushConfig;

    #[test]
    fn test_rejects_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_pool_bounds() {
        let mut settings = Settings::default();
        settings.database.min_connections = 20;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let mut settings = Settings::default();
        settings.scheduler.auto_delete_interval_secs = 0;
        let err = validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("auto_delete_interval_secs"));
    }

    #[test]
    fn test_rejects_empty_push_url() {
        let mut settings = Settings::default();
        settings.push = Some(PushConfig {
            gateway_url: String::new(),
            api_key: None,
            timeout_seconds: 5,
            batch_size: 10,
        });
        assert!(validate_settings(&settings).is_err());
    }
}
