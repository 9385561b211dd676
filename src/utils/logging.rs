//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the Encontro rule engine.

use tracing::{info, warn, error, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::models::{EventStatus, ParticipationStatus};
use crate::utils::errors::{EncontroError, Result};

/// Initialize logging based on configuration
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, "encontro.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .map_err(|e| EncontroError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log an event status transition
pub fn log_status_transition(event_id: i64, from: EventStatus, to: EventStatus) {
    info!(
        event_id = event_id,
        from = from.as_str(),
        to = to.as_str(),
        "Event status changed"
    );
}

/// Log a participation state change
pub fn log_participation_action(
    participation_id: i64,
    event_id: i64,
    user_id: i64,
    status: ParticipationStatus,
    action: &str,
) {
    info!(
        participation_id = participation_id,
        event_id = event_id,
        user_id = user_id,
        status = status.as_str(),
        action = action,
        "Participation action performed"
    );
}

/// Log a refused command
pub fn log_rejection(action: &str, event_id: Option<i64>, user_id: Option<i64>, reason: &str) {
    debug!(
        action = action,
        event_id = event_id,
        user_id = user_id,
        reason = reason,
        "Command rejected"
    );
}

/// Log organizer actions on an event
pub fn log_event_action(event_id: i64, action: &str, user_id: i64, details: Option<&str>) {
    info!(
        event_id = event_id,
        action = action,
        user_id = user_id,
        details = details,
        "Event action performed"
    );
}

/// Log trust score changes
pub fn log_trust_change(user_id: i64, trust_score: i32, is_banned: bool, cause: &str) {
    if is_banned {
        warn!(
            user_id = user_id,
            trust_score = trust_score,
            cause = cause,
            "User is banned"
        );
    } else {
        info!(
            user_id = user_id,
            trust_score = trust_score,
            cause = cause,
            "Trust score updated"
        );
    }
}

/// Log the summary of a periodic pass
pub fn log_sweep_result(pass: &str, examined: usize, changed: usize, failed: usize) {
    if failed > 0 {
        warn!(
            pass = pass,
            examined = examined,
            changed = changed,
            failed = failed,
            "Periodic pass completed with failures"
        );
    } else {
        debug!(
            pass = pass,
            examined = examined,
            changed = changed,
            "Periodic pass completed"
        );
    }
}

/// Log a per-item failure inside a batch pass
pub fn log_item_failure(pass: &str, event_id: i64, error: &EncontroError) {
    error!(
        pass = pass,
        event_id = event_id,
        error = %error,
        severity = %error.severity(),
        "Failed to process event"
    );
}
