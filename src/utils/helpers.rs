//! Helper functions and utilities
//!
//! Time arithmetic shared by the rule engines, and small formatting helpers.

use chrono::{DateTime, Duration, Utc};

/// Fractional hours from `now` until `target` (negative once `target` has passed)
pub fn hours_until(now: DateTime<Utc>, target: DateTime<Utc>) -> f64 {
    target.signed_duration_since(now).num_milliseconds() as f64 / 3_600_000.0
}

/// Whether two half-open intervals `[a_start, a_end)` and `[b_start, b_end)` overlap
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Whether `now` is at least `gap` before `target`
pub fn is_before_by(now: DateTime<Utc>, target: DateTime<Utc>, gap: Duration) -> bool {
    now < target - gap
}

/// Format a timestamp for display
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%d/%m/%Y %H:%M UTC").to_string()
}

/// Format a fractional hour amount the way rejection reasons show it
pub fn format_hours(hours: f64) -> String {
    format!("{:.1}h", hours)
}

/// Truncate text to a maximum length with ellipsis
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_length.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
