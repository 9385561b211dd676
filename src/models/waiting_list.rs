//! Waiting list model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Queue entry for a full event
///
/// Positions within one event's queue are always 1..=N without gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitingListEntry {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub position: i32,
    pub notified: bool,
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
