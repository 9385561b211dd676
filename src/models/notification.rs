//! Notification model

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::utils::errors::EncontroError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationReceived,
    ApplicationApproved,
    ApplicationRejected,
    ParticipationCancelled,
    WaitingListPromoted,
    EventCancelled,
    EventDeleted,
    CrusherInvite,
    CrusherAccepted,
    CrusherDeclined,
    UserBanned,
    UserUnbanned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ApplicationReceived => "application_received",
            NotificationKind::ApplicationApproved => "application_approved",
            NotificationKind::ApplicationRejected => "application_rejected",
            NotificationKind::ParticipationCancelled => "participation_cancelled",
            NotificationKind::WaitingListPromoted => "waiting_list_promoted",
            NotificationKind::EventCancelled => "event_cancelled",
            NotificationKind::EventDeleted => "event_deleted",
            NotificationKind::CrusherInvite => "crusher_invite",
            NotificationKind::CrusherAccepted => "crusher_accepted",
            NotificationKind::CrusherDeclined => "crusher_declined",
            NotificationKind::UserBanned => "user_banned",
            NotificationKind::UserUnbanned => "user_unbanned",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = EncontroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "application_received" => NotificationKind::ApplicationReceived,
            "application_approved" => NotificationKind::ApplicationApproved,
            "application_rejected" => NotificationKind::ApplicationRejected,
            "participation_cancelled" => NotificationKind::ParticipationCancelled,
            "waiting_list_promoted" => NotificationKind::WaitingListPromoted,
            "event_cancelled" => NotificationKind::EventCancelled,
            "event_deleted" => NotificationKind::EventDeleted,
            "crusher_invite" => NotificationKind::CrusherInvite,
            "crusher_accepted" => NotificationKind::CrusherAccepted,
            "crusher_declined" => NotificationKind::CrusherDeclined,
            "user_banned" => NotificationKind::UserBanned,
            "user_unbanned" => NotificationKind::UserUnbanned,
            other => return Err(EncontroError::InvalidInput(format!("Unknown notification kind: {}", other))),
        };
        Ok(kind)
    }
}

/// A notice to deliver to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub user_id: i64,
    pub event_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(user_id: i64, event_id: Option<i64>, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            event_id,
            kind,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Outbox row: a persisted notice and its delivery state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub event_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub delivered: bool,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}
