//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod event;
pub mod participation;
pub mod waiting_list;
pub mod rating;
pub mod trust;
pub mod notification;

// Re-export commonly used models
pub use event::{Event, EventStatus, EventType, NewEvent};
pub use participation::{Participation, ParticipationStatus, NewParticipation};
pub use waiting_list::WaitingListEntry;
pub use rating::{Rating, RatingType, NewRating};
pub use trust::{TrustProfile, MAX_TRUST_SCORE};
pub use notification::{Notification, NotificationKind, Notice};
