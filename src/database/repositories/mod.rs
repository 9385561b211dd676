//! Database repositories module
//! 
//! This module contains all repository implementations for data access

pub mod event;
pub mod participation;
pub mod waiting_list;
pub mod rating;
pub mod trust;
pub mod notification;

// Re-export repositories
pub use event::EventRepository;
pub use participation::ParticipationRepository;
pub use waiting_list::WaitingListRepository;
pub use rating::RatingRepository;
pub use trust::TrustRepository;
pub use notification::NotificationRepository;
