//! Store boundary
//!
//! The rule engines only talk to persistence through `EventStore`. Every
//! mutation that two actors may race on is expressed as a conditional,
//! single-statement update that reports whether it applied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::models::*;
use crate::utils::errors::Result;

#[async_trait]
pub trait EventStore: Send + Sync {
    // Events

    async fn insert_event(&self, event: NewEvent, now: DateTime<Utc>) -> Result<Event>;

    async fn get_event(&self, event_id: i64) -> Result<Option<Event>>;

    /// Events whose status is neither Cancelado nor Concluído
    async fn list_active_events(&self) -> Result<Vec<Event>>;

    async fn list_events_by_creator(&self, creator_id: i64) -> Result<Vec<Event>>;

    /// Aberto events with `start_time <= cutoff`
    async fn list_open_events_starting_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Event>>;

    /// Confirmado or Em Andamento events with `end_time <= cutoff`
    async fn list_stale_events(&self, ended_before: DateTime<Utc>) -> Result<Vec<Event>>;

    /// Set `to` only if the stored status is still `from`
    async fn transition_event_status(
        &self,
        event_id: i64,
        from: EventStatus,
        to: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Move a non-terminal event to Cancelado with the organizer's reason
    async fn cancel_event(&self, event_id: i64, motivo: Option<String>, now: DateTime<Utc>) -> Result<bool>;

    /// `vagas -= 1` if `vagas > 0`; false when the event is full
    async fn take_vacancy(&self, event_id: i64) -> Result<bool>;

    /// `vagas += 1` if `vagas < max_vagas`
    async fn release_vacancy(&self, event_id: i64) -> Result<bool>;

    async fn save_entry_password(&self, event_id: i64, password: &str, now: DateTime<Utc>) -> Result<()>;

    async fn lock_entry(&self, event_id: i64, now: DateTime<Utc>) -> Result<()>;

    /// Delete the event with its participations, waiting list, ratings,
    /// notifications and photos. With `creator_id`, nothing is deleted unless
    /// it matches the stored creator. Returns whether the event row was removed.
    async fn delete_event_cascade(&self, event_id: i64, creator_id: Option<i64>) -> Result<bool>;

    // Participations

    async fn insert_participation(&self, participation: NewParticipation, now: DateTime<Utc>) -> Result<Participation>;

    async fn get_participation(&self, participation_id: i64) -> Result<Option<Participation>>;

    /// The pendente or aprovado participation of a user in an event
    async fn find_active_participation(&self, event_id: i64, user_id: i64) -> Result<Option<Participation>>;

    async fn list_participations(&self, event_id: i64) -> Result<Vec<Participation>>;

    /// Non-terminal events in which the user holds an approved participation
    async fn list_user_commitments(&self, user_id: i64) -> Result<Vec<Event>>;

    /// Set `to` only if the stored status is still `from`
    async fn transition_participation(
        &self,
        participation_id: i64,
        from: ParticipationStatus,
        to: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    async fn confirm_presence(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()>;

    async fn grant_access(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()>;

    async fn mark_evaluation_done(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()>;

    // Waiting list

    /// Append at `last position + 1`, or return the existing entry
    async fn enqueue_waiting(&self, event_id: i64, user_id: i64, now: DateTime<Utc>) -> Result<WaitingListEntry>;

    async fn find_waiting_entry(&self, event_id: i64, user_id: i64) -> Result<Option<WaitingListEntry>>;

    /// Entries of one event ordered by position
    async fn list_waiting_entries(&self, event_id: i64) -> Result<Vec<WaitingListEntry>>;

    async fn mark_waiting_notified(&self, entry_id: i64, now: DateTime<Utc>) -> Result<()>;

    /// Remove the entry and renumber the rest of its queue 1..N
    async fn remove_waiting_entry(&self, entry_id: i64) -> Result<bool>;

    /// Clear `notified` on entries notified before the cutoff; returns the affected event ids
    async fn requeue_stale_waiting_entries(&self, notified_before: DateTime<Utc>) -> Result<Vec<i64>>;

    // Ratings

    async fn upsert_rating(&self, rating: NewRating, now: DateTime<Utc>) -> Result<Rating>;

    async fn list_ratings_by_rater(&self, event_id: i64, rater_id: i64) -> Result<Vec<Rating>>;

    // Trust profiles

    async fn get_trust_profile(&self, user_id: i64) -> Result<Option<TrustProfile>>;

    /// `trust_score = max(0, trust_score - 1)`, creating a fresh profile first if
    /// needed; `is_banned` follows the score in the same write
    async fn decrement_trust_score(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrustProfile>;

    /// Force score 0 and `is_banned = true`
    async fn ban_user(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrustProfile>;

    /// Full reset to the maximum score, recorded against the payment
    async fn restore_trust_profile(&self, user_id: i64, payment_id: &str, now: DateTime<Utc>) -> Result<TrustProfile>;

    // Notification outbox

    async fn enqueue_notification(&self, notice: Notice, now: DateTime<Utc>) -> Result<Notification>;

    async fn list_undelivered_notifications(&self, limit: i64) -> Result<Vec<Notification>>;

    async fn list_notifications_for_user(&self, user_id: i64) -> Result<Vec<Notification>>;

    async fn mark_notification_delivered(&self, notification_id: i64, now: DateTime<Utc>) -> Result<()>;

    async fn record_delivery_failure(&self, notification_id: i64) -> Result<()>;
}
