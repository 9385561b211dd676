//! Database service layer
//!
//! Aggregates the PostgreSQL repositories behind the `EventStore` boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::database::{
    DatabasePool, EventRepository, EventStore, NotificationRepository, ParticipationRepository,
    RatingRepository, TrustRepository, WaitingListRepository,
};
use crate::models::*;
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub events: EventRepository,
    pub participations: ParticipationRepository,
    pub waiting_list: WaitingListRepository,
    pub ratings: RatingRepository,
    pub trust: TrustRepository,
    pub notifications: NotificationRepository,
    pool: DatabasePool,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            events: EventRepository::new(pool.clone()),
            participations: ParticipationRepository::new(pool.clone()),
            waiting_list: WaitingListRepository::new(pool.clone()),
            ratings: RatingRepository::new(pool.clone()),
            trust: TrustRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for DatabaseService {
    async fn insert_event(&self, event: NewEvent, now: DateTime<Utc>) -> Result<Event> {
        self.events.create(event, now).await
    }

    async fn get_event(&self, event_id: i64) -> Result<Option<Event>> {
        self.events.find_by_id(event_id).await
    }

    async fn list_active_events(&self) -> Result<Vec<Event>> {
        self.events.list_active().await
    }

    async fn list_events_by_creator(&self, creator_id: i64) -> Result<Vec<Event>> {
        self.events.list_by_creator(creator_id).await
    }

    async fn list_open_events_starting_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Event>> {
        self.events.list_open_starting_before(cutoff).await
    }

    async fn list_stale_events(&self, ended_before: DateTime<Utc>) -> Result<Vec<Event>> {
        self.events.list_stale(ended_before).await
    }

    async fn transition_event_status(
        &self,
        event_id: i64,
        from: EventStatus,
        to: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.events.transition_status(event_id, from, to, now).await
    }

    async fn cancel_event(&self, event_id: i64, motivo: Option<String>, now: DateTime<Utc>) -> Result<bool> {
        self.events.cancel(event_id, motivo, now).await
    }

    async fn take_vacancy(&self, event_id: i64) -> Result<bool> {
        self.events.take_vacancy(event_id).await
    }

    async fn release_vacancy(&self, event_id: i64) -> Result<bool> {
        self.events.release_vacancy(event_id).await
    }

    async fn save_entry_password(&self, event_id: i64, password: &str, now: DateTime<Utc>) -> Result<()> {
        self.events.save_entry_password(event_id, password, now).await
    }

    async fn lock_entry(&self, event_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.events.lock_entry(event_id, now).await
    }

    async fn delete_event_cascade(&self, event_id: i64, creator_id: Option<i64>) -> Result<bool> {
        self.events.delete_cascade(event_id, creator_id).await
    }

    async fn insert_participation(&self, participation: NewParticipation, now: DateTime<Utc>) -> Result<Participation> {
        self.participations.create(participation, now).await
    }

    async fn get_participation(&self, participation_id: i64) -> Result<Option<Participation>> {
        self.participations.find_by_id(participation_id).await
    }

    async fn find_active_participation(&self, event_id: i64, user_id: i64) -> Result<Option<Participation>> {
        self.participations.find_active(event_id, user_id).await
    }

    async fn list_participations(&self, event_id: i64) -> Result<Vec<Participation>> {
        self.participations.list_for_event(event_id).await
    }

    async fn list_user_commitments(&self, user_id: i64) -> Result<Vec<Event>> {
        self.events.list_committed_for_user(user_id).await
    }

    async fn transition_participation(
        &self,
        participation_id: i64,
        from: ParticipationStatus,
        to: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.participations.transition_status(participation_id, from, to, now).await
    }

    async fn confirm_presence(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.participations.confirm_presence(participation_id, now).await
    }

    async fn grant_access(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.participations.grant_access(participation_id, now).await
    }

    async fn mark_evaluation_done(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.participations.mark_evaluation_done(participation_id, now).await
    }

    async fn enqueue_waiting(&self, event_id: i64, user_id: i64, now: DateTime<Utc>) -> Result<WaitingListEntry> {
        self.waiting_list.enqueue(event_id, user_id, now).await
    }

    async fn find_waiting_entry(&self, event_id: i64, user_id: i64) -> Result<Option<WaitingListEntry>> {
        self.waiting_list.find(event_id, user_id).await
    }

    async fn list_waiting_entries(&self, event_id: i64) -> Result<Vec<WaitingListEntry>> {
        self.waiting_list.list_for_event(event_id).await
    }

    async fn mark_waiting_notified(&self, entry_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.waiting_list.mark_notified(entry_id, now).await
    }

    async fn remove_waiting_entry(&self, entry_id: i64) -> Result<bool> {
        self.waiting_list.remove(entry_id).await
    }

    async fn requeue_stale_waiting_entries(&self, notified_before: DateTime<Utc>) -> Result<Vec<i64>> {
        self.waiting_list.requeue_stale(notified_before).await
    }

    async fn upsert_rating(&self, rating: NewRating, now: DateTime<Utc>) -> Result<Rating> {
        self.ratings.upsert(rating, now).await
    }

    async fn list_ratings_by_rater(&self, event_id: i64, rater_id: i64) -> Result<Vec<Rating>> {
        self.ratings.list_by_rater(event_id, rater_id).await
    }

    async fn get_trust_profile(&self, user_id: i64) -> Result<Option<TrustProfile>> {
        self.trust.find(user_id).await
    }

    async fn decrement_trust_score(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrustProfile> {
        self.trust.decrement(user_id, now).await
    }

    async fn ban_user(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrustProfile> {
        self.trust.ban(user_id, now).await
    }

    async fn restore_trust_profile(&self, user_id: i64, payment_id: &str, now: DateTime<Utc>) -> Result<TrustProfile> {
        self.trust.restore(user_id, payment_id, now).await
    }

    async fn enqueue_notification(&self, notice: Notice, now: DateTime<Utc>) -> Result<Notification> {
        self.notifications.enqueue(notice, now).await
    }

    async fn list_undelivered_notifications(&self, limit: i64) -> Result<Vec<Notification>> {
        self.notifications.list_undelivered(limit).await
    }

    async fn list_notifications_for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.notifications.list_for_user(user_id).await
    }

    async fn mark_notification_delivered(&self, notification_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.notifications.mark_delivered(notification_id, now).await
    }

    async fn record_delivery_failure(&self, notification_id: i64) -> Result<()> {
        self.notifications.record_failure(notification_id).await
    }
}
