//! In-memory store
//!
//! A mutex-guarded implementation of `EventStore` used by tests and local
//! demos. Each method holds the lock for its whole body, which gives the same
//! single-row atomicity the PostgreSQL store gets from conditional updates.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::database::store::EventStore;
use crate::models::*;
use crate::utils::errors::{EncontroError, Result};
use crate::utils::retry::store_unavailable;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    events: BTreeMap<i64, Event>,
    participations: BTreeMap<i64, Participation>,
    waiting: BTreeMap<i64, WaitingListEntry>,
    ratings: BTreeMap<i64, Rating>,
    profiles: HashMap<i64, TrustProfile>,
    notifications: BTreeMap<i64, Notification>,
    failing_batch_reads: u32,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn event_mut(&mut self, event_id: i64) -> Result<&mut Event> {
        self.events
            .get_mut(&event_id)
            .ok_or(EncontroError::EventNotFound { event_id })
    }

    fn participation_mut(&mut self, participation_id: i64) -> Result<&mut Participation> {
        self.participations
            .get_mut(&participation_id)
            .ok_or(EncontroError::ParticipationNotFound { participation_id })
    }

    fn profile_mut(&mut self, user_id: i64, now: DateTime<Utc>) -> &mut TrustProfile {
        self.profiles
            .entry(user_id)
            .or_insert_with(|| TrustProfile::fresh(user_id, now))
    }

    fn compact_queue(&mut self, event_id: i64) {
        let mut queue: Vec<&mut WaitingListEntry> = self
            .waiting
            .values_mut()
            .filter(|entry| entry.event_id == event_id)
            .collect();
        queue.sort_by_key(|entry| entry.position);
        for (index, entry) in queue.into_iter().enumerate() {
            entry.position = index as i32 + 1;
        }
    }
}

/// `EventStore` kept entirely in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` batch reads of active events fail with a transient error
    pub fn fail_next_batch_reads(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_batch_reads = count;
        }
    }

    /// Overwrite a stored event; test setup for states the rule engines would not produce
    pub fn put_event(&self, event: Event) -> Result<()> {
        let mut state = self.lock()?;
        state.next_id = state.next_id.max(event.id);
        state.events.insert(event.id, event);
        Ok(())
    }

    /// Overwrite a stored participation
    pub fn put_participation(&self, participation: Participation) -> Result<()> {
        let mut state = self.lock()?;
        state.next_id = state.next_id.max(participation.id);
        state.participations.insert(participation.id, participation);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| EncontroError::Store("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn insert_event(&self, new_event: NewEvent, now: DateTime<Utc>) -> Result<Event> {
        let mut state = self.lock()?;
        let id = state.next_id();
        let event = Event {
            id,
            title: new_event.title,
            creator_id: new_event.creator_id,
            event_type: new_event.event_type,
            status: EventStatus::Aberto,
            start_time: new_event.start_time,
            end_time: new_event.end_time,
            vagas: new_event.max_vagas,
            max_vagas: new_event.max_vagas,
            venue_id: new_event.venue_id,
            crusher_invited_user_id: new_event.crusher_invited_user_id,
            entry_password: None,
            entry_locked: false,
            entry_opened_at: None,
            entry_locked_at: None,
            cancelamento_motivo: None,
            created_at: now,
            updated_at: now,
        };
        state.events.insert(id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, event_id: i64) -> Result<Option<Event>> {
        Ok(self.lock()?.events.get(&event_id).cloned())
    }

    async fn list_active_events(&self) -> Result<Vec<Event>> {
        let mut state = self.lock()?;
        if state.failing_batch_reads > 0 {
            state.failing_batch_reads -= 1;
            return Err(store_unavailable("simulated batch read failure"));
        }
        Ok(state
            .events
            .values()
            .filter(|event| !event.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn list_events_by_creator(&self, creator_id: i64) -> Result<Vec<Event>> {
        Ok(self
            .lock()?
            .events
            .values()
            .filter(|event| event.creator_id == creator_id)
            .cloned()
            .collect())
    }

    async fn list_open_events_starting_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Event>> {
        Ok(self
            .lock()?
            .events
            .values()
            .filter(|event| event.status == EventStatus::Aberto && event.start_time <= cutoff)
            .cloned()
            .collect())
    }

    async fn list_stale_events(&self, ended_before: DateTime<Utc>) -> Result<Vec<Event>> {
        Ok(self
            .lock()?
            .events
            .values()
            .filter(|event| {
                matches!(event.status, EventStatus::Confirmado | EventStatus::EmAndamento)
                    && event.end_time <= ended_before
            })
            .cloned()
            .collect())
    }

    async fn transition_event_status(
        &self,
        event_id: i64,
        from: EventStatus,
        to: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        let event = state.event_mut(event_id)?;
        if event.status != from {
            return Ok(false);
        }
        event.status = to;
        event.updated_at = now;
        Ok(true)
    }

    async fn cancel_event(&self, event_id: i64, motivo: Option<String>, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.lock()?;
        let event = state.event_mut(event_id)?;
        if event.status.is_terminal() {
            return Ok(false);
        }
        event.status = EventStatus::Cancelado;
        event.cancelamento_motivo = motivo;
        event.updated_at = now;
        Ok(true)
    }

    async fn take_vacancy(&self, event_id: i64) -> Result<bool> {
        let mut state = self.lock()?;
        let event = state.event_mut(event_id)?;
        if event.vagas <= 0 {
            return Ok(false);
        }
        event.vagas -= 1;
        Ok(true)
    }

    async fn release_vacancy(&self, event_id: i64) -> Result<bool> {
        let mut state = self.lock()?;
        let event = state.event_mut(event_id)?;
        if event.vagas >= event.max_vagas {
            return Ok(false);
        }
        event.vagas += 1;
        Ok(true)
    }

    async fn save_entry_password(&self, event_id: i64, password: &str, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        let event = state.event_mut(event_id)?;
        event.entry_password = Some(password.to_string());
        event.entry_opened_at = Some(now);
        event.updated_at = now;
        Ok(())
    }

    async fn lock_entry(&self, event_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        let event = state.event_mut(event_id)?;
        event.entry_locked = true;
        event.entry_locked_at = Some(now);
        event.updated_at = now;
        Ok(())
    }

    async fn delete_event_cascade(&self, event_id: i64, creator_id: Option<i64>) -> Result<bool> {
        let mut state = self.lock()?;
        let owner_matches = match state.events.get(&event_id) {
            Some(event) => creator_id.map_or(true, |id| event.creator_id == id),
            None => return Ok(false),
        };
        if !owner_matches {
            return Ok(false);
        }

        state.participations.retain(|_, p| p.event_id != event_id);
        state.waiting.retain(|_, w| w.event_id != event_id);
        state.ratings.retain(|_, r| r.event_id != event_id);
        state.notifications.retain(|_, n| n.event_id != Some(event_id));
        Ok(state.events.remove(&event_id).is_some())
    }

    async fn insert_participation(&self, new: NewParticipation, now: DateTime<Utc>) -> Result<Participation> {
        let mut state = self.lock()?;
        if !state.events.contains_key(&new.event_id) {
            return Err(EncontroError::EventNotFound { event_id: new.event_id });
        }
        // mirrors idx_event_participants_active
        if new.status.is_active()
            && state
                .participations
                .values()
                .any(|p| p.event_id == new.event_id && p.user_id == new.user_id && p.status.is_active())
        {
            return Err(EncontroError::Duplicate(format!(
                "active participation for user {} in event {}",
                new.user_id, new.event_id
            )));
        }
        let id = state.next_id();
        let participation = Participation {
            id,
            event_id: new.event_id,
            user_id: new.user_id,
            status: new.status,
            presenca_confirmada: false,
            avaliacao_feita: false,
            com_acesso: false,
            created_at: now,
            updated_at: now,
        };
        state.participations.insert(id, participation.clone());
        Ok(participation)
    }

    async fn get_participation(&self, participation_id: i64) -> Result<Option<Participation>> {
        Ok(self.lock()?.participations.get(&participation_id).cloned())
    }

    async fn find_active_participation(&self, event_id: i64, user_id: i64) -> Result<Option<Participation>> {
        Ok(self
            .lock()?
            .participations
            .values()
            .find(|p| p.event_id == event_id && p.user_id == user_id && p.status.is_active())
            .cloned())
    }

    async fn list_participations(&self, event_id: i64) -> Result<Vec<Participation>> {
        Ok(self
            .lock()?
            .participations
            .values()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn list_user_commitments(&self, user_id: i64) -> Result<Vec<Event>> {
        let state = self.lock()?;
        Ok(state
            .participations
            .values()
            .filter(|p| p.user_id == user_id && p.is_approved())
            .filter_map(|p| state.events.get(&p.event_id))
            .filter(|event| !event.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn transition_participation(
        &self,
        participation_id: i64,
        from: ParticipationStatus,
        to: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        let participation = state.participation_mut(participation_id)?;
        if participation.status != from {
            return Ok(false);
        }
        participation.status = to;
        participation.updated_at = now;
        Ok(true)
    }

    async fn confirm_presence(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        let participation = state.participation_mut(participation_id)?;
        participation.presenca_confirmada = true;
        participation.updated_at = now;
        Ok(())
    }

    async fn grant_access(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        let participation = state.participation_mut(participation_id)?;
        participation.com_acesso = true;
        participation.updated_at = now;
        Ok(())
    }

    async fn mark_evaluation_done(&self, participation_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        let participation = state.participation_mut(participation_id)?;
        participation.avaliacao_feita = true;
        participation.updated_at = now;
        Ok(())
    }

    async fn enqueue_waiting(&self, event_id: i64, user_id: i64, now: DateTime<Utc>) -> Result<WaitingListEntry> {
        let mut state = self.lock()?;
        if let Some(existing) = state
            .waiting
            .values()
            .find(|w| w.event_id == event_id && w.user_id == user_id)
        {
            return Ok(existing.clone());
        }

        let last_position = state
            .waiting
            .values()
            .filter(|w| w.event_id == event_id)
            .map(|w| w.position)
            .max()
            .unwrap_or(0);
        let id = state.next_id();
        let entry = WaitingListEntry {
            id,
            event_id,
            user_id,
            position: last_position + 1,
            notified: false,
            notified_at: None,
            created_at: now,
        };
        state.waiting.insert(id, entry.clone());
        Ok(entry)
    }

    async fn find_waiting_entry(&self, event_id: i64, user_id: i64) -> Result<Option<WaitingListEntry>> {
        Ok(self
            .lock()?
            .waiting
            .values()
            .find(|w| w.event_id == event_id && w.user_id == user_id)
            .cloned())
    }

    async fn list_waiting_entries(&self, event_id: i64) -> Result<Vec<WaitingListEntry>> {
        let mut entries: Vec<WaitingListEntry> = self
            .lock()?
            .waiting
            .values()
            .filter(|w| w.event_id == event_id)
            .cloned()
            .collect();
        entries.sort_by_key(|w| w.position);
        Ok(entries)
    }

    async fn mark_waiting_notified(&self, entry_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(entry) = state.waiting.get_mut(&entry_id) {
            entry.notified = true;
            entry.notified_at = Some(now);
        }
        Ok(())
    }

    async fn remove_waiting_entry(&self, entry_id: i64) -> Result<bool> {
        let mut state = self.lock()?;
        match state.waiting.remove(&entry_id) {
            Some(entry) => {
                state.compact_queue(entry.event_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn requeue_stale_waiting_entries(&self, notified_before: DateTime<Utc>) -> Result<Vec<i64>> {
        let mut state = self.lock()?;
        let mut event_ids = Vec::new();
        for entry in state.waiting.values_mut() {
            let stale = entry.notified && entry.notified_at.map_or(true, |at| at <= notified_before);
            if stale {
                entry.notified = false;
                entry.notified_at = None;
                if !event_ids.contains(&entry.event_id) {
                    event_ids.push(entry.event_id);
                }
            }
        }
        Ok(event_ids)
    }

    async fn upsert_rating(&self, new: NewRating, now: DateTime<Utc>) -> Result<Rating> {
        let mut state = self.lock()?;
        if let Some(existing) = state.ratings.values_mut().find(|r| {
            r.event_id == new.event_id
                && r.rater_id == new.rater_id
                && r.rated_id == new.rated_id
                && r.rating_type == new.rating_type
        }) {
            existing.score = new.score;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let id = state.next_id();
        let rating = Rating {
            id,
            event_id: new.event_id,
            rater_id: new.rater_id,
            rated_id: new.rated_id,
            rating_type: new.rating_type,
            score: new.score,
            created_at: now,
            updated_at: now,
        };
        state.ratings.insert(id, rating.clone());
        Ok(rating)
    }

    async fn list_ratings_by_rater(&self, event_id: i64, rater_id: i64) -> Result<Vec<Rating>> {
        Ok(self
            .lock()?
            .ratings
            .values()
            .filter(|r| r.event_id == event_id && r.rater_id == rater_id)
            .cloned()
            .collect())
    }

    async fn get_trust_profile(&self, user_id: i64) -> Result<Option<TrustProfile>> {
        Ok(self.lock()?.profiles.get(&user_id).cloned())
    }

    async fn decrement_trust_score(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrustProfile> {
        let mut state = self.lock()?;
        let profile = state.profile_mut(user_id, now);
        profile.trust_score = (profile.trust_score - 1).max(0);
        profile.is_banned = profile.trust_score == 0;
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn ban_user(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrustProfile> {
        let mut state = self.lock()?;
        let profile = state.profile_mut(user_id, now);
        profile.trust_score = 0;
        profile.is_banned = true;
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn restore_trust_profile(&self, user_id: i64, payment_id: &str, now: DateTime<Utc>) -> Result<TrustProfile> {
        let mut state = self.lock()?;
        let profile = state.profile_mut(user_id, now);
        profile.trust_score = MAX_TRUST_SCORE;
        profile.is_banned = false;
        profile.last_payment_id = Some(payment_id.to_string());
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn enqueue_notification(&self, notice: Notice, now: DateTime<Utc>) -> Result<Notification> {
        let mut state = self.lock()?;
        let id = state.next_id();
        let notification = Notification {
            id,
            user_id: notice.user_id,
            event_id: notice.event_id,
            kind: notice.kind,
            title: notice.title,
            message: notice.message,
            delivered: false,
            attempts: 0,
            created_at: now,
            delivered_at: None,
        };
        state.notifications.insert(id, notification.clone());
        Ok(notification)
    }

    async fn list_undelivered_notifications(&self, limit: i64) -> Result<Vec<Notification>> {
        Ok(self
            .lock()?
            .notifications
            .values()
            .filter(|n| !n.delivered)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_notifications_for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        Ok(self
            .lock()?
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_delivered(&self, notification_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(notification) = state.notifications.get_mut(&notification_id) {
            notification.delivered = true;
            notification.attempts += 1;
            notification.delivered_at = Some(now);
        }
        Ok(())
    }

    async fn record_delivery_failure(&self, notification_id: i64) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(notification) = state.notifications.get_mut(&notification_id) {
            notification.attempts += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_event(max_vagas: i32) -> NewEvent {
        let start = Utc::now() + Duration::days(1);
        NewEvent {
            title: "Jantar".to_string(),
            creator_id: 1,
            event_type: EventType::Publico,
            start_time: start,
            end_time: start + Duration::hours(3),
            max_vagas,
            venue_id: None,
            crusher_invited_user_id: None,
        }
    }

    #[tokio::test]
    async fn test_vacancy_is_bounded_both_ways() {
        let store = InMemoryStore::new();
        let event = store.insert_event(new_event(1), Utc::now()).await.unwrap();

        assert!(!store.release_vacancy(event.id).await.unwrap());
        assert!(store.take_vacancy(event.id).await.unwrap());
        assert!(!store.take_vacancy(event.id).await.unwrap());
        assert!(store.release_vacancy(event.id).await.unwrap());

        let event = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.vagas, 1);
    }

    #[tokio::test]
    async fn test_waiting_queue_compacts_after_removal() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let event = store.insert_event(new_event(1), now).await.unwrap();

        let first = store.enqueue_waiting(event.id, 10, now).await.unwrap();
        let second = store.enqueue_waiting(event.id, 11, now).await.unwrap();
        let third = store.enqueue_waiting(event.id, 12, now).await.unwrap();
        assert_eq!((first.position, second.position, third.position), (1, 2, 3));

        let again = store.enqueue_waiting(event.id, 11, now).await.unwrap();
        assert_eq!(again.id, second.id);

        assert!(store.remove_waiting_entry(second.id).await.unwrap());
        let queue = store.list_waiting_entries(event.id).await.unwrap();
        let positions: Vec<(i64, i32)> = queue.iter().map(|w| (w.user_id, w.position)).collect();
        assert_eq!(positions, vec![(10, 1), (12, 2)]);
    }

    #[tokio::test]
    async fn test_second_active_participation_is_a_unique_violation() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let event = store.insert_event(new_event(2), now).await.unwrap();
        let pending = |user_id| NewParticipation { event_id: event.id, user_id, status: ParticipationStatus::Pendente };

        let first = store.insert_participation(pending(7), now).await.unwrap();
        let err = store.insert_participation(pending(7), now).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert!(!err.is_transient());

        store
            .transition_participation(first.id, ParticipationStatus::Pendente, ParticipationStatus::Cancelado, now)
            .await
            .unwrap();
        store.insert_participation(pending(7), now).await.unwrap();
        store.insert_participation(pending(8), now).await.unwrap();

        let active: Vec<_> = store
            .list_participations(event.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.status.is_active())
            .collect();
        assert_eq!(active.len(), 2);
    }

    #[tokio::test]
    async fn test_cascade_delete_honours_creator_guard() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let event = store.insert_event(new_event(2), now).await.unwrap();
        store
            .insert_participation(
                NewParticipation { event_id: event.id, user_id: 5, status: ParticipationStatus::Pendente },
                now,
            )
            .await
            .unwrap();

        assert!(!store.delete_event_cascade(event.id, Some(99)).await.unwrap());
        assert!(store.get_event(event.id).await.unwrap().is_some());

        assert!(store.delete_event_cascade(event.id, Some(1)).await.unwrap());
        assert!(store.get_event(event.id).await.unwrap().is_none());
        assert!(store.list_participations(event.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_batch_failures() {
        let store = InMemoryStore::new();
        store.fail_next_batch_reads(1);
        assert!(store.list_active_events().await.is_err());
        assert!(store.list_active_events().await.is_ok());
    }
}
