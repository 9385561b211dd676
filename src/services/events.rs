//! Event creation
//!
//! Organizers may create one event per UTC calendar day and only while every
//! earlier event of theirs is `Concluido`. A cancelled event keeps blocking
//! until it is deleted.

use std::sync::Arc;
use tracing::{debug, warn};
use crate::database::EventStore;
use crate::models::*;
use crate::services::clock::Clock;
use crate::services::notification::{notify_quietly, Notifier};
use crate::utils::errors::{Outcome, Rejection, Result};
use crate::utils::helpers::{format_timestamp, truncate_text};
use crate::utils::logging::log_event_action;

const MAX_TITLE_LENGTH: usize = 120;

#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, clock, notifier }
    }

    /// Whether `user_id` may create another event right now
    pub async fn can_user_create_new_event(&self, user_id: i64) -> Result<Outcome<()>> {
        let today = self.clock.now().date_naive();
        let created = self.store.list_events_by_creator(user_id).await?;

        if created.iter().any(|e| e.created_at.date_naive() == today) {
            return Ok(Err(Rejection::DailyLimitReached));
        }
        if created.iter().any(|e| e.status != EventStatus::Concluido) {
            return Ok(Err(Rejection::ActiveEventExists));
        }
        Ok(Ok(()))
    }

    /// Create an open event with every slot available
    ///
    /// Crusher events immediately get a pending invite for the invited user.
    pub async fn create_event(&self, request: NewEvent) -> Result<Outcome<Event>> {
        let now = self.clock.now();
        debug!(creator_id = request.creator_id, event_type = request.event_type.as_str(), "Creating event");

        if let Err(rejection) = self.can_user_create_new_event(request.creator_id).await? {
            warn!(user_id = request.creator_id, reason = %rejection, "Event creation refused");
            return Ok(Err(rejection));
        }
        let request = match validate_new_event(request, now) {
            Ok(request) => request,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let invited = request.crusher_invited_user_id;
        let event = self.store.insert_event(request, now).await?;
        log_event_action(event.id, "create", event.creator_id, Some(event.event_type.as_str()));

        if let Some(invited_user_id) = invited {
            let invite = self
                .store
                .insert_participation(
                    NewParticipation {
                        event_id: event.id,
                        user_id: invited_user_id,
                        status: ParticipationStatus::Pendente,
                    },
                    now,
                )
                .await?;
            debug!(event_id = event.id, participation_id = invite.id, "Crusher invite created");

            notify_quietly(
                self.notifier.as_ref(),
                Notice::new(
                    invited_user_id,
                    Some(event.id),
                    NotificationKind::CrusherInvite,
                    "Você recebeu um convite",
                    format!("Você foi convidado para \"{}\" em {}.", event.title, format_timestamp(event.start_time)),
                ),
            )
            .await;
        }

        Ok(Ok(event))
    }
}

fn validate_new_event(mut request: NewEvent, now: chrono::DateTime<chrono::Utc>) -> Outcome<NewEvent> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(Rejection::InvalidEvent("o título é obrigatório".to_string()));
    }
    request.title = truncate_text(title, MAX_TITLE_LENGTH);

    if request.end_time <= request.start_time {
        return Err(Rejection::InvalidEvent("o término deve ser depois do início".to_string()));
    }
    if request.start_time <= now {
        return Err(Rejection::InvalidEvent("o início deve estar no futuro".to_string()));
    }
    if request.max_vagas < 1 {
        return Err(Rejection::InvalidEvent("o evento precisa de ao menos uma vaga".to_string()));
    }

    match (request.event_type, request.crusher_invited_user_id) {
        (EventType::Crusher, None) => {
            return Err(Rejection::InvalidEvent("eventos Crusher exigem um convidado".to_string()));
        }
        (EventType::Crusher, Some(invited)) if invited == request.creator_id => {
            return Err(Rejection::InvalidEvent("você não pode convidar a si mesmo".to_string()));
        }
        (EventType::Crusher, Some(_)) => {}
        (_, Some(_)) => request.crusher_invited_user_id = None,
        (_, None) => {}
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn request(event_type: EventType) -> NewEvent {
        let start = Utc::now() + Duration::days(2);
        NewEvent {
            title: "  Jantar de sexta  ".to_string(),
            creator_id: 1,
            event_type,
            start_time: start,
            end_time: start + Duration::hours(3),
            max_vagas: 4,
            venue_id: None,
            crusher_invited_user_id: None,
        }
    }

    #[test]
    fn test_validation_trims_title_and_checks_times() {
        let now = Utc::now();
        let valid = validate_new_event(request(EventType::Publico), now).unwrap();
        assert_eq!(valid.title, "Jantar de sexta");

        let mut backwards = request(EventType::Publico);
        backwards.end_time = backwards.start_time - Duration::hours(1);
        assert_matches!(validate_new_event(backwards, now), Err(Rejection::InvalidEvent(_)));

        let mut past = request(EventType::Publico);
        past.start_time = now - Duration::hours(1);
        assert_matches!(validate_new_event(past, now), Err(Rejection::InvalidEvent(_)));
    }

    #[test]
    fn test_crusher_events_need_another_user_invited() {
        let now = Utc::now();
        assert_matches!(validate_new_event(request(EventType::Crusher), now), Err(Rejection::InvalidEvent(_)));

        let mut own = request(EventType::Crusher);
        own.crusher_invited_user_id = Some(1);
        assert_matches!(validate_new_event(own, now), Err(Rejection::InvalidEvent(_)));

        let mut stray = request(EventType::Privado);
        stray.crusher_invited_user_id = Some(9);
        assert_eq!(validate_new_event(stray, now).unwrap().crusher_invited_user_id, None);
    }
}
