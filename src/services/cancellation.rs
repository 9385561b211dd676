//! Cancellation and deletion policy
//!
//! Organizer cancellation needs lead time that grows with the number of
//! approved participants; deletion is only for events nobody was approved
//! into. Two sweeps clean up after organizers: abandoned open events are
//! deleted and stale confirmed or running events are forced to Finalizado.

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::database::EventStore;
use crate::models::{Event, EventStatus, Notice, NotificationKind, Participation, ParticipationStatus};
use crate::services::clock::Clock;
use crate::services::notification::{notify_quietly, Notifier};
use crate::services::status::PassReport;
use crate::services::trust::TrustService;
use crate::utils::errors::{Outcome, Rejection, Result};
use crate::utils::helpers::{format_hours, hours_until};
use crate::utils::logging::{log_event_action, log_item_failure, log_status_transition, log_sweep_result};
use crate::utils::retry::{with_retry, RetryPolicy};

/// Open events this many minutes past start with no candidacies are deleted
pub const ABANDONED_AFTER_MINUTES: i64 = 5;

/// Confirmed or running events this many days past their end are finalized
pub const STALE_AFTER_DAYS: i64 = 7;

/// Hours of notice an organizer must give before cancelling
pub fn required_lead_hours(approved_count: usize) -> i64 {
    match approved_count {
        0 => 0,
        1 => 24,
        _ => 48,
    }
}

/// Result of a successful cancellation check, for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CancellationCheck {
    pub hours_remaining: f64,
    pub hours_required: i64,
    pub approved_count: usize,
}

/// Whether an event starting at `start_time` may be cancelled at `now`
///
/// Depends on nothing but the clock, the start time and the number of
/// approved participants.
pub fn evaluate_cancellation(now: DateTime<Utc>, start_time: DateTime<Utc>, approved_count: usize) -> Outcome<CancellationCheck> {
    let hours_remaining = hours_until(now, start_time);
    if hours_remaining <= 0.0 {
        return Err(Rejection::EventAlreadyStarted);
    }

    let hours_required = required_lead_hours(approved_count);
    if hours_remaining < hours_required as f64 {
        return Err(Rejection::CancellationTooLate {
            hours_remaining,
            hours_required,
        });
    }

    Ok(CancellationCheck {
        hours_remaining,
        hours_required,
        approved_count,
    })
}

fn approved_count(participations: &[Participation]) -> usize {
    participations.iter().filter(|p| p.is_approved()).count()
}

#[derive(Clone)]
pub struct CancellationService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    trust: TrustService,
    fetch_policy: RetryPolicy,
}

impl CancellationService {
    pub fn new(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        trust: TrustService,
        fetch_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            trust,
            fetch_policy,
        }
    }

    pub async fn can_cancel_event(&self, event_id: i64, creator_id: i64) -> Result<Outcome<CancellationCheck>> {
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };
        let participations = self.store.list_participations(event_id).await?;
        Ok(self.check_cancel(&event, &participations, creator_id))
    }

    fn check_cancel(&self, event: &Event, participations: &[Participation], creator_id: i64) -> Outcome<CancellationCheck> {
        if !event.is_creator(creator_id) {
            return Err(Rejection::NotCreator);
        }
        if matches!(event.status, EventStatus::Cancelado | EventStatus::Finalizado | EventStatus::Concluido) {
            return Err(Rejection::EventClosed);
        }
        evaluate_cancellation(self.clock.now(), event.start_time, approved_count(participations))
    }

    /// Cancel an event on behalf of its organizer and tell everyone involved
    pub async fn cancel_event(&self, event_id: i64, creator_id: i64, motivo: Option<String>) -> Result<Outcome<Event>> {
        let now = self.clock.now();
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };
        let participations = self.store.list_participations(event_id).await?;

        let check = match self.check_cancel(&event, &participations, creator_id) {
            Ok(check) => check,
            Err(rejection) => {
                warn!(event_id = event_id, user_id = creator_id, reason = %rejection, "Event cancellation refused");
                return Ok(Err(rejection));
            }
        };

        let motivo = motivo.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
        if !self.store.cancel_event(event_id, motivo.clone(), now).await? {
            return Ok(Err(Rejection::EventClosed));
        }
        log_status_transition(event_id, event.status, EventStatus::Cancelado);
        log_event_action(event_id, "cancel", creator_id, Some(&format_hours(check.hours_remaining)));

        let message = match &motivo {
            Some(reason) => format!("O evento \"{}\" foi cancelado pelo organizador. Motivo: {}", event.title, reason),
            None => format!("O evento \"{}\" foi cancelado pelo organizador.", event.title),
        };
        for participation in participations.iter().filter(|p| p.status.is_active()) {
            notify_quietly(
                self.notifier.as_ref(),
                Notice::new(
                    participation.user_id,
                    Some(event_id),
                    NotificationKind::EventCancelled,
                    "Evento cancelado",
                    message.clone(),
                ),
            )
            .await;
        }

        Ok(Ok(Event {
            status: EventStatus::Cancelado,
            cancelamento_motivo: motivo,
            updated_at: now,
            ..event
        }))
    }

    pub async fn can_delete_event(&self, event_id: i64, creator_id: i64) -> Result<Outcome<()>> {
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };
        let participations = self.store.list_participations(event_id).await?;
        Ok(check_delete(&event, &participations, creator_id))
    }

    /// Delete an event and everything attached to it
    ///
    /// The store re-checks the creator inside the deleting transaction.
    pub async fn delete_event(&self, event_id: i64, creator_id: i64) -> Result<Outcome<()>> {
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };
        let participations = self.store.list_participations(event_id).await?;
        if let Err(rejection) = check_delete(&event, &participations, creator_id) {
            warn!(event_id = event_id, user_id = creator_id, reason = %rejection, "Event deletion refused");
            return Ok(Err(rejection));
        }

        if !self.store.delete_event_cascade(event_id, Some(creator_id)).await? {
            return Ok(Err(Rejection::EventNotFound));
        }
        log_event_action(event_id, "delete", creator_id, None);

        for participation in participations.iter().filter(|p| p.status == ParticipationStatus::Pendente) {
            notify_quietly(
                self.notifier.as_ref(),
                Notice::new(
                    participation.user_id,
                    None,
                    NotificationKind::EventDeleted,
                    "Evento removido",
                    format!("O evento \"{}\" foi removido pelo organizador.", event.title),
                ),
            )
            .await;
        }
        Ok(Ok(()))
    }

    /// Delete open events that started a while ago without a single candidacy
    pub async fn sweep_abandoned_events(&self) -> Result<PassReport> {
        let cutoff = self.clock.now() - Duration::minutes(ABANDONED_AFTER_MINUTES);
        let events = with_retry(self.fetch_policy, "list_open_events_starting_before", || {
            self.store.list_open_events_starting_before(cutoff)
        })
        .await?;

        let mut report = PassReport {
            examined: events.len(),
            ..PassReport::default()
        };
        for event in &events {
            match self.delete_if_abandoned(event).await {
                Ok(true) => report.changed += 1,
                Ok(false) => {}
                Err(e) => {
                    log_item_failure("auto_delete", event.id, &e);
                    report.failed += 1;
                }
            }
        }

        log_sweep_result("auto_delete", report.examined, report.changed, report.failed);
        Ok(report)
    }

    async fn delete_if_abandoned(&self, event: &Event) -> Result<bool> {
        if !self.store.list_participations(event.id).await?.is_empty() {
            return Ok(false);
        }
        let deleted = self.store.delete_event_cascade(event.id, None).await?;
        if deleted {
            info!(event_id = event.id, creator_id = event.creator_id, "Abandoned event deleted");
        }
        Ok(deleted)
    }

    /// Finalize events long past their end that nobody ever entered
    pub async fn sweep_stale_events(&self) -> Result<PassReport> {
        let cutoff = self.clock.now() - Duration::days(STALE_AFTER_DAYS);
        let events = with_retry(self.fetch_policy, "list_stale_events", || self.store.list_stale_events(cutoff)).await?;

        let mut report = PassReport {
            examined: events.len(),
            ..PassReport::default()
        };
        for event in &events {
            match self.finalize_if_unattended(event).await {
                Ok(true) => report.changed += 1,
                Ok(false) => {}
                Err(e) => {
                    log_item_failure("auto_finalize", event.id, &e);
                    report.failed += 1;
                }
            }
        }

        log_sweep_result("auto_finalize", report.examined, report.changed, report.failed);
        Ok(report)
    }

    async fn finalize_if_unattended(&self, event: &Event) -> Result<bool> {
        let participations = self.store.list_participations(event.id).await?;
        if participations.iter().any(|p| p.is_approved() && p.com_acesso) {
            debug!(event_id = event.id, "Stale event had attendees, leaving it to the status pass");
            return Ok(false);
        }

        let now = self.clock.now();
        if !self
            .store
            .transition_event_status(event.id, event.status, EventStatus::Finalizado, now)
            .await?
        {
            return Ok(false);
        }
        log_status_transition(event.id, event.status, EventStatus::Finalizado);

        if let Err(e) = self.trust.penalize_no_shows_for_event(event.id).await {
            warn!(event_id = event.id, error = %e, "Failed to apply no-show penalties");
        }
        Ok(true)
    }
}

fn check_delete(event: &Event, participations: &[Participation], creator_id: i64) -> Outcome<()> {
    if !event.is_creator(creator_id) {
        return Err(Rejection::NotCreator);
    }
    if matches!(event.status, EventStatus::Finalizado | EventStatus::Concluido) {
        return Err(Rejection::EventFinished);
    }
    if approved_count(participations) > 0 {
        return Err(Rejection::HasApprovedParticipants);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 2, 19, 0, 0).unwrap()
    }

    fn hours_before(hours: f64) -> DateTime<Utc> {
        start() - Duration::milliseconds((hours * 3_600_000.0) as i64)
    }

    #[test]
    fn test_no_approved_participants_can_always_cancel_before_start() {
        assert_matches!(evaluate_cancellation(hours_before(0.1), start(), 0), Ok(_));
        assert_matches!(evaluate_cancellation(hours_before(500.0), start(), 0), Ok(_));
    }

    #[test]
    fn test_one_approved_participant_needs_a_day() {
        assert_matches!(
            evaluate_cancellation(hours_before(23.9), start(), 1),
            Err(Rejection::CancellationTooLate { hours_required: 24, .. })
        );
        assert_matches!(evaluate_cancellation(hours_before(24.0), start(), 1), Ok(_));
    }

    #[test]
    fn test_two_or_more_approved_participants_need_two_days() {
        assert_matches!(evaluate_cancellation(hours_before(48.1), start(), 2), Ok(check) if check.hours_required == 48);
        assert_matches!(
            evaluate_cancellation(hours_before(47.0), start(), 5),
            Err(Rejection::CancellationTooLate { hours_required: 48, .. })
        );
    }

    #[test]
    fn test_started_event_cannot_be_cancelled() {
        assert_eq!(evaluate_cancellation(start(), start(), 0), Err(Rejection::EventAlreadyStarted));
        assert_eq!(
            evaluate_cancellation(start() + Duration::hours(1), start(), 3),
            Err(Rejection::EventAlreadyStarted)
        );
    }

    #[test]
    fn test_rejection_shows_remaining_and_required_hours() {
        let reason = evaluate_cancellation(hours_before(23.9), start(), 1).unwrap_err().to_string();
        assert!(reason.contains("23.9h"));
        assert!(reason.contains("24h"));
    }
}
