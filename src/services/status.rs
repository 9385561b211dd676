//! Event status engine
//!
//! Status is derived from the clock, the remaining vacancies and, once the
//! event has ended, its participations. `compute_status` is pure; the service
//! persists only the events whose derived status differs from the stored one.

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use crate::database::EventStore;
use crate::models::{Event, EventStatus, Participation};
use crate::services::clock::Clock;
use crate::services::trust::TrustService;
use crate::utils::errors::{Outcome, Rejection, Result};
use crate::utils::helpers::is_before_by;
use crate::utils::logging::{log_event_action, log_item_failure, log_status_transition, log_sweep_result};
use crate::utils::retry::{with_retry, RetryPolicy};

/// An open event with vacancies is locked this many minutes before start
pub const AUTO_CONFIRM_LEAD_MINUTES: i64 = 5;

/// Ended events close on their own after this many days, evaluated or not
pub const COMPLETION_GRACE_DAYS: i64 = 7;

/// Summary of one periodic pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub examined: usize,
    pub changed: usize,
    pub failed: usize,
}

/// Whether a finished event may skip Finalizado and close as Concluído
///
/// True after the grace period, or once every present participant (and there
/// is at least one) has finished evaluating.
pub fn should_auto_complete(event: &Event, participations: &[Participation], now: DateTime<Utc>) -> bool {
    if now - event.end_time >= Duration::days(COMPLETION_GRACE_DAYS) {
        return true;
    }

    let mut present = participations
        .iter()
        .filter(|p| p.event_id == event.id && p.is_present())
        .peekable();
    present.peek().is_some() && present.all(|p| p.avaliacao_feita)
}

/// Derive the status an event should have at `now`
///
/// `participations` is only consulted once the event has ended. The result
/// never moves backwards along Aberto → Confirmado → Em Andamento →
/// Finalizado → Concluído.
pub fn compute_status(event: &Event, participations: &[Participation], now: DateTime<Utc>) -> EventStatus {
    let current = event.status;
    if current.is_terminal() {
        return current;
    }

    let derived = if now >= event.end_time {
        if should_auto_complete(event, participations, now) {
            EventStatus::Concluido
        } else {
            EventStatus::Finalizado
        }
    } else if now >= event.start_time {
        EventStatus::EmAndamento
    } else if current == EventStatus::Confirmado || event.vagas <= 0 {
        EventStatus::Confirmado
    } else if is_before_by(now, event.start_time, Duration::minutes(AUTO_CONFIRM_LEAD_MINUTES)) {
        EventStatus::Aberto
    } else {
        EventStatus::Confirmado
    };

    match (current.rank(), derived.rank()) {
        (Some(stored), Some(next)) if next < stored => current,
        _ => derived,
    }
}

#[derive(Clone)]
pub struct StatusService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    trust: TrustService,
    fetch_policy: RetryPolicy,
}

impl StatusService {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, trust: TrustService, fetch_policy: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            trust,
            fetch_policy,
        }
    }

    /// Recompute every non-terminal event
    ///
    /// The batch read is retried; a failing event is logged and skipped.
    pub async fn recompute_all(&self) -> Result<PassReport> {
        let events = with_retry(self.fetch_policy, "list_active_events", || self.store.list_active_events()).await?;
        let mut report = PassReport {
            examined: events.len(),
            ..PassReport::default()
        };

        for event in &events {
            match self.recompute_event(event).await {
                Ok(Some(_)) => report.changed += 1,
                Ok(None) => {}
                Err(e) => {
                    log_item_failure("status", event.id, &e);
                    report.failed += 1;
                }
            }
        }

        log_sweep_result("status", report.examined, report.changed, report.failed);
        Ok(report)
    }

    /// Persist the derived status of one event if it changed
    pub async fn recompute_event(&self, event: &Event) -> Result<Option<EventStatus>> {
        let now = self.clock.now();
        let participations = if event.has_ended(now) {
            self.store.list_participations(event.id).await?
        } else {
            Vec::new()
        };

        let next = compute_status(event, &participations, now);
        if next == event.status {
            return Ok(None);
        }

        if !self.store.transition_event_status(event.id, event.status, next, now).await? {
            debug!(event_id = event.id, "Event status changed concurrently, skipping");
            return Ok(None);
        }
        log_status_transition(event.id, event.status, next);

        if crossed_end(event.status, next) {
            if let Err(e) = self.trust.penalize_no_shows_for_event(event.id).await {
                warn!(event_id = event.id, error = %e, "Failed to apply no-show penalties");
            }
        }
        Ok(Some(next))
    }

    /// Organizer confirmation; sticky until the event starts
    pub async fn confirm_event(&self, event_id: i64, creator_id: i64) -> Result<Outcome<Event>> {
        let now = self.clock.now();
        let Some(mut event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };

        if !event.is_creator(creator_id) {
            warn!(event_id = event_id, user_id = creator_id, "Non-creator tried to confirm event");
            return Ok(Err(Rejection::NotCreator));
        }
        if event.has_started(now) {
            return Ok(Err(Rejection::EventAlreadyStarted));
        }
        if event.status != EventStatus::Aberto {
            return Ok(Err(Rejection::NotConfirmable));
        }

        if !self
            .store
            .transition_event_status(event_id, EventStatus::Aberto, EventStatus::Confirmado, now)
            .await?
        {
            return Ok(Err(Rejection::NotConfirmable));
        }

        log_event_action(event_id, "confirm", creator_id, None);
        event.status = EventStatus::Confirmado;
        event.updated_at = now;
        Ok(Ok(event))
    }
}

/// Transitions that mark the moment an event is over
pub(crate) fn crossed_end(from: EventStatus, to: EventStatus) -> bool {
    let finished = matches!(to, EventStatus::Finalizado | EventStatus::Concluido);
    let before_end = matches!(from, EventStatus::Aberto | EventStatus::Confirmado | EventStatus::EmAndamento);
    finished && before_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::{EventType, ParticipationStatus};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 14, 20, 0, 0).unwrap()
    }

    fn event(status: EventStatus, vagas: i32) -> Event {
        Event {
            id: 1,
            title: "Jantar".to_string(),
            creator_id: 1,
            event_type: EventType::Publico,
            status,
            start_time: start(),
            end_time: start() + Duration::hours(3),
            vagas,
            max_vagas: 4,
            venue_id: None,
            crusher_invited_user_id: None,
            entry_password: None,
            entry_locked: false,
            entry_opened_at: None,
            entry_locked_at: None,
            cancelamento_motivo: None,
            created_at: start() - Duration::days(3),
            updated_at: start() - Duration::days(3),
        }
    }

    fn present(user_id: i64, evaluated: bool) -> Participation {
        Participation {
            id: user_id,
            event_id: 1,
            user_id,
            status: ParticipationStatus::Aprovado,
            presenca_confirmada: true,
            avaliacao_feita: evaluated,
            com_acesso: true,
            created_at: start(),
            updated_at: start(),
        }
    }

    #[test]
    fn test_open_event_locks_five_minutes_before_start() {
        let e = event(EventStatus::Aberto, 2);
        assert_eq!(compute_status(&e, &[], start() - Duration::minutes(6)), EventStatus::Aberto);
        assert_eq!(compute_status(&e, &[], start() - Duration::minutes(5)), EventStatus::Confirmado);
        assert_eq!(compute_status(&e, &[], start()), EventStatus::EmAndamento);
    }

    #[test]
    fn test_full_event_is_confirmed_and_confirmation_is_sticky() {
        let full = event(EventStatus::Aberto, 0);
        assert_eq!(compute_status(&full, &[], start() - Duration::days(1)), EventStatus::Confirmado);

        let confirmed = event(EventStatus::Confirmado, 3);
        assert_eq!(compute_status(&confirmed, &[], start() - Duration::days(1)), EventStatus::Confirmado);
    }

    #[test]
    fn test_terminal_statuses_are_absorbing() {
        let after = start() + Duration::days(30);
        assert_eq!(compute_status(&event(EventStatus::Cancelado, 2), &[], after), EventStatus::Cancelado);
        assert_eq!(compute_status(&event(EventStatus::Concluido, 2), &[], start()), EventStatus::Concluido);
    }

    #[test]
    fn test_status_never_moves_backwards() {
        let running = event(EventStatus::EmAndamento, 2);
        assert_eq!(compute_status(&running, &[], start() - Duration::hours(1)), EventStatus::EmAndamento);
    }

    #[test]
    fn test_auto_complete_requires_every_present_participant_evaluated() {
        let e = event(EventStatus::EmAndamento, 0);
        let after_end = e.end_time + Duration::hours(1);

        assert!(!should_auto_complete(&e, &[present(2, true), present(3, false)], after_end));
        assert!(should_auto_complete(&e, &[present(2, true), present(3, true)], after_end));
        assert_eq!(
            compute_status(&e, &[present(2, true), present(3, false)], after_end),
            EventStatus::Finalizado
        );
    }

    #[test]
    fn test_no_present_participants_waits_for_grace_period() {
        let e = event(EventStatus::Finalizado, 4);
        let grace = Duration::days(COMPLETION_GRACE_DAYS);
        let almost = e.end_time + grace - Duration::seconds(1);

        assert!(!should_auto_complete(&e, &[], e.end_time));
        assert!(!should_auto_complete(&e, &[], almost));
        assert!(should_auto_complete(&e, &[], e.end_time + grace));
        assert_eq!(compute_status(&e, &[], e.end_time + grace), EventStatus::Concluido);
    }

    #[test]
    fn test_crossed_end_only_from_pre_end_statuses() {
        assert!(crossed_end(EventStatus::EmAndamento, EventStatus::Finalizado));
        assert!(crossed_end(EventStatus::Confirmado, EventStatus::Concluido));
        assert!(!crossed_end(EventStatus::Finalizado, EventStatus::Concluido));
    }
}
