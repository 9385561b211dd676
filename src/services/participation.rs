//! Participation rule engine
//!
//! A participation moves `pendente → aprovado | rejeitado` and
//! `pendente | aprovado → cancelado`. Holding `aprovado` is exactly holding one
//! of the event's vacancies; the vacancy counter is only touched through the
//! store's conditional take/release so it cannot drift under concurrency.

use std::sync::Arc;
use chrono::Duration;
use tracing::{debug, warn};
use crate::database::EventStore;
use crate::models::*;
use crate::services::clock::Clock;
use crate::services::notification::{notify_quietly, Notifier};
use crate::services::waiting_list::WaitingListService;
use crate::utils::errors::{Outcome, Rejection, Result};
use crate::utils::helpers::{hours_until, intervals_overlap, is_before_by};
use crate::utils::logging::{log_participation_action, log_rejection};

/// Applications close this many minutes before start
pub const APPLICATION_CUTOFF_MINUTES: i64 = 5;

/// Direct enrollment into institucional events closes this many minutes before start
pub const INSTITUTIONAL_CUTOFF_MINUTES: i64 = 1;

/// Approvals close this many minutes before start
pub const APPROVAL_CUTOFF_MINUTES: i64 = 1;

/// Cancelling with less than this many hours to go is flagged as late
pub const LATE_CANCELLATION_HOURS: f64 = 4.0;

/// What a participant's cancellation did
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationReceipt {
    pub participation: Participation,
    pub hours_until_start: f64,
    pub is_late_cancellation: bool,
    pub released_slot: bool,
    /// Waiting-list candidate that took the freed slot
    pub promoted: Option<Participation>,
}

#[derive(Clone)]
pub struct ParticipationService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    waiting_list: WaitingListService,
}

impl ParticipationService {
    pub fn new(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        waiting_list: WaitingListService,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            waiting_list,
        }
    }

    pub fn waiting_list(&self) -> &WaitingListService {
        &self.waiting_list
    }

    /// Apply to an event
    ///
    /// Institucional events enroll directly as `aprovado` and take a vacancy;
    /// every other type creates a `pendente` candidacy.
    pub async fn apply_to_event(&self, event_id: i64, user_id: i64) -> Result<Outcome<Participation>> {
        debug!(event_id = event_id, user_id = user_id, "Applying to event");
        let outcome = self.try_apply(event_id, user_id).await?;
        if let Err(rejection) = &outcome {
            log_rejection("apply", Some(event_id), Some(user_id), &rejection.to_string());
        }
        Ok(outcome)
    }

    async fn try_apply(&self, event_id: i64, user_id: i64) -> Result<Outcome<Participation>> {
        let now = self.clock.now();
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };

        if let Some(profile) = self.store.get_trust_profile(user_id).await? {
            if profile.is_banned {
                return Ok(Err(Rejection::UserBanned));
            }
        }
        if !event.status.accepts_applications() {
            return Ok(Err(Rejection::NotAcceptingApplications));
        }
        if !event.has_vacancy() {
            return Ok(Err(Rejection::NoVacancies));
        }

        let institutional = event.event_type == EventType::Institucional;
        let cutoff = if institutional {
            INSTITUTIONAL_CUTOFF_MINUTES
        } else {
            APPLICATION_CUTOFF_MINUTES
        };
        if !is_before_by(now, event.start_time, Duration::minutes(cutoff)) {
            return Ok(Err(Rejection::ApplicationsClosed { minutes: cutoff }));
        }

        if self.store.find_active_participation(event_id, user_id).await?.is_some() {
            return Ok(Err(Rejection::AlreadyApplied));
        }

        let commitments = self.store.list_user_commitments(user_id).await?;
        if let Some(conflict) = commitments.iter().find(|other| {
            other.id != event.id && intervals_overlap(event.start_time, event.end_time, other.start_time, other.end_time)
        }) {
            return Ok(Err(Rejection::ScheduleConflict {
                conflicting_event_id: conflict.id,
            }));
        }

        let status = if institutional {
            if !self.store.take_vacancy(event_id).await? {
                return Ok(Err(Rejection::NoVacancies));
            }
            ParticipationStatus::Aprovado
        } else {
            ParticipationStatus::Pendente
        };

        let request = NewParticipation { event_id, user_id, status };
        let participation = match self.store.insert_participation(request, now).await {
            Ok(participation) => participation,
            Err(e) => {
                if institutional {
                    self.store.release_vacancy(event_id).await?;
                }
                if e.is_unique_violation() {
                    return Ok(Err(Rejection::AlreadyApplied));
                }
                return Err(e);
            }
        };
        log_participation_action(participation.id, event_id, user_id, participation.status, "apply");

        if institutional {
            self.notify(Notice::new(
                user_id,
                Some(event_id),
                NotificationKind::ApplicationApproved,
                "Inscrição confirmada",
                format!("Você está inscrito em \"{}\".", event.title),
            ))
            .await;
        } else {
            self.notify(Notice::new(
                event.creator_id,
                Some(event_id),
                NotificationKind::ApplicationReceived,
                "Nova candidatura",
                format!("Você recebeu uma nova candidatura para \"{}\".", event.title),
            ))
            .await;
        }

        Ok(Ok(participation))
    }

    /// Approve a pending candidacy, taking one vacancy
    pub async fn approve_participation(&self, participation_id: i64, event_id: i64) -> Result<Outcome<Participation>> {
        let Some((participation, event)) = self.load(participation_id).await? else {
            return Ok(Err(Rejection::ParticipationNotFound));
        };
        if participation.event_id != event_id {
            return Ok(Err(Rejection::ParticipationNotFound));
        }

        let outcome = self.approve_pending(participation, &event).await?;
        if let Ok(approved) = &outcome {
            // a candidate promoted as pending waits in the queue until here
            if let Some(entry) = self.store.find_waiting_entry(event.id, approved.user_id).await? {
                self.store.remove_waiting_entry(entry.id).await?;
                debug!(event_id = event.id, user_id = approved.user_id, "Approved candidate left the waiting list");
            }
            self.notify(Notice::new(
                approved.user_id,
                Some(event.id),
                NotificationKind::ApplicationApproved,
                "Candidatura aprovada",
                format!("Sua candidatura para \"{}\" foi aprovada.", event.title),
            ))
            .await;
        }
        Ok(outcome)
    }

    /// Reject a pending candidacy; no vacancy is involved
    pub async fn reject_participation(&self, participation_id: i64, reason: Option<String>) -> Result<Outcome<Participation>> {
        let Some((participation, event)) = self.load(participation_id).await? else {
            return Ok(Err(Rejection::ParticipationNotFound));
        };

        let outcome = self.reject_pending(participation).await?;
        if let Ok(rejected) = &outcome {
            let message = match reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
                Some(reason) => format!("Sua candidatura para \"{}\" não foi aceita. Motivo: {}", event.title, reason),
                None => format!("Sua candidatura para \"{}\" não foi aceita.", event.title),
            };
            self.notify(Notice::new(
                rejected.user_id,
                Some(event.id),
                NotificationKind::ApplicationRejected,
                "Candidatura recusada",
                message,
            ))
            .await;
        }
        Ok(outcome)
    }

    /// Cancel one's own participation
    ///
    /// Leaving an approved spot frees the vacancy and immediately offers it to
    /// the waiting list.
    pub async fn cancel_participation(&self, participation_id: i64, user_id: i64) -> Result<Outcome<CancellationReceipt>> {
        let now = self.clock.now();
        let Some((participation, event)) = self.load(participation_id).await? else {
            return Ok(Err(Rejection::ParticipationNotFound));
        };

        if participation.user_id != user_id {
            warn!(participation_id = participation_id, user_id = user_id, "User tried to cancel someone else's participation");
            return Ok(Err(Rejection::NotOwner));
        }
        if !participation.status.is_active() {
            return Ok(Err(Rejection::NotCancellable));
        }
        if matches!(event.status, EventStatus::Finalizado | EventStatus::Concluido | EventStatus::Cancelado) {
            return Ok(Err(Rejection::EventClosed));
        }

        let previous = participation.status;
        if !self
            .store
            .transition_participation(participation_id, previous, ParticipationStatus::Cancelado, now)
            .await?
        {
            return Ok(Err(Rejection::NotCancellable));
        }
        log_participation_action(participation_id, event.id, user_id, ParticipationStatus::Cancelado, "cancel");

        let hours_until_start = hours_until(now, event.start_time);
        let mut released_slot = false;
        let mut promoted = None;
        if previous == ParticipationStatus::Aprovado {
            released_slot = self.store.release_vacancy(event.id).await?;
            if released_slot {
                promoted = self.waiting_list.process_waiting_list(self, event.id).await?;
            }
        }

        self.notify(Notice::new(
            event.creator_id,
            Some(event.id),
            NotificationKind::ParticipationCancelled,
            "Participação cancelada",
            format!("Um participante cancelou a presença em \"{}\".", event.title),
        ))
        .await;

        Ok(Ok(CancellationReceipt {
            participation: Participation {
                status: ParticipationStatus::Cancelado,
                updated_at: now,
                ..participation
            },
            hours_until_start,
            is_late_cancellation: hours_until_start < LATE_CANCELLATION_HOURS,
            released_slot,
            promoted,
        }))
    }

    /// The invited user accepts a crusher invite
    pub async fn accept_crusher_invite(&self, participation_id: i64, user_id: i64) -> Result<Outcome<Participation>> {
        let (participation, event) = match self.load_crusher_invite(participation_id, user_id).await? {
            Ok(found) => found,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let outcome = self.approve_pending(participation, &event).await?;
        if outcome.is_ok() {
            self.notify(Notice::new(
                event.creator_id,
                Some(event.id),
                NotificationKind::CrusherAccepted,
                "Convite aceito",
                format!("Seu convite para \"{}\" foi aceito.", event.title),
            ))
            .await;
        }
        Ok(outcome)
    }

    /// The invited user declines a crusher invite
    pub async fn reject_crusher_invite(&self, participation_id: i64, user_id: i64) -> Result<Outcome<Participation>> {
        let (participation, event) = match self.load_crusher_invite(participation_id, user_id).await? {
            Ok(found) => found,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let outcome = self.reject_pending(participation).await?;
        if outcome.is_ok() {
            self.notify(Notice::new(
                event.creator_id,
                Some(event.id),
                NotificationKind::CrusherDeclined,
                "Convite recusado",
                format!("Seu convite para \"{}\" foi recusado.", event.title),
            ))
            .await;
        }
        Ok(outcome)
    }

    /// An approved participant confirms they are attending
    pub async fn confirm_presence(&self, event_id: i64, user_id: i64) -> Result<Outcome<Participation>> {
        let now = self.clock.now();
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };

        let open = matches!(event.status, EventStatus::Confirmado | EventStatus::EmAndamento);
        if !open || event.has_ended(now) {
            return Ok(Err(Rejection::PresenceUnavailable));
        }

        let participation = match self.store.find_active_participation(event_id, user_id).await? {
            Some(p) if p.is_approved() => p,
            _ => return Ok(Err(Rejection::NotApprovedParticipant)),
        };

        self.store.confirm_presence(participation.id, now).await?;
        log_participation_action(participation.id, event_id, user_id, participation.status, "confirm_presence");

        Ok(Ok(Participation {
            presenca_confirmada: true,
            updated_at: now,
            ..participation
        }))
    }

    async fn load(&self, participation_id: i64) -> Result<Option<(Participation, Event)>> {
        let Some(participation) = self.store.get_participation(participation_id).await? else {
            return Ok(None);
        };
        let event = self.store.get_event(participation.event_id).await?;
        Ok(event.map(|event| (participation, event)))
    }

    async fn load_crusher_invite(&self, participation_id: i64, user_id: i64) -> Result<Outcome<(Participation, Event)>> {
        let Some((participation, event)) = self.load(participation_id).await? else {
            return Ok(Err(Rejection::ParticipationNotFound));
        };
        if event.event_type != EventType::Crusher || event.crusher_invited_user_id != Some(participation.user_id) {
            return Ok(Err(Rejection::NotCrusherInvite));
        }
        if participation.user_id != user_id {
            warn!(participation_id = participation_id, user_id = user_id, "User tried to answer someone else's crusher invite");
            return Ok(Err(Rejection::NotInvitedUser));
        }
        if participation.status != ParticipationStatus::Pendente {
            return Ok(Err(Rejection::NotPending));
        }
        Ok(Ok((participation, event)))
    }

    async fn approve_pending(&self, participation: Participation, event: &Event) -> Result<Outcome<Participation>> {
        let now = self.clock.now();
        if participation.status != ParticipationStatus::Pendente {
            return Ok(Err(Rejection::NotPending));
        }
        if event.status.is_terminal() {
            return Ok(Err(Rejection::EventClosed));
        }
        if !is_before_by(now, event.start_time, Duration::minutes(APPROVAL_CUTOFF_MINUTES)) {
            return Ok(Err(Rejection::ApprovalClosed));
        }
        if !event.has_vacancy() || !self.store.take_vacancy(event.id).await? {
            return Ok(Err(Rejection::NoVacancies));
        }

        if !self
            .store
            .transition_participation(participation.id, ParticipationStatus::Pendente, ParticipationStatus::Aprovado, now)
            .await?
        {
            self.store.release_vacancy(event.id).await?;
            return Ok(Err(Rejection::NotPending));
        }
        log_participation_action(participation.id, event.id, participation.user_id, ParticipationStatus::Aprovado, "approve");

        Ok(Ok(Participation {
            status: ParticipationStatus::Aprovado,
            updated_at: now,
            ..participation
        }))
    }

    async fn reject_pending(&self, participation: Participation) -> Result<Outcome<Participation>> {
        let now = self.clock.now();
        if participation.status != ParticipationStatus::Pendente {
            return Ok(Err(Rejection::NotPending));
        }
        if !self
            .store
            .transition_participation(participation.id, ParticipationStatus::Pendente, ParticipationStatus::Rejeitado, now)
            .await?
        {
            return Ok(Err(Rejection::NotPending));
        }
        log_participation_action(
            participation.id,
            participation.event_id,
            participation.user_id,
            ParticipationStatus::Rejeitado,
            "reject",
        );

        Ok(Ok(Participation {
            status: ParticipationStatus::Rejeitado,
            updated_at: now,
            ..participation
        }))
    }

    async fn notify(&self, notice: Notice) {
        notify_quietly(self.notifier.as_ref(), notice).await;
    }
}
