//! Waiting list manager
//!
//! One FIFO queue per full event. A freed vacancy is offered to the head of
//! the queue; candidates that were offered a slot but never served go back to
//! the un-notified pool after a configurable delay.

use std::sync::Arc;
use chrono::Duration;
use tracing::{debug, info};
use crate::database::EventStore;
use crate::models::{Notice, NotificationKind, Participation, ParticipationStatus, WaitingListEntry};
use crate::services::clock::Clock;
use crate::services::notification::{notify_quietly, Notifier};
use crate::services::participation::ParticipationService;
use crate::utils::errors::{Outcome, Rejection, Result};
use crate::utils::logging::log_rejection;

#[derive(Clone)]
pub struct WaitingListService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    requeue_after: Duration,
}

impl WaitingListService {
    pub fn new(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        requeue_after_minutes: i64,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            requeue_after: Duration::minutes(requeue_after_minutes),
        }
    }

    /// Join the queue of a full event; joining twice returns the existing entry
    pub async fn add_to_waiting_list(&self, event_id: i64, user_id: i64) -> Result<Outcome<WaitingListEntry>> {
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };

        if let Some(existing) = self.store.find_waiting_entry(event_id, user_id).await? {
            return Ok(Ok(existing));
        }
        if !event.status.accepts_applications() {
            return Ok(Err(Rejection::NotAcceptingApplications));
        }
        if event.has_vacancy() {
            return Ok(Err(Rejection::EventNotFull));
        }
        if self.store.find_active_participation(event_id, user_id).await?.is_some() {
            return Ok(Err(Rejection::AlreadyApplied));
        }

        let entry = self.store.enqueue_waiting(event_id, user_id, self.clock.now()).await?;
        info!(event_id = event_id, user_id = user_id, position = entry.position, "User joined waiting list");
        Ok(Ok(entry))
    }

    /// Leave the queue; later positions move up
    pub async fn withdraw(&self, event_id: i64, user_id: i64) -> Result<Outcome<()>> {
        let Some(entry) = self.store.find_waiting_entry(event_id, user_id).await? else {
            return Ok(Err(Rejection::NotOnWaitingList));
        };

        self.store.remove_waiting_entry(entry.id).await?;
        info!(event_id = event_id, user_id = user_id, "User left waiting list");
        Ok(Ok(()))
    }

    /// Offer the event's free slot to the queue, head first
    ///
    /// Each candidate is marked notified before applying on their behalf. An
    /// auto-approved candidate leaves the queue; a pending one stays queued as
    /// notified until the organizer approves them. A refused candidate stays
    /// queued and the next one is tried, unless the event itself stopped
    /// taking applications.
    pub async fn process_waiting_list(
        &self,
        participations: &ParticipationService,
        event_id: i64,
    ) -> Result<Option<Participation>> {
        loop {
            let entries = self.store.list_waiting_entries(event_id).await?;
            let Some(candidate) = entries.into_iter().find(|e| !e.notified) else {
                debug!(event_id = event_id, "No waiting candidates left to notify");
                return Ok(None);
            };

            self.store.mark_waiting_notified(candidate.id, self.clock.now()).await?;

            match participations.apply_to_event(event_id, candidate.user_id).await? {
                Ok(participation) => {
                    let approved = participation.status == ParticipationStatus::Aprovado;
                    if approved {
                        self.store.remove_waiting_entry(candidate.id).await?;
                    }
                    info!(
                        event_id = event_id,
                        user_id = candidate.user_id,
                        status = participation.status.as_str(),
                        still_queued = !approved,
                        "Waiting list candidate served"
                    );

                    let message = if approved {
                        "Abriu uma vaga e você foi inscrito no evento."
                    } else {
                        "Abriu uma vaga e sua candidatura foi enviada ao organizador."
                    };
                    notify_quietly(
                        self.notifier.as_ref(),
                        Notice::new(
                            candidate.user_id,
                            Some(event_id),
                            NotificationKind::WaitingListPromoted,
                            "Vaga disponível",
                            message,
                        ),
                    )
                    .await;
                    return Ok(Some(participation));
                }
                Err(rejection) => {
                    log_rejection("waiting_list_promotion", Some(event_id), Some(candidate.user_id), &rejection.to_string());
                    if blocks_whole_queue(&rejection) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Return stale notified entries to the queue and retry events that have room
    pub async fn requeue_stale(&self, participations: &ParticipationService) -> Result<usize> {
        let cutoff = self.clock.now() - self.requeue_after;
        let event_ids = self.store.requeue_stale_waiting_entries(cutoff).await?;
        let mut promoted = 0;

        for event_id in &event_ids {
            let Some(event) = self.store.get_event(*event_id).await? else {
                continue;
            };
            if event.has_vacancy() && self.process_waiting_list(participations, event.id).await?.is_some() {
                promoted += 1;
            }
        }

        debug!(requeued_events = event_ids.len(), promoted = promoted, "Waiting list requeue pass completed");
        Ok(promoted)
    }
}

/// Refusals that would refuse every other candidate too
fn blocks_whole_queue(rejection: &Rejection) -> bool {
    matches!(
        rejection,
        Rejection::EventNotFound
            | Rejection::NotAcceptingApplications
            | Rejection::NoVacancies
            | Rejection::ApplicationsClosed { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_refusals_do_not_block_queue() {
        assert!(blocks_whole_queue(&Rejection::NoVacancies));
        assert!(blocks_whole_queue(&Rejection::ApplicationsClosed { minutes: 5 }));
        assert!(!blocks_whole_queue(&Rejection::ScheduleConflict { conflicting_event_id: 3 }));
        assert!(!blocks_whole_queue(&Rejection::UserBanned));
    }
}
