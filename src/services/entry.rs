//! Entry security gate
//!
//! A 4-digit password lets approved participants register physical entry
//! between one minute before start and the event's end. Attempts are rate
//! limited per participant and event.

use std::num::NonZeroU32;
use std::sync::Arc;
use chrono::{Duration, Utc, DateTime};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};
use crate::database::EventStore;
use crate::models::{Event, EventStatus, Participation};
use crate::services::clock::Clock;
use crate::utils::errors::{EncontroError, Outcome, Rejection, Result};
use crate::utils::logging::{log_event_action, log_participation_action, log_rejection};

/// Entry opens this many seconds before start
pub const ENTRY_OPENS_BEFORE_SECS: i64 = 60;

/// Password presented at the door
#[derive(Debug, Clone, Deserialize)]
pub struct EntryAttempt {
    pub event_id: i64,
    /// User id of the participant trying to enter
    pub participant_id: i64,
    pub password: String,
}

/// Whether entry is possible for `event` at `now`
pub fn check_entry_window(event: &Event, now: DateTime<Utc>) -> Outcome<()> {
    if event.entry_locked {
        return Err(Rejection::EntryLocked);
    }
    if !matches!(event.status, EventStatus::Confirmado | EventStatus::EmAndamento) {
        return Err(Rejection::EntryWrongState);
    }
    if now < event.start_time - Duration::seconds(ENTRY_OPENS_BEFORE_SECS) {
        return Err(Rejection::EntryNotOpen);
    }
    if now > event.end_time {
        return Err(Rejection::EntryClosed);
    }
    Ok(())
}

#[derive(Clone)]
pub struct EntryService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    limiter: Option<Arc<DefaultKeyedRateLimiter<(i64, i64)>>>,
    password_format: Regex,
}

impl EntryService {
    /// `max_attempts_per_minute == 0` disables attempt limiting
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, max_attempts_per_minute: u32) -> Result<Self> {
        let limiter = NonZeroU32::new(max_attempts_per_minute)
            .map(|per_minute| Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))));
        let password_format = Regex::new(r"^\d{4}$")
            .map_err(|e| EncontroError::Config(format!("Invalid password pattern: {}", e)))?;

        Ok(Self {
            store,
            clock,
            limiter,
            password_format,
        })
    }

    /// Drop attempt counters whose quota has refilled; returns how many are still tracked
    pub fn prune_attempt_counters(&self) -> usize {
        let Some(limiter) = &self.limiter else {
            return 0;
        };
        limiter.retain_recent();
        limiter.shrink_to_fit();
        let tracked = limiter.len();
        debug!(tracked = tracked, "Entry attempt counters pruned");
        tracked
    }

    /// Issue a fresh 4-digit password for the organizer to share at the door
    pub async fn generate_and_save_password(&self, event_id: i64, creator_id: i64) -> Result<Outcome<String>> {
        let now = self.clock.now();
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };
        if !event.is_creator(creator_id) {
            warn!(event_id = event_id, user_id = creator_id, "Non-creator tried to generate entry password");
            return Ok(Err(Rejection::NotCreator));
        }
        if let Err(rejection) = check_entry_window(&event, now) {
            return Ok(Err(rejection));
        }

        let password = format!("{:04}", rand::thread_rng().gen_range(0..10_000));
        self.store.save_entry_password(event_id, &password, now).await?;
        log_event_action(event_id, "entry_password_generated", creator_id, None);
        Ok(Ok(password))
    }

    /// Check a password and mark the participant as entered
    pub async fn validate_entry_password(&self, attempt: EntryAttempt) -> Result<Outcome<Participation>> {
        let outcome = self.try_validate(&attempt).await?;
        if let Err(rejection) = &outcome {
            log_rejection("entry", Some(attempt.event_id), Some(attempt.participant_id), &rejection.to_string());
        }
        Ok(outcome)
    }

    async fn try_validate(&self, attempt: &EntryAttempt) -> Result<Outcome<Participation>> {
        let now = self.clock.now();
        let password = attempt.password.trim();
        if !self.password_format.is_match(password) {
            return Ok(Err(Rejection::InvalidPasswordFormat));
        }

        if let Some(limiter) = &self.limiter {
            if limiter.check_key(&(attempt.event_id, attempt.participant_id)).is_err() {
                warn!(
                    event_id = attempt.event_id,
                    user_id = attempt.participant_id,
                    "Too many entry password attempts"
                );
                return Ok(Err(Rejection::TooManyAttempts));
            }
        }

        let Some(event) = self.store.get_event(attempt.event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };
        if let Err(rejection) = check_entry_window(&event, now) {
            return Ok(Err(rejection));
        }

        let Some(stored) = event.entry_password.as_deref().map(str::trim) else {
            return Ok(Err(Rejection::PasswordNotSet));
        };
        if stored != password {
            return Ok(Err(Rejection::WrongPassword));
        }

        let participation = match self
            .store
            .find_active_participation(attempt.event_id, attempt.participant_id)
            .await?
        {
            Some(p) if p.is_approved() => p,
            _ => return Ok(Err(Rejection::NotApprovedParticipant)),
        };

        self.store.grant_access(participation.id, now).await?;
        log_participation_action(participation.id, event.id, participation.user_id, participation.status, "entry");

        Ok(Ok(Participation {
            com_acesso: true,
            updated_at: now,
            ..participation
        }))
    }

    /// Close entry early regardless of the time window
    pub async fn lock_event_entry(&self, event_id: i64, creator_id: i64) -> Result<Outcome<()>> {
        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };
        if !event.is_creator(creator_id) {
            warn!(event_id = event_id, user_id = creator_id, "Non-creator tried to lock entry");
            return Ok(Err(Rejection::NotCreator));
        }

        self.store.lock_entry(event_id, self.clock.now()).await?;
        info!(event_id = event_id, user_id = creator_id, "Event entry locked");
        Ok(Ok(()))
    }
}
