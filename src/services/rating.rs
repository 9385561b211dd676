//! Post-event ratings
//!
//! Present participants rate the host, fellow attendees and the venue. Once a
//! rater has every required rating type, their participation is marked as
//! evaluated, which feeds the auto-complete check of the status engine.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use crate::database::EventStore;
use crate::models::{Event, EventStatus, NewRating, Participation, Rating, RatingType};
use crate::services::clock::Clock;
use crate::utils::errors::{Outcome, Rejection, Result};
use crate::utils::logging::log_rejection;

/// Rating types `rater_id` owes for the event
///
/// Host is always required; participant only when someone other than the
/// rater and the host attended; restaurant only when the event has a venue.
pub fn required_rating_types(event: &Event, present: &[Participation], rater_id: i64) -> HashSet<RatingType> {
    let mut required = HashSet::from([RatingType::Host]);
    if present
        .iter()
        .any(|p| p.user_id != rater_id && p.user_id != event.creator_id)
    {
        required.insert(RatingType::Participant);
    }
    if event.venue_id.is_some() {
        required.insert(RatingType::Restaurant);
    }
    required
}

#[derive(Clone)]
pub struct RatingService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl RatingService {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create or overwrite a rating, then refresh the rater's evaluation flag
    pub async fn submit_rating(&self, rating: NewRating) -> Result<Outcome<Rating>> {
        let event_id = rating.event_id;
        let rater_id = rating.rater_id;
        let outcome = self.try_submit(rating).await?;
        if let Err(rejection) = &outcome {
            log_rejection("rate", Some(event_id), Some(rater_id), &rejection.to_string());
        }
        Ok(outcome)
    }

    async fn try_submit(&self, rating: NewRating) -> Result<Outcome<Rating>> {
        let now = self.clock.now();
        if !(1..=5).contains(&rating.score) {
            return Ok(Err(Rejection::InvalidScore));
        }

        let Some(event) = self.store.get_event(rating.event_id).await? else {
            return Ok(Err(Rejection::EventNotFound));
        };
        if matches!(event.status, EventStatus::Cancelado | EventStatus::Concluido) || !event.has_ended(now) {
            return Ok(Err(Rejection::RatingsClosed));
        }

        let participations = self.store.list_participations(event.id).await?;
        let present: Vec<Participation> = participations.into_iter().filter(|p| p.is_present()).collect();
        let Some(rater) = present.iter().find(|p| p.user_id == rating.rater_id).cloned() else {
            return Ok(Err(Rejection::NotAttendee));
        };

        let valid_target = match rating.rating_type {
            RatingType::Host => rating.rated_id == event.creator_id && rating.rater_id != event.creator_id,
            RatingType::Participant => {
                rating.rated_id != rating.rater_id
                    && rating.rated_id != event.creator_id
                    && present.iter().any(|p| p.user_id == rating.rated_id)
            }
            RatingType::Restaurant => event.venue_id == Some(rating.rated_id),
        };
        if !valid_target {
            return Ok(Err(Rejection::InvalidRatingTarget));
        }

        let saved = self.store.upsert_rating(rating, now).await?;
        debug!(
            event_id = saved.event_id,
            rater_id = saved.rater_id,
            rated_id = saved.rated_id,
            rating_type = saved.rating_type.as_str(),
            score = saved.score,
            "Rating saved"
        );

        if !rater.avaliacao_feita {
            let given: HashSet<RatingType> = self
                .store
                .list_ratings_by_rater(event.id, rater.user_id)
                .await?
                .into_iter()
                .map(|r| r.rating_type)
                .collect();
            if required_rating_types(&event, &present, rater.user_id).is_subset(&given) {
                self.store.mark_evaluation_done(rater.id, now).await?;
                debug!(event_id = event.id, user_id = rater.user_id, "All required ratings submitted");
            }
        }

        Ok(Ok(saved))
    }
}
