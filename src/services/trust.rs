//! Trust score ledger
//!
//! Each confirmed no-show costs one point; at zero the user is banned until a
//! paid recovery resets the profile to the maximum score.

use std::sync::Arc;
use tracing::{debug, warn};
use crate::database::EventStore;
use crate::models::{Notice, NotificationKind, TrustProfile};
use crate::services::clock::Clock;
use crate::services::notification::{notify_quietly, Notifier};
use crate::utils::errors::{Outcome, Rejection, Result};
use crate::utils::logging::log_trust_change;

#[derive(Clone)]
pub struct TrustService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl TrustService {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, clock, notifier }
    }

    /// Current profile; users never penalized have a fresh one
    pub async fn get_trust_profile(&self, user_id: i64) -> Result<TrustProfile> {
        let profile = self.store.get_trust_profile(user_id).await?;
        Ok(profile.unwrap_or_else(|| TrustProfile::fresh(user_id, self.clock.now())))
    }

    pub async fn is_banned(&self, user_id: i64) -> Result<bool> {
        Ok(self.get_trust_profile(user_id).await?.is_banned)
    }

    /// One point off, floored at zero; reaching zero bans the user
    pub async fn penalize_no_show(&self, user_id: i64) -> Result<TrustProfile> {
        let was_banned = self.is_banned(user_id).await?;
        let profile = self.store.decrement_trust_score(user_id, self.clock.now()).await?;
        log_trust_change(user_id, profile.trust_score, profile.is_banned, "no_show");

        if profile.trust_score == 0 && !was_banned {
            return self.ban_user(user_id).await;
        }
        Ok(profile)
    }

    pub async fn ban_user(&self, user_id: i64) -> Result<TrustProfile> {
        let profile = self.store.ban_user(user_id, self.clock.now()).await?;
        warn!(user_id = user_id, "User banned after reaching zero trust score");

        notify_quietly(
            self.notifier.as_ref(),
            Notice::new(
                user_id,
                None,
                NotificationKind::UserBanned,
                "Conta suspensa",
                "Sua pontuação de confiança chegou a zero por faltas. Regularize o pagamento para voltar a participar.",
            ),
        )
        .await;
        Ok(profile)
    }

    /// Penalize every approved participant who confirmed presence but never entered
    pub async fn penalize_no_shows_for_event(&self, event_id: i64) -> Result<Vec<TrustProfile>> {
        let participations = self.store.list_participations(event_id).await?;
        let mut penalized = Vec::new();

        for participation in participations.iter().filter(|p| p.is_no_show()) {
            penalized.push(self.penalize_no_show(participation.user_id).await?);
        }

        debug!(event_id = event_id, penalized = penalized.len(), "No-show penalties applied");
        Ok(penalized)
    }

    /// Full reset to the maximum score; the only way out of a ban
    pub async fn unban_user_after_payment(&self, user_id: i64, payment_id: &str) -> Result<Outcome<TrustProfile>> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() {
            return Ok(Err(Rejection::InvalidPayment));
        }

        let profile = self.store.restore_trust_profile(user_id, payment_id, self.clock.now()).await?;
        log_trust_change(user_id, profile.trust_score, profile.is_banned, "payment_recovery");

        notify_quietly(
            self.notifier.as_ref(),
            Notice::new(
                user_id,
                None,
                NotificationKind::UserUnbanned,
                "Conta reativada",
                "Pagamento confirmado. Sua pontuação de confiança foi restaurada.",
            ),
        )
        .await;
        Ok(Ok(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::database::InMemoryStore;
    use crate::models::MAX_TRUST_SCORE;
    use crate::services::clock::ManualClock;
    use crate::services::notification::OutboxNotifier;

    fn service() -> (TrustService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let notifier = Arc::new(OutboxNotifier::new(store.clone(), clock.clone()));
        (TrustService::new(store.clone(), clock, notifier), store)
    }

    #[tokio::test]
    async fn test_five_penalties_ban_and_sixth_stays_at_zero() {
        let (trust, store) = service();

        for expected in (0..MAX_TRUST_SCORE).rev() {
            let profile = trust.penalize_no_show(9).await.unwrap();
            assert_eq!(profile.trust_score, expected);
        }
        let profile = trust.get_trust_profile(9).await.unwrap();
        assert_eq!(profile.trust_score, 0);
        assert!(profile.is_banned);

        let profile = trust.penalize_no_show(9).await.unwrap();
        assert_eq!(profile.trust_score, 0);
        assert!(profile.is_banned);

        let bans = store
            .list_notifications_for_user(9)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::UserBanned)
            .count();
        assert_eq!(bans, 1);
    }

    #[tokio::test]
    async fn test_payment_recovery_resets_profile() {
        let (trust, _) = service();
        trust.ban_user(3).await.unwrap();

        assert_eq!(trust.unban_user_after_payment(3, "  ").await.unwrap(), Err(Rejection::InvalidPayment));

        let profile = trust.unban_user_after_payment(3, "pay_123").await.unwrap().unwrap();
        assert_eq!(profile.trust_score, MAX_TRUST_SCORE);
        assert!(!profile.is_banned);
        assert_eq!(profile.last_payment_id.as_deref(), Some("pay_123"));
    }
}
