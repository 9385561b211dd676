//! Trust profile model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Score of a fresh or fully recovered profile
pub const MAX_TRUST_SCORE: i32 = 5;

/// Reliability state kept on the user profile
///
/// `is_banned` holds exactly when `trust_score` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustProfile {
    pub user_id: i64,
    pub trust_score: i32,
    pub is_banned: bool,
    pub last_payment_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TrustProfile {
    pub fn fresh(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            trust_score: MAX_TRUST_SCORE,
            is_banned: false,
            last_payment_id: None,
            updated_at: now,
        }
    }
}
