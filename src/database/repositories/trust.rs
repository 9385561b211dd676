//! Trust profile repository implementation

use sqlx::{FromRow, PgPool};
use chrono::{DateTime, Utc};
use crate::models::trust::{TrustProfile, MAX_TRUST_SCORE};
use crate::utils::errors::Result;

const PROFILE_COLUMNS: &str = "user_id, trust_score, is_banned, last_payment_id, updated_at";

#[derive(Debug, FromRow)]
struct TrustProfileRow {
    user_id: i64,
    trust_score: i32,
    is_banned: bool,
    last_payment_id: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<TrustProfileRow> for TrustProfile {
    fn from(row: TrustProfileRow) -> Self {
        TrustProfile {
            user_id: row.user_id,
            trust_score: row.trust_score,
            is_banned: row.is_banned,
            last_payment_id: row.last_payment_id,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrustRepository {
    pool: PgPool,
}

impl TrustRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: i64) -> Result<Option<TrustProfile>> {
        let sql = format!("SELECT {} FROM trust_profiles WHERE user_id = $1", PROFILE_COLUMNS);
        let row = sqlx::query_as::<_, TrustProfileRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TrustProfile::from))
    }

    /// Floor-at-zero decrement; a missing profile starts from the maximum
    pub async fn decrement(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrustProfile> {
        let sql = format!(
            r#"
            INSERT INTO trust_profiles (user_id, trust_score, is_banned, updated_at)
            VALUES ($1, $2 - 1, $2 - 1 = 0, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET trust_score = GREATEST(trust_profiles.trust_score - 1, 0),
                is_banned = GREATEST(trust_profiles.trust_score - 1, 0) = 0,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let row = sqlx::query_as::<_, TrustProfileRow>(&sql)
            .bind(user_id)
            .bind(MAX_TRUST_SCORE)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    pub async fn ban(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrustProfile> {
        let sql = format!(
            r#"
            INSERT INTO trust_profiles (user_id, trust_score, is_banned, updated_at)
            VALUES ($1, 0, TRUE, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET trust_score = 0, is_banned = TRUE, updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let row = sqlx::query_as::<_, TrustProfileRow>(&sql)
            .bind(user_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    /// Full reset after a paid unban
    pub async fn restore(&self, user_id: i64, payment_id: &str, now: DateTime<Utc>) -> Result<TrustProfile> {
        let sql = format!(
            r#"
            INSERT INTO trust_profiles (user_id, trust_score, is_banned, last_payment_id, updated_at)
            VALUES ($1, $2, FALSE, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET trust_score = EXCLUDED.trust_score,
                is_banned = FALSE,
                last_payment_id = EXCLUDED.last_payment_id,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let row = sqlx::query_as::<_, TrustProfileRow>(&sql)
            .bind(user_id)
            .bind(MAX_TRUST_SCORE)
            .bind(payment_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }
}
