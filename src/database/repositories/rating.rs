//! Rating repository implementation

use sqlx::{FromRow, PgPool};
use chrono::{DateTime, Utc};
use crate::models::rating::{NewRating, Rating};
use crate::utils::errors::{EncontroError, Result};

const RATING_COLUMNS: &str = "id, event_id, rater_id, rated_id, rating_type, score, created_at, updated_at";

#[derive(Debug, FromRow)]
struct RatingRow {
    id: i64,
    event_id: i64,
    rater_id: i64,
    rated_id: i64,
    rating_type: String,
    score: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RatingRow> for Rating {
    type Error = EncontroError;

    fn try_from(row: RatingRow) -> Result<Self> {
        Ok(Rating {
            id: row.id,
            event_id: row.event_id,
            rater_id: row.rater_id,
            rated_id: row.rated_id,
            rating_type: row.rating_type.parse()?,
            score: row.score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RatingRepository {
    pool: PgPool,
}

impl RatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the score for (event, rater, rated, type)
    pub async fn upsert(&self, request: NewRating, now: DateTime<Utc>) -> Result<Rating> {
        let sql = format!(
            r#"
            INSERT INTO ratings (event_id, rater_id, rated_id, rating_type, score, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (event_id, rater_id, rated_id, rating_type)
            DO UPDATE SET score = EXCLUDED.score, updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            RATING_COLUMNS
        );
        let row = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(request.event_id)
            .bind(request.rater_id)
            .bind(request.rated_id)
            .bind(request.rating_type.as_str())
            .bind(request.score)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    pub async fn list_by_rater(&self, event_id: i64, rater_id: i64) -> Result<Vec<Rating>> {
        let sql = format!(
            "SELECT {} FROM ratings WHERE event_id = $1 AND rater_id = $2 ORDER BY id ASC",
            RATING_COLUMNS
        );
        let rows = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(event_id)
            .bind(rater_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Rating::try_from).collect()
    }
}
