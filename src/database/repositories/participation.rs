//! Participation repository implementation

use sqlx::{FromRow, PgPool};
use chrono::{DateTime, Utc};
use crate::models::participation::{NewParticipation, Participation, ParticipationStatus};
use crate::utils::errors::{EncontroError, Result};

const PARTICIPATION_COLUMNS: &str =
    "id, event_id, user_id, status, presenca_confirmada, avaliacao_feita, com_acesso, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ParticipationRow {
    id: i64,
    event_id: i64,
    user_id: i64,
    status: String,
    presenca_confirmada: bool,
    avaliacao_feita: bool,
    com_acesso: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ParticipationRow> for Participation {
    type Error = EncontroError;

    fn try_from(row: ParticipationRow) -> Result<Self> {
        Ok(Participation {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            status: row.status.parse()?,
            presenca_confirmada: row.presenca_confirmada,
            avaliacao_feita: row.avaliacao_feita,
            com_acesso: row.com_acesso,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ParticipationRepository {
    pool: PgPool,
}

impl ParticipationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a candidacy
    pub async fn create(&self, request: NewParticipation, now: DateTime<Utc>) -> Result<Participation> {
        let sql = format!(
            r#"
            INSERT INTO event_participants (event_id, user_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {}
            "#,
            PARTICIPATION_COLUMNS
        );
        let row = sqlx::query_as::<_, ParticipationRow>(&sql)
            .bind(request.event_id)
            .bind(request.user_id)
            .bind(request.status.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Participation>> {
        let sql = format!("SELECT {} FROM event_participants WHERE id = $1", PARTICIPATION_COLUMNS);
        let row = sqlx::query_as::<_, ParticipationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Participation::try_from).transpose()
    }

    /// The pending or approved candidacy of a user
    pub async fn find_active(&self, event_id: i64, user_id: i64) -> Result<Option<Participation>> {
        let sql = format!(
            "SELECT {} FROM event_participants WHERE event_id = $1 AND user_id = $2 AND status IN ($3, $4)",
            PARTICIPATION_COLUMNS
        );
        let row = sqlx::query_as::<_, ParticipationRow>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(ParticipationStatus::Pendente.as_str())
            .bind(ParticipationStatus::Aprovado.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Participation::try_from).transpose()
    }

    /// Get event participants
    pub async fn list_for_event(&self, event_id: i64) -> Result<Vec<Participation>> {
        let sql = format!(
            "SELECT {} FROM event_participants WHERE event_id = $1 ORDER BY created_at ASC",
            PARTICIPATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ParticipationRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Participation::try_from).collect()
    }

    /// Compare-and-set on the status column
    pub async fn transition_status(
        &self,
        id: i64,
        from: ParticipationStatus,
        to: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE event_participants SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2"
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn confirm_presence(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.set_flag(id, "presenca_confirmada", now).await
    }

    pub async fn grant_access(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.set_flag(id, "com_acesso", now).await
    }

    pub async fn mark_evaluation_done(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.set_flag(id, "avaliacao_feita", now).await
    }

    async fn set_flag(&self, id: i64, column: &'static str, now: DateTime<Utc>) -> Result<()> {
        let sql = format!("UPDATE event_participants SET {} = TRUE, updated_at = $2 WHERE id = $1", column);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EncontroError::ParticipationNotFound { participation_id: id });
        }

        Ok(())
    }
}
