//! Event repository implementation

use sqlx::{FromRow, PgPool};
use chrono::{DateTime, Utc};
use crate::models::event::{Event, EventStatus, NewEvent};
use crate::models::participation::ParticipationStatus;
use crate::utils::errors::{EncontroError, Result};

const EVENT_COLUMNS: &str = "id, title, creator_id, event_type, status, start_time, end_time, vagas, max_vagas, \
     venue_id, crusher_invited_user_id, entry_password, entry_locked, entry_opened_at, entry_locked_at, \
     cancelamento_motivo, created_at, updated_at";

#[derive(Debug, FromRow)]
struct EventRow {
    id: i64,
    title: String,
    creator_id: i64,
    event_type: String,
    status: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    vagas: i32,
    max_vagas: i32,
    venue_id: Option<i64>,
    crusher_invited_user_id: Option<i64>,
    entry_password: Option<String>,
    entry_locked: bool,
    entry_opened_at: Option<DateTime<Utc>>,
    entry_locked_at: Option<DateTime<Utc>>,
    cancelamento_motivo: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = EncontroError;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Event {
            id: row.id,
            title: row.title,
            creator_id: row.creator_id,
            event_type: row.event_type.parse()?,
            status: row.status.parse()?,
            start_time: row.start_time,
            end_time: row.end_time,
            vagas: row.vagas,
            max_vagas: row.max_vagas,
            venue_id: row.venue_id,
            crusher_invited_user_id: row.crusher_invited_user_id,
            entry_password: row.entry_password,
            entry_locked: row.entry_locked,
            entry_opened_at: row.entry_opened_at,
            entry_locked_at: row.entry_locked_at,
            cancelamento_motivo: row.cancelamento_motivo,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_events(rows: Vec<EventRow>) -> Result<Vec<Event>> {
    rows.into_iter().map(Event::try_from).collect()
}

#[derive(Clone, Debug)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event with every slot open
    pub async fn create(&self, request: NewEvent, now: DateTime<Utc>) -> Result<Event> {
        let sql = format!(
            r#"
            INSERT INTO events (title, creator_id, event_type, status, start_time, end_time, vagas, max_vagas,
                                venue_id, crusher_invited_user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $9, $10, $10)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(request.title)
            .bind(request.creator_id)
            .bind(request.event_type.as_str())
            .bind(EventStatus::Aberto.as_str())
            .bind(request.start_time)
            .bind(request.end_time)
            .bind(request.max_vagas)
            .bind(request.venue_id)
            .bind(request.crusher_invited_user_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Event::try_from).transpose()
    }

    /// Events that can still change status
    pub async fn list_active(&self) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events WHERE status NOT IN ($1, $2) ORDER BY start_time ASC",
            EVENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(EventStatus::Cancelado.as_str())
            .bind(EventStatus::Concluido.as_str())
            .fetch_all(&self.pool)
            .await?;

        into_events(rows)
    }

    /// Get events created by user
    pub async fn list_by_creator(&self, creator_id: i64) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events WHERE creator_id = $1 ORDER BY created_at DESC",
            EVENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(creator_id)
            .fetch_all(&self.pool)
            .await?;

        into_events(rows)
    }

    /// Non-terminal events the user holds an approved participation in
    pub async fn list_committed_for_user(&self, user_id: i64) -> Result<Vec<Event>> {
        let sql = format!(
            r#"
            SELECT {} FROM events
            WHERE status NOT IN ($2, $3)
              AND id IN (SELECT event_id FROM event_participants WHERE user_id = $1 AND status = $4)
            ORDER BY start_time ASC
            "#,
            EVENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(user_id)
            .bind(EventStatus::Cancelado.as_str())
            .bind(EventStatus::Concluido.as_str())
            .bind(ParticipationStatus::Aprovado.as_str())
            .fetch_all(&self.pool)
            .await?;

        into_events(rows)
    }

    /// Open events whose start time is at or before the cutoff
    pub async fn list_open_starting_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events WHERE status = $1 AND start_time <= $2",
            EVENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(EventStatus::Aberto.as_str())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        into_events(rows)
    }

    /// Confirmed or running events whose end time is at or before the cutoff
    pub async fn list_stale(&self, ended_before: DateTime<Utc>) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events WHERE status IN ($1, $2) AND end_time <= $3",
            EVENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(EventStatus::Confirmado.as_str())
            .bind(EventStatus::EmAndamento.as_str())
            .bind(ended_before)
            .fetch_all(&self.pool)
            .await?;

        into_events(rows)
    }

    /// Compare-and-set on the status column
    pub async fn transition_status(&self, id: i64, from: EventStatus, to: EventStatus, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE events SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn cancel(&self, id: i64, motivo: Option<String>, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = $2, cancelamento_motivo = $3, updated_at = $4
            WHERE id = $1 AND status NOT IN ($2, $5)
            "#
        )
        .bind(id)
        .bind(EventStatus::Cancelado.as_str())
        .bind(motivo)
        .bind(now)
        .bind(EventStatus::Concluido.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Atomic decrement guarded by `vagas > 0`
    pub async fn take_vacancy(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE events SET vagas = vagas - 1 WHERE id = $1 AND vagas > 0")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Atomic increment guarded by `vagas < max_vagas`
    pub async fn release_vacancy(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE events SET vagas = vagas + 1 WHERE id = $1 AND vagas < max_vagas")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn save_entry_password(&self, id: i64, password: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE events SET entry_password = $2, entry_opened_at = $3, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn lock_entry(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE events SET entry_locked = TRUE, entry_locked_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete the event and its dependents in one transaction, children first
    pub async fn delete_cascade(&self, id: i64, creator_id: Option<i64>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(i64,)> = sqlx::query_as("SELECT creator_id FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((stored_creator,)) = owner else {
            return Ok(false);
        };
        if creator_id.map_or(false, |expected| expected != stored_creator) {
            return Ok(false);
        }

        for table in ["event_participants", "notifications", "event_photos", "waiting_list", "ratings"] {
            let sql = format!("DELETE FROM {} WHERE event_id = $1", table);
            sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        }

        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }
}
