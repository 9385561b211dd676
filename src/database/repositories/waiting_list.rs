//! Waiting list repository implementation

use sqlx::{FromRow, PgPool, Postgres, Transaction};
use chrono::{DateTime, Utc};
use crate::models::waiting_list::WaitingListEntry;
use crate::utils::errors::Result;

const WAITING_COLUMNS: &str = "id, event_id, user_id, position, notified, notified_at, created_at";

#[derive(Debug, FromRow)]
struct WaitingListRow {
    id: i64,
    event_id: i64,
    user_id: i64,
    position: i32,
    notified: bool,
    notified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<WaitingListRow> for WaitingListEntry {
    fn from(row: WaitingListRow) -> Self {
        WaitingListEntry {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            position: row.position,
            notified: row.notified,
            notified_at: row.notified_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WaitingListRepository {
    pool: PgPool,
}

impl WaitingListRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append to the tail of the event's queue, or return the user's existing entry
    pub async fn enqueue(&self, event_id: i64, user_id: i64, now: DateTime<Utc>) -> Result<WaitingListEntry> {
        let mut tx = self.pool.begin().await?;

        // Serialize appends per event so positions stay unique
        sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        if let Some(existing) = Self::find_in(&mut tx, event_id, user_id).await? {
            tx.commit().await?;
            return Ok(existing);
        }

        let sql = format!(
            r#"
            INSERT INTO waiting_list (event_id, user_id, position, notified, created_at)
            SELECT $1, $2, COALESCE(MAX(position), 0) + 1, FALSE, $3
            FROM waiting_list WHERE event_id = $1
            RETURNING {}
            "#,
            WAITING_COLUMNS
        );
        let row = sqlx::query_as::<_, WaitingListRow>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn find_in(
        tx: &mut Transaction<'_, Postgres>,
        event_id: i64,
        user_id: i64,
    ) -> Result<Option<WaitingListEntry>> {
        let sql = format!(
            "SELECT {} FROM waiting_list WHERE event_id = $1 AND user_id = $2",
            WAITING_COLUMNS
        );
        let row = sqlx::query_as::<_, WaitingListRow>(&sql)
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(row.map(WaitingListEntry::from))
    }

    pub async fn find(&self, event_id: i64, user_id: i64) -> Result<Option<WaitingListEntry>> {
        let sql = format!(
            "SELECT {} FROM waiting_list WHERE event_id = $1 AND user_id = $2",
            WAITING_COLUMNS
        );
        let row = sqlx::query_as::<_, WaitingListRow>(&sql)
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(WaitingListEntry::from))
    }

    /// Queue of one event, head first
    pub async fn list_for_event(&self, event_id: i64) -> Result<Vec<WaitingListEntry>> {
        let sql = format!(
            "SELECT {} FROM waiting_list WHERE event_id = $1 ORDER BY position ASC",
            WAITING_COLUMNS
        );
        let rows = sqlx::query_as::<_, WaitingListRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(WaitingListEntry::from).collect())
    }

    pub async fn mark_notified(&self, entry_id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE waiting_list SET notified = TRUE, notified_at = $2 WHERE id = $1")
            .bind(entry_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete one entry and renumber the remaining queue 1..N in the same transaction
    pub async fn remove(&self, entry_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed: Option<(i64,)> = sqlx::query_as("DELETE FROM waiting_list WHERE id = $1 RETURNING event_id")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((event_id,)) = removed else {
            return Ok(false);
        };

        sqlx::query(
            r#"
            UPDATE waiting_list w
            SET position = ranked.rn::INTEGER
            FROM (
                SELECT id, ROW_NUMBER() OVER (ORDER BY position ASC) AS rn
                FROM waiting_list
                WHERE event_id = $1
            ) ranked
            WHERE w.id = ranked.id AND w.position <> ranked.rn
            "#
        )
        .bind(event_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Return notified entries older than the cutoff to the un-notified pool
    pub async fn requeue_stale(&self, notified_before: DateTime<Utc>) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            UPDATE waiting_list
            SET notified = FALSE, notified_at = NULL
            WHERE notified AND (notified_at IS NULL OR notified_at <= $1)
            RETURNING event_id
            "#
        )
        .bind(notified_before)
        .fetch_all(&self.pool)
        .await?;

        let mut event_ids: Vec<i64> = rows.into_iter().map(|(id,)| id).collect();
        event_ids.sort_unstable();
        event_ids.dedup();
        Ok(event_ids)
    }
}
