//! Notification outbox repository

use sqlx::{FromRow, PgPool};
use chrono::{DateTime, Utc};
use crate::models::notification::{Notice, Notification};
use crate::utils::errors::{EncontroError, Result};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, event_id, kind, title, message, delivered, attempts, created_at, delivered_at";

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: i64,
    user_id: i64,
    event_id: Option<i64>,
    kind: String,
    title: String,
    message: String,
    delivered: bool,
    attempts: i32,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = EncontroError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            event_id: row.event_id,
            kind: row.kind.parse()?,
            title: row.title,
            message: row.message,
            delivered: row.delivered,
            attempts: row.attempts,
            created_at: row.created_at,
            delivered_at: row.delivered_at,
        })
    }
}

#[derive(Clone, Debug)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, notice: Notice, now: DateTime<Utc>) -> Result<Notification> {
        let sql = format!(
            r#"
            INSERT INTO notifications (user_id, event_id, kind, title, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(notice.user_id)
            .bind(notice.event_id)
            .bind(notice.kind.as_str())
            .bind(notice.title)
            .bind(notice.message)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    /// Oldest undelivered notices first
    pub async fn list_undelivered(&self, limit: i64) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE NOT delivered ORDER BY id ASC LIMIT $1",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    pub async fn mark_delivered(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE notifications SET delivered = TRUE, attempts = attempts + 1, delivered_at = $2 WHERE id = $1"
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_failure(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE notifications SET attempts = attempts + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
