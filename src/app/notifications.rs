use anyhow::Result;
use futures::future::join_all;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::{Duration, OffsetDateTime};

use crate::domain::new_id;
use crate::domain::notification::{
    Notification, NotificationData, NotificationJob, NotificationPayload, Recipients,
};
use crate::infra::db::{from_millis, from_millis_opt, to_millis, Db};

/// Producer side of the notification queue. Jobs become visible to the
/// dispatcher once `process_at` has passed.
#[derive(Clone)]
pub struct NotificationQueue {
    db: Db,
    default_delay_minutes: i64,
}

impl NotificationQueue {
    pub fn new(db: Db, default_delay_minutes: i64) -> Self {
        Self {
            db,
            default_delay_minutes,
        }
    }

    pub fn default_delay_minutes(&self) -> i64 {
        self.default_delay_minutes
    }

    pub async fn add_to_queue(
        &self,
        data: NotificationData,
        delay_minutes: i64,
    ) -> Result<NotificationJob> {
        let now = OffsetDateTime::now_utc();
        let job = NotificationJob {
            id: new_id("job"),
            process_at: now + Duration::minutes(delay_minutes),
            data,
            attempts: 0,
            processed_at: None,
        };

        sqlx::query(
            "INSERT INTO notification_queue \
             (id, process_at, user_id, notification_type, title, message, link, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(to_millis(job.process_at))
        .bind(&job.data.user_id)
        .bind(&job.data.notification_type)
        .bind(&job.data.title)
        .bind(&job.data.message)
        .bind(&job.data.link)
        .bind(to_millis(now))
        .execute(self.db.pool())
        .await?;

        tracing::debug!(job_id = %job.id, user_id = %job.data.user_id, "notification queued");
        Ok(job)
    }

    /// Enqueues one job per recipient concurrently. A recipient whose insert
    /// fails is logged and skipped; the other jobs stay queued.
    pub async fn queue_notification(
        &self,
        recipients: impl Into<Recipients>,
        payload: &NotificationPayload,
        delay_minutes: Option<i64>,
    ) -> Vec<NotificationJob> {
        let delay = delay_minutes.unwrap_or(self.default_delay_minutes);
        let ids = recipients.into().into_ids();

        let results = join_all(ids.into_iter().map(|user_id| {
            let data = payload.for_user(user_id.clone());
            async move { (user_id, self.add_to_queue(data, delay).await) }
        }))
        .await;

        let mut jobs = Vec::with_capacity(results.len());
        for (user_id, result) in results {
            match result {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    tracing::warn!(error = ?err, user_id = %user_id, "failed to queue notification");
                }
            }
        }
        jobs
    }

    pub async fn list_pending(&self, limit: i64) -> Result<Vec<NotificationJob>> {
        let rows = sqlx::query(
            "SELECT id, process_at, user_id, notification_type, title, message, link, attempts, \
             processed_at \
             FROM notification_queue \
             WHERE processed_at IS NULL \
             ORDER BY process_at, id \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(job_from_row).collect()
    }
}

pub(crate) fn job_from_row(row: &SqliteRow) -> Result<NotificationJob> {
    Ok(NotificationJob {
        id: row.get("id"),
        process_at: from_millis(row.get("process_at"))?,
        data: NotificationData {
            user_id: row.get("user_id"),
            notification_type: row.get("notification_type"),
            title: row.get("title"),
            message: row.get("message"),
            link: row.get("link"),
        },
        attempts: row.get("attempts"),
        processed_at: from_millis_opt(row.get("processed_at"))?,
    })
}

/// A user's delivered notifications.
#[derive(Clone)]
pub struct NotificationService {
    db: Db,
}

impl NotificationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        user_id: &str,
        cursor: Option<(OffsetDateTime, String)>,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let rows = match cursor {
            Some((created_at, notification_id)) => {
                sqlx::query(
                    "SELECT id, user_id, notification_type, title, message, link, read_at, created_at \
                     FROM notifications \
                     WHERE user_id = ?1 \
                       AND (created_at < ?2 OR (created_at = ?2 AND id < ?3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT ?4",
                )
                .bind(user_id)
                .bind(to_millis(created_at))
                .bind(notification_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, user_id, notification_type, title, message, link, read_at, created_at \
                     FROM notifications \
                     WHERE user_id = ? \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT ?",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut notifications = Vec::with_capacity(rows.len());
        for row in rows {
            notifications.push(Notification {
                id: row.get("id"),
                user_id: row.get("user_id"),
                notification_type: row.get("notification_type"),
                title: row.get("title"),
                message: row.get("message"),
                link: row.get("link"),
                read_at: from_millis_opt(row.get("read_at"))?,
                created_at: from_millis(row.get("created_at"))?,
            });
        }

        Ok(notifications)
    }

    pub async fn mark_read(&self, notification_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET read_at = ? \
             WHERE id = ? AND user_id = ? AND read_at IS NULL",
        )
        .bind(to_millis(OffsetDateTime::now_utc()))
        .bind(notification_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
