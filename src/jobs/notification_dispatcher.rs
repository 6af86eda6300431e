use anyhow::Result;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::app::notifications::job_from_row;
use crate::domain::new_id;
use crate::domain::notification::NotificationJob;
use crate::infra::db::{to_millis, Db};

const ERROR_BACKOFF_MS: u64 = 1000;

/// A job that has failed this many times is left in the queue undelivered.
pub const MAX_DELIVERY_ATTEMPTS: i64 = 5;
const RETRY_BASE_SECONDS: i64 = 30;

/// Polls the notification queue and delivers every due job into its
/// recipient's inbox.
pub async fn run(db: Db, poll_interval: Duration, batch_size: i64) -> Result<()> {
    info!(
        poll_seconds = poll_interval.as_secs(),
        batch_size, "notification dispatcher started"
    );
    loop {
        match dispatch_due(&db, OffsetDateTime::now_utc(), batch_size).await {
            Ok(delivered) if delivered as i64 >= batch_size => {
                // A full batch usually means more jobs are waiting.
                continue;
            }
            Ok(_) => {
                tokio::time::sleep(poll_interval).await;
            }
            Err(err) => {
                warn!(error = ?err, "notification dispatch failed, backing off");
                tokio::time::sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
            }
        }
    }
}

/// Delivers up to `limit` jobs whose `process_at` is at or before `now`.
/// Returns how many were delivered.
pub async fn dispatch_due(db: &Db, now: OffsetDateTime, limit: i64) -> Result<usize> {
    let rows = sqlx::query(
        "SELECT id, process_at, user_id, notification_type, title, message, link, attempts, \
         processed_at \
         FROM notification_queue \
         WHERE processed_at IS NULL AND process_at <= ? AND attempts < ? \
         ORDER BY process_at, id \
         LIMIT ?",
    )
    .bind(to_millis(now))
    .bind(MAX_DELIVERY_ATTEMPTS)
    .bind(limit)
    .fetch_all(db.pool())
    .await?;

    let mut delivered = 0;
    for row in &rows {
        let job = job_from_row(row)?;
        match deliver(db, &job, now).await {
            Ok(true) => delivered += 1,
            Ok(false) => {}
            Err(err) => {
                error!(
                    error = ?err,
                    job_id = %job.id,
                    attempt = job.attempts + 1,
                    "failed to deliver notification"
                );
                if let Err(err) = record_failure(db, &job, now).await {
                    error!(error = ?err, job_id = %job.id, "failed to reschedule notification");
                }
            }
        }
    }

    if delivered > 0 {
        info!(delivered, "notifications delivered");
    }
    Ok(delivered)
}

async fn deliver(db: &Db, job: &NotificationJob, now: OffsetDateTime) -> Result<bool> {
    let mut tx = db.pool().begin().await?;

    let claimed = sqlx::query(
        "UPDATE notification_queue SET processed_at = ? WHERE id = ? AND processed_at IS NULL",
    )
    .bind(to_millis(now))
    .bind(&job.id)
    .execute(&mut *tx)
    .await?;
    if claimed.rows_affected() == 0 {
        return Ok(false);
    }

    let inserted = sqlx::query(
        "INSERT INTO notifications \
         (id, job_id, user_id, notification_type, title, message, link, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (job_id) DO NOTHING",
    )
    .bind(new_id("ntf"))
    .bind(&job.id)
    .bind(&job.data.user_id)
    .bind(&job.data.notification_type)
    .bind(&job.data.title)
    .bind(&job.data.message)
    .bind(&job.data.link)
    .bind(to_millis(now))
    .execute(&mut *tx)
    .await;
    if let Err(err) = inserted {
        // Release the write lock before the failure is recorded.
        tx.rollback().await?;
        return Err(err.into());
    }

    tx.commit().await?;
    Ok(true)
}

/// Counts the failed attempt and pushes the job back with an exponential delay.
async fn record_failure(db: &Db, job: &NotificationJob, now: OffsetDateTime) -> Result<()> {
    let attempts = job.attempts + 1;
    let retry_at = now + retry_delay(attempts);
    sqlx::query(
        "UPDATE notification_queue SET attempts = ?, process_at = ? \
         WHERE id = ? AND processed_at IS NULL",
    )
    .bind(attempts)
    .bind(to_millis(retry_at))
    .bind(&job.id)
    .execute(db.pool())
    .await?;

    if attempts >= MAX_DELIVERY_ATTEMPTS {
        warn!(job_id = %job.id, attempts, "notification dropped after repeated failures");
    }
    Ok(())
}

fn retry_delay(attempts: i64) -> time::Duration {
    let exponent = attempts.clamp(1, 10) - 1;
    time::Duration::seconds(RETRY_BASE_SECONDS << exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay(1), time::Duration::seconds(30));
        assert_eq!(retry_delay(2), time::Duration::seconds(60));
        assert_eq!(retry_delay(4), time::Duration::seconds(240));
        assert_eq!(retry_delay(50), retry_delay(10));
    }
}
