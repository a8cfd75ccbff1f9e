//! Failed PIN attempt counters.
//!
//! One row per gift: a failure count and the start of the window it was
//! counted in. The caller supplies the expiry cutoff, and a reservation
//! made after it restarts the window.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::{Error, Result};

use super::DbPool;

#[derive(Debug, Clone, FromRow)]
pub struct UnlockAttempt {
    pub gift_id: String,
    pub failed_count: i64,
    pub window_started_at: DateTime<Utc>,
}

/// Get the counter for a gift, if any failures were recorded.
pub async fn get_unlock_attempt(pool: &DbPool, gift_id: &str) -> Result<Option<UnlockAttempt>> {
    sqlx::query_as::<_, UnlockAttempt>("SELECT * FROM unlock_attempts WHERE gift_id = ?")
        .bind(gift_id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Reserve one PIN attempt before the PIN is compared.
///
/// A window that started at or before `expired_before` is restarted at
/// `now` with a count of one. Inside a live window the count is bumped
/// only while it is below `max_attempts`. The check and the write are a
/// single statement, so concurrent requests can never reserve more slots
/// than the threshold allows. Returns `None` when the window is exhausted.
///
/// Timestamps are stored as UTC RFC 3339 text, which orders the same
/// lexically as in time.
pub async fn reserve_unlock_attempt(
    pool: &DbPool,
    gift_id: &str,
    now: DateTime<Utc>,
    expired_before: DateTime<Utc>,
    max_attempts: u32,
) -> Result<Option<UnlockAttempt>> {
    sqlx::query_as::<_, UnlockAttempt>(
        r#"
        INSERT INTO unlock_attempts (gift_id, failed_count, window_started_at)
        VALUES (?1, 1, ?2)
        ON CONFLICT(gift_id) DO UPDATE SET
            failed_count = CASE
                WHEN window_started_at <= ?3 THEN 1
                ELSE failed_count + 1
            END,
            window_started_at = CASE
                WHEN window_started_at <= ?3 THEN excluded.window_started_at
                ELSE window_started_at
            END
        WHERE window_started_at <= ?3 OR failed_count < ?4
        RETURNING *
        "#,
    )
    .bind(gift_id)
    .bind(now)
    .bind(expired_before)
    .bind(i64::from(max_attempts))
    .fetch_optional(pool)
    .await
    .map_err(Error::Database)
}

/// Clear the counter after a successful unlock or an admin reset.
pub async fn reset_unlock_attempts(pool: &DbPool, gift_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM unlock_attempts WHERE gift_id = ?")
        .bind(gift_id)
        .execute(pool)
        .await?;
    Ok(())
}
