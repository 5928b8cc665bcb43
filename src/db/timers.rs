//! Timer rows and the per-user current-timer slot.
//!
//! Every timer operation starts with [`lock_current`], which creates the
//! user's `timer_slots` row on first use and locks it with `FOR UPDATE`.
//! Concurrent requests for the same user queue on that lock, so the
//! check-then-act inside a transaction is serialised; requests for different
//! users never contend.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;

use super::Database;
use crate::timer::{Session, TimerStatus};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimerRow {
    pub id: i64,
    pub user_id: String,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: i64,
    pub target_seconds: Option<i64>,
    pub end_time: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
    pub pending_check_started_at: Option<DateTime<Utc>>,
    pub pending_check_deadline: Option<DateTime<Utc>>,
    pub invalidated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl TimerRow {
    /// The state-machine view of this row.
    pub fn session(&self) -> Result<Session> {
        Ok(Session {
            status: self.status.parse::<TimerStatus>()?,
            start_time: self.start_time,
            elapsed_seconds: self.elapsed_seconds,
            target_seconds: self.target_seconds,
            end_time: self.end_time,
            remaining_seconds: self.remaining_seconds,
            pending_check_started_at: self.pending_check_started_at,
            pending_check_deadline: self.pending_check_deadline,
            invalidated: self.invalidated,
        })
    }
}

/// The timer a user's slot points at.
#[derive(Debug, Clone)]
pub struct CurrentTimer {
    pub id: i64,
    pub session: Session,
}

/// Lock the user's slot and load the timer it points at.
///
/// Must run inside a transaction; the lock is held until commit/rollback.
pub async fn lock_current(conn: &mut PgConnection, user_id: &str) -> Result<Option<CurrentTimer>> {
    sqlx::query("INSERT INTO timer_slots (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let current_id: Option<i64> = sqlx::query_scalar(
        "SELECT current_timer_id FROM timer_slots WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let Some(id) = current_id else {
        return Ok(None);
    };

    let row = sqlx::query_as::<_, TimerRow>(
        "SELECT id, user_id, status, start_time, elapsed_seconds, target_seconds,
                end_time, remaining_seconds, pending_check_started_at,
                pending_check_deadline, invalidated, created_at, updated_at, stopped_at
         FROM timers WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let session = row
                .session()
                .with_context(|| format!("timer {} has a corrupt status", row.id))?;
            Ok(Some(CurrentTimer { id: row.id, session }))
        }
        None => Ok(None),
    }
}

/// Insert a new timer row for `user_id` and point the slot at it.
pub async fn insert_current(
    conn: &mut PgConnection,
    user_id: &str,
    session: &Session,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO timers (user_id, status, start_time, elapsed_seconds, target_seconds,
                             end_time, remaining_seconds, pending_check_started_at,
                             pending_check_deadline, invalidated)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING id",
    )
    .bind(user_id)
    .bind(session.status.as_str())
    .bind(session.start_time)
    .bind(session.elapsed_seconds)
    .bind(session.target_seconds)
    .bind(session.end_time)
    .bind(session.remaining_seconds)
    .bind(session.pending_check_started_at)
    .bind(session.pending_check_deadline)
    .bind(session.invalidated)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE timer_slots SET current_timer_id = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(id)
}

/// Overwrite the mutable columns of an existing timer row.
pub async fn update(conn: &mut PgConnection, id: i64, session: &Session) -> Result<()> {
    sqlx::query(
        "UPDATE timers SET
             status = $2,
             start_time = $3,
             elapsed_seconds = $4,
             end_time = $5,
             remaining_seconds = $6,
             pending_check_started_at = $7,
             pending_check_deadline = $8,
             invalidated = $9,
             updated_at = NOW(),
             stopped_at = CASE WHEN $2 = 'stopped' THEN COALESCE(stopped_at, NOW()) ELSE NULL END
         WHERE id = $1",
    )
    .bind(id)
    .bind(session.status.as_str())
    .bind(session.start_time)
    .bind(session.elapsed_seconds)
    .bind(session.end_time)
    .bind(session.remaining_seconds)
    .bind(session.pending_check_started_at)
    .bind(session.pending_check_deadline)
    .bind(session.invalidated)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Database {
    /// Most recent sessions for a user, newest first.
    pub async fn get_timer_history(&self, user_id: &str, limit: i64) -> Result<Vec<TimerRow>> {
        let rows = sqlx::query_as::<_, TimerRow>(
            "SELECT id, user_id, status, start_time, elapsed_seconds, target_seconds,
                    end_time, remaining_seconds, pending_check_started_at,
                    pending_check_deadline, invalidated, created_at, updated_at, stopped_at
             FROM timers WHERE user_id = $1
             ORDER BY id DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(status: &str) -> TimerRow {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        TimerRow {
            id: 7,
            user_id: "user-1".into(),
            status: status.into(),
            start_time: Some(t),
            elapsed_seconds: 120,
            target_seconds: Some(1500),
            end_time: Some(t + chrono::Duration::seconds(1380)),
            remaining_seconds: None,
            pending_check_started_at: None,
            pending_check_deadline: None,
            invalidated: false,
            created_at: t,
            updated_at: t,
            stopped_at: None,
        }
    }

    #[test]
    fn row_maps_to_session() {
        let s = row("running").session().unwrap();
        assert_eq!(s.status, TimerStatus::Running);
        assert_eq!(s.elapsed_seconds, 120);
        assert_eq!(s.target_seconds, Some(1500));
    }

    #[test]
    fn row_with_unknown_status_is_rejected() {
        assert!(row("completed").session().is_err());
    }
}
