//! # Session — Transactional Timer Operations
//!
//! [`TimerService`] wires the pure state machine ([`crate::timer`]) and the
//! reward calculator ([`crate::reward`]) to the store. Each operation is one
//! read-modify-write transaction:
//!
//! 1. lock the user's timer slot (`SELECT ... FOR UPDATE`)
//! 2. load the current timer
//! 3. run the transition with the caller's `now`
//! 4. persist the timer and, when a session finishes, credit the wallet
//! 5. commit
//!
//! A rejected transition returns before anything is written and the
//! transaction rolls back on drop. A store error at any step has the same
//! effect, so elapsed time is never half-folded and coins are never paid
//! without the matching stop.
//!
//! Countdown expiry has no background sweep. [`TimerService::state`] runs
//! the expiry check first and finalizes the session inside the same
//! transaction; the slot lock makes that payout happen at most once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use tracing::info;

use crate::db::{self, Database};
use crate::error::ServiceError;
use crate::reward::{self, level_to_multiplier, Award, Coins, Multiplier};
use crate::timer::{self, QueryOutcome, Session, StartOutcome, TimerStatus};

/// How finished sessions are paid.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardPolicy {
    /// Pay invalidated sessions anyway and only flag them.
    pub pay_invalidated_sessions: bool,
}

/// Coins paid for a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct Payout {
    #[serde(flatten)]
    pub award: Award,
    pub wallet_total: Coins,
    pub invalidated: bool,
}

/// `GET` timer state.
#[derive(Debug, Clone, Serialize)]
pub struct TimerStateView {
    pub status: TimerStatus,
    pub elapsed_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_session_seconds: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub autostopped: bool,
    #[serde(flatten)]
    pub payout: Option<Payout>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartView {
    pub message: &'static str,
    pub status: TimerStatus,
    pub resumed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PauseView {
    pub status: TimerStatus,
    pub elapsed_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopView {
    pub status: TimerStatus,
    pub elapsed_seconds: i64,
    #[serde(flatten)]
    pub payout: Payout,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckView {
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmView {
    pub invalidated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub user_id: String,
    pub level: i32,
    pub multiplier: Multiplier,
    pub coins: Coins,
}

#[derive(Clone)]
pub struct TimerService {
    db: Database,
    policy: RewardPolicy,
}

impl TimerService {
    pub fn new(db: Database, policy: RewardPolicy) -> Self {
        TimerService { db, policy }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Read the current state. An expired countdown is stopped and paid here.
    pub async fn state(&self, user_id: &str, now: DateTime<Utc>) -> Result<TimerStateView, ServiceError> {
        let mut tx = self.db.pool().begin().await?;
        let current = db::timers::lock_current(&mut tx, user_id).await?;

        let view = match timer::query(current.as_ref().map(|c| &c.session), now) {
            QueryOutcome::Idle {
                last_session_seconds,
            } => TimerStateView {
                status: TimerStatus::Stopped,
                elapsed_seconds: 0,
                last_session_seconds,
                start_time: None,
                remaining_seconds: None,
                check_deadline: None,
                autostopped: false,
                payout: None,
            },
            QueryOutcome::Paused {
                elapsed_seconds,
                remaining_seconds,
            } => TimerStateView {
                status: TimerStatus::Paused,
                elapsed_seconds,
                last_session_seconds: None,
                start_time: None,
                remaining_seconds,
                check_deadline: None,
                autostopped: false,
                payout: None,
            },
            QueryOutcome::Running {
                elapsed_seconds,
                start_time,
                remaining_seconds,
                check_deadline,
            } => TimerStateView {
                status: TimerStatus::Running,
                elapsed_seconds,
                last_session_seconds: None,
                start_time: Some(start_time),
                remaining_seconds,
                check_deadline,
                autostopped: false,
                payout: None,
            },
            QueryOutcome::Expired(finished) => {
                let timer_id = current.as_ref().map(|c| c.id).ok_or_else(|| {
                    anyhow::anyhow!("expired session without a current timer row")
                })?;
                db::timers::update(&mut tx, timer_id, &finished).await?;
                let payout = self.pay_out(&mut tx, user_id, &finished).await?;
                info!(
                    user_id,
                    timer_id,
                    elapsed_seconds = finished.elapsed_seconds,
                    earned_cents = payout.award.earned_coins.cents(),
                    "countdown expired, session autostopped"
                );
                TimerStateView {
                    status: TimerStatus::Stopped,
                    elapsed_seconds: 0,
                    last_session_seconds: Some(finished.elapsed_seconds),
                    start_time: None,
                    remaining_seconds: None,
                    check_deadline: None,
                    autostopped: true,
                    payout: Some(payout),
                }
            }
        };

        tx.commit().await?;
        Ok(view)
    }

    /// Start a new session or resume the paused one.
    pub async fn start(
        &self,
        user_id: &str,
        duration_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<StartView, ServiceError> {
        let mut tx = self.db.pool().begin().await?;
        let current = db::timers::lock_current(&mut tx, user_id).await?;
        let outcome = timer::start(current.as_ref().map(|c| &c.session), duration_minutes, now)?;

        let (timer_id, resumed) = match (&outcome, &current) {
            (StartOutcome::Resumed(s), Some(cur)) => {
                db::timers::update(&mut tx, cur.id, s).await?;
                (cur.id, true)
            }
            (other, _) => {
                let id = db::timers::insert_current(&mut tx, user_id, other.session()).await?;
                (id, false)
            }
        };
        tx.commit().await?;

        let session = outcome.session();
        info!(
            user_id,
            timer_id,
            resumed,
            target_seconds = session.target_seconds,
            "timer started"
        );
        Ok(StartView {
            message: if resumed { "Timer resumed" } else { "Timer started" },
            status: session.status,
            resumed,
            end_time: session.end_time,
        })
    }

    pub async fn pause(&self, user_id: &str, now: DateTime<Utc>) -> Result<PauseView, ServiceError> {
        let mut tx = self.db.pool().begin().await?;
        let current = db::timers::lock_current(&mut tx, user_id).await?;
        let paused = timer::pause(current.as_ref().map(|c| &c.session), now)?;
        let timer_id = active_id(&current)?;
        db::timers::update(&mut tx, timer_id, &paused).await?;
        tx.commit().await?;

        info!(
            user_id,
            timer_id,
            elapsed_seconds = paused.elapsed_seconds,
            "timer paused"
        );
        Ok(PauseView {
            status: paused.status,
            elapsed_seconds: paused.elapsed_seconds,
            remaining_seconds: paused.remaining_seconds,
        })
    }

    /// Stop the active session and pay out.
    pub async fn stop(
        &self,
        user_id: &str,
        cap_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<StopView, ServiceError> {
        let mut tx = self.db.pool().begin().await?;
        let current = db::timers::lock_current(&mut tx, user_id).await?;
        let finished = timer::stop(current.as_ref().map(|c| &c.session), cap_seconds, now)?;
        let timer_id = active_id(&current)?;
        db::timers::update(&mut tx, timer_id, &finished).await?;
        let payout = self.pay_out(&mut tx, user_id, &finished).await?;
        tx.commit().await?;

        info!(
            user_id,
            timer_id,
            elapsed_seconds = finished.elapsed_seconds,
            earned_cents = payout.award.earned_coins.cents(),
            invalidated = finished.invalidated,
            "timer stopped"
        );
        Ok(StopView {
            status: finished.status,
            elapsed_seconds: finished.elapsed_seconds,
            payout,
        })
    }

    pub async fn start_attention_check(
        &self,
        user_id: &str,
        window_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<CheckView, ServiceError> {
        let mut tx = self.db.pool().begin().await?;
        let current = db::timers::lock_current(&mut tx, user_id).await?;
        let checked =
            timer::start_attention_check(current.as_ref().map(|c| &c.session), window_seconds, now)?;
        let timer_id = active_id(&current)?;
        db::timers::update(&mut tx, timer_id, &checked).await?;
        tx.commit().await?;

        let (started_at, deadline) = match (checked.pending_check_started_at, checked.pending_check_deadline) {
            (Some(s), Some(d)) => (s, d),
            _ => return Err(anyhow::anyhow!("attention check window was not recorded").into()),
        };
        info!(user_id, timer_id, %deadline, "attention check started");
        Ok(CheckView {
            started_at,
            deadline,
        })
    }

    pub async fn confirm_attention_check(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmView, ServiceError> {
        let mut tx = self.db.pool().begin().await?;
        let current = db::timers::lock_current(&mut tx, user_id).await?;
        let confirmed = timer::confirm_attention_check(current.as_ref().map(|c| &c.session), now)?;
        let timer_id = active_id(&current)?;
        db::timers::update(&mut tx, timer_id, &confirmed).await?;
        tx.commit().await?;

        info!(
            user_id,
            timer_id,
            invalidated = confirmed.invalidated,
            "attention check answered"
        );
        Ok(ConfirmView {
            invalidated: confirmed.invalidated,
        })
    }

    /// Level, multiplier and balance, creating the rows on first use.
    pub async fn profile(&self, user_id: &str) -> Result<ProfileView, ServiceError> {
        let mut tx = self.db.pool().begin().await?;
        let level = db::levels::get_or_create(&mut tx, user_id).await?;
        let coins = db::wallets::balance(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(ProfileView {
            user_id: user_id.to_string(),
            level,
            multiplier: level_to_multiplier(level),
            coins,
        })
    }

    async fn pay_out(
        &self,
        conn: &mut PgConnection,
        user_id: &str,
        finished: &Session,
    ) -> Result<Payout, ServiceError> {
        let level = db::levels::get_or_create(&mut *conn, user_id).await?;
        let award = settle(finished, level, self.policy);
        let wallet_total = db::wallets::credit(&mut *conn, user_id, award.earned_coins).await?;
        Ok(Payout {
            award,
            wallet_total,
            invalidated: finished.invalidated,
        })
    }
}

/// Award for a finished session under `policy`.
pub fn settle(finished: &Session, level: i32, policy: RewardPolicy) -> Award {
    let award = reward::award(finished.elapsed_seconds, level);
    if finished.invalidated && !policy.pay_invalidated_sessions {
        award.forfeited()
    } else {
        award
    }
}

/// Id of the row a successful transition applied to. Only reachable after
/// the state machine accepted the transition, which implies a current row.
fn active_id(current: &Option<db::CurrentTimer>) -> Result<i64, ServiceError> {
    current
        .as_ref()
        .map(|c| c.id)
        .ok_or_else(|| anyhow::anyhow!("transition applied without a current timer row").into())
}
