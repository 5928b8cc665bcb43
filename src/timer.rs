//! # Timer — Focus Session State Machine
//!
//! Pure transitions over one user's current timer. Nothing here touches the
//! store or the wall clock: every operation takes the current [`Session`]
//! (if any) plus `now`, and returns either the next session state or a
//! [`TimerError`]. The caller persists the result atomically.
//!
//! ## States
//!
//! ```text
//!            start               pause
//! stopped ──────────▶ running ◀────────▶ paused
//!    ▲                  │     start(resume)  │
//!    └──── stop / autostop ◀─────────────────┘
//! ```
//!
//! ## Countdown mode
//!
//! `start(duration_minutes)` fixes `target_seconds` for the whole session.
//! While running, `end_time` is the absolute deadline; while paused,
//! `remaining_seconds` is frozen and only turned back into a deadline on
//! resume. There is no scheduler: [`query`] notices an expired deadline and
//! returns [`QueryOutcome::Expired`], which the caller finalizes exactly once.
//!
//! ## Attention checks
//!
//! A running session can carry one outstanding check window. Confirming
//! inside the window clears it. A late confirmation marks the session
//! `invalidated`, and so does pausing or finishing after an unconfirmed
//! window closed. The flag is sticky for the whole session: resuming clears
//! the window but never the flag. Only a newly created session starts valid.

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TimerError;

/// Shortest countdown a session may request, in minutes.
pub const MIN_DURATION_MINUTES: i64 = 1;
/// Longest countdown a session may request, in minutes.
pub const MAX_DURATION_MINUTES: i64 = 120;
/// Lower bound applied to a client-supplied stop cap.
pub const CAP_FLOOR_SECONDS: i64 = 60;
/// Upper bound applied to a client-supplied stop cap (2 hours).
pub const CAP_CEILING_SECONDS: i64 = 7200;
/// Attention check window used when the client does not pick one.
pub const DEFAULT_CHECK_WINDOW_SECONDS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Running,
    Paused,
    Stopped,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Stopped => "stopped",
        }
    }

    /// Running or paused.
    pub fn is_active(&self) -> bool {
        !matches!(self, TimerStatus::Stopped)
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TimerStatus::Running),
            "paused" => Ok(TimerStatus::Paused),
            "stopped" => Ok(TimerStatus::Stopped),
            other => Err(anyhow!("unknown timer status '{}'", other)),
        }
    }
}

/// The mutable state of one timer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub status: TimerStatus,
    /// Start of the open running interval. Set iff running.
    pub start_time: Option<DateTime<Utc>>,
    /// Seconds from all closed running intervals.
    pub elapsed_seconds: i64,
    /// Countdown length; fixed for the lifetime of the session.
    pub target_seconds: Option<i64>,
    /// Countdown deadline. Set iff running in countdown mode.
    pub end_time: Option<DateTime<Utc>>,
    /// Frozen time left. Set iff paused in countdown mode.
    pub remaining_seconds: Option<i64>,
    pub pending_check_started_at: Option<DateTime<Utc>>,
    pub pending_check_deadline: Option<DateTime<Utc>>,
    pub invalidated: bool,
}

impl Session {
    fn started(now: DateTime<Utc>, target_seconds: Option<i64>) -> Self {
        Session {
            status: TimerStatus::Running,
            start_time: Some(now),
            elapsed_seconds: 0,
            target_seconds,
            end_time: target_seconds.map(|t| now + Duration::seconds(t)),
            remaining_seconds: None,
            pending_check_started_at: None,
            pending_check_deadline: None,
            invalidated: false,
        }
    }

    pub fn is_countdown(&self) -> bool {
        self.target_seconds.is_some()
    }

    /// Closed intervals plus the open one, if running.
    pub fn live_elapsed(&self, now: DateTime<Utc>) -> i64 {
        self.elapsed_seconds + self.open_interval(now)
    }

    fn open_interval(&self, now: DateTime<Utc>) -> i64 {
        match (self.status, self.start_time) {
            (TimerStatus::Running, Some(start)) => seconds_between(start, now),
            _ => 0,
        }
    }

    /// Time left on the countdown, never negative.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        let target = self.target_seconds?;
        match self.status {
            TimerStatus::Running => Some(match self.end_time {
                Some(end) => seconds_between(now, end),
                None => (target - self.live_elapsed(now)).max(0),
            }),
            TimerStatus::Paused => Some(
                self.remaining_seconds
                    .unwrap_or_else(|| (target - self.elapsed_seconds).max(0)),
            ),
            TimerStatus::Stopped => None,
        }
    }

    /// Whether a running countdown has reached its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.status != TimerStatus::Running || !self.is_countdown() {
            return false;
        }
        match self.end_time {
            Some(end) => now >= end,
            None => self.remaining_at(now) == Some(0),
        }
    }

    fn fold_open_interval(&mut self, now: DateTime<Utc>) {
        self.elapsed_seconds += self.open_interval(now);
        self.start_time = None;
    }

    /// An unconfirmed window that closed before `at` invalidates the session.
    fn expire_check(&mut self, at: DateTime<Utc>) {
        if matches!(self.pending_check_deadline, Some(deadline) if at > deadline) {
            self.invalidated = true;
        }
    }

    fn clear_check(&mut self) {
        self.pending_check_started_at = None;
        self.pending_check_deadline = None;
    }

    /// Close the session for good. Countdown sessions end at their deadline
    /// even when the stop is observed later.
    fn finish(&mut self, now: DateTime<Utc>) {
        let ended_at = match (self.status, self.end_time) {
            (TimerStatus::Running, Some(end)) => end.min(now),
            _ => now,
        };
        self.fold_open_interval(ended_at);
        if let Some(target) = self.target_seconds {
            self.elapsed_seconds = self.elapsed_seconds.min(target);
        }
        self.expire_check(ended_at);
        self.clear_check();
        self.status = TimerStatus::Stopped;
        self.end_time = None;
        self.remaining_seconds = None;
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().max(0)
}

fn require_running(current: Option<&Session>) -> Result<&Session, TimerError> {
    match current {
        Some(s) if s.status == TimerStatus::Running => Ok(s),
        _ => Err(TimerError::conflict("No running timer")),
    }
}

/// Turn an optional countdown length in minutes into target seconds.
pub fn validate_duration(duration_minutes: Option<i64>) -> Result<Option<i64>, TimerError> {
    match duration_minutes {
        None => Ok(None),
        Some(m) if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&m) => Ok(Some(m * 60)),
        Some(m) => Err(TimerError::validation(format!(
            "duration_minutes must be between {} and {} (got {})",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES, m
        ))),
    }
}

/// Clamp a client-supplied stop cap into `[60, 7200]` seconds.
pub fn clamp_cap(cap_seconds: i64) -> i64 {
    cap_seconds.clamp(CAP_FLOOR_SECONDS, CAP_CEILING_SECONDS)
}

/// Result of [`start`]: the caller updates the existing row on resume and
/// inserts a new row otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Resumed(Session),
    Created(Session),
}

impl StartOutcome {
    pub fn session(&self) -> &Session {
        match self {
            StartOutcome::Resumed(s) | StartOutcome::Created(s) => s,
        }
    }
}

/// Start a new session, or resume the paused one.
pub fn start(
    current: Option<&Session>,
    duration_minutes: Option<i64>,
    now: DateTime<Utc>,
) -> Result<StartOutcome, TimerError> {
    if matches!(current, Some(s) if s.status == TimerStatus::Running) {
        return Err(TimerError::conflict("Timer is already running"));
    }
    let target_seconds = validate_duration(duration_minutes)?;

    match current {
        Some(paused) if paused.status == TimerStatus::Paused => {
            let mut s = paused.clone();
            let remaining = s.remaining_at(now);
            s.status = TimerStatus::Running;
            s.start_time = Some(now);
            s.end_time = remaining.map(|r| now + Duration::seconds(r));
            s.remaining_seconds = None;
            s.clear_check();
            Ok(StartOutcome::Resumed(s))
        }
        _ => Ok(StartOutcome::Created(Session::started(now, target_seconds))),
    }
}

/// Pause the running session, folding the open interval into `elapsed_seconds`.
pub fn pause(current: Option<&Session>, now: DateTime<Utc>) -> Result<Session, TimerError> {
    let mut s = require_running(current)?.clone();
    let remaining = s.remaining_at(now);
    s.fold_open_interval(now);
    s.expire_check(now);
    s.remaining_seconds = remaining;
    s.end_time = None;
    s.status = TimerStatus::Paused;
    Ok(s)
}

/// Stop the running or paused session. The returned session carries the
/// final `elapsed_seconds` to be rewarded.
pub fn stop(
    current: Option<&Session>,
    cap_seconds: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Session, TimerError> {
    let mut s = match current {
        Some(s) if s.status.is_active() => s.clone(),
        _ => return Err(TimerError::conflict("No active timer")),
    };
    s.finish(now);
    if let Some(cap) = cap_seconds {
        s.elapsed_seconds = s.elapsed_seconds.min(clamp_cap(cap));
    }
    Ok(s)
}

/// What a state read observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// No active session. `last_session_seconds` is the final total of the
    /// most recent one, if any.
    Idle { last_session_seconds: Option<i64> },
    Running {
        elapsed_seconds: i64,
        start_time: DateTime<Utc>,
        remaining_seconds: Option<i64>,
        check_deadline: Option<DateTime<Utc>>,
    },
    Paused {
        elapsed_seconds: i64,
        remaining_seconds: Option<i64>,
    },
    /// The countdown ran out before this read. Carries the finished session;
    /// the caller must persist it and pay out.
    Expired(Session),
}

/// Read the current state, detecting an expired countdown.
pub fn query(current: Option<&Session>, now: DateTime<Utc>) -> QueryOutcome {
    let Some(s) = current else {
        return QueryOutcome::Idle {
            last_session_seconds: None,
        };
    };
    match s.status {
        TimerStatus::Stopped => QueryOutcome::Idle {
            last_session_seconds: Some(s.elapsed_seconds),
        },
        TimerStatus::Paused => QueryOutcome::Paused {
            elapsed_seconds: s.elapsed_seconds,
            remaining_seconds: s.remaining_at(now),
        },
        TimerStatus::Running if s.is_expired(now) => {
            let mut finished = s.clone();
            finished.finish(now);
            QueryOutcome::Expired(finished)
        }
        TimerStatus::Running => QueryOutcome::Running {
            elapsed_seconds: s.live_elapsed(now),
            start_time: s.start_time.unwrap_or(now),
            remaining_seconds: s.remaining_at(now),
            check_deadline: s.pending_check_deadline,
        },
    }
}

/// Open an attention check window, replacing any outstanding one.
pub fn start_attention_check(
    current: Option<&Session>,
    window_seconds: i64,
    now: DateTime<Utc>,
) -> Result<Session, TimerError> {
    let mut s = require_running(current)?.clone();
    if window_seconds < 1 {
        return Err(TimerError::validation(format!(
            "window_seconds must be at least 1 (got {})",
            window_seconds
        )));
    }
    let deadline = Duration::try_seconds(window_seconds)
        .and_then(|window| now.checked_add_signed(window))
        .ok_or_else(|| {
            TimerError::validation(format!("window_seconds is too large (got {})", window_seconds))
        })?;
    s.pending_check_started_at = Some(now);
    s.pending_check_deadline = Some(deadline);
    Ok(s)
}

/// Answer the outstanding attention check.
pub fn confirm_attention_check(
    current: Option<&Session>,
    now: DateTime<Utc>,
) -> Result<Session, TimerError> {
    let mut s = require_running(current)?.clone();
    match s.pending_check_deadline {
        None => {}
        Some(deadline) if now <= deadline => s.clear_check(),
        Some(_) => {
            s.invalidated = true;
            s.clear_check();
        }
    }
    Ok(s)
}
