//! Session tracking: join/leave events to streak credit.
//!
//! A user is `IDLE` when `join_time` is empty and `OPEN` while it is set.
//! Entering opens a session; leaving closes it, measures its length and, if it
//! reached the minimum, runs the state machine on the reference-zone date of
//! the leave. Leaving always clears `join_time`, whatever the outcome.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use super::machine::{self, Transition};
use super::types::{Population, StreakRecord, UserId};

/// Which way the user crossed the study-channel boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    Enter,
    Leave,
}

/// A platform-independent presence transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub user_id: UserId,
    pub username: String,
    pub kind: SessionEventKind,
    pub at: DateTime<Utc>,
}

impl SessionEvent {
    pub fn enter(user_id: impl Into<UserId>, username: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            kind: SessionEventKind::Enter,
            at,
        }
    }

    pub fn leave(user_id: impl Into<UserId>, username: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            kind: SessionEventKind::Leave,
            at,
        }
    }
}

/// Rules a session is judged by.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub minimum_minutes: u32,
    pub timezone: Tz,
}

impl SessionPolicy {
    fn minimum(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.minimum_minutes))
    }
}

/// What an event did to a user's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Session opened at the event time.
    Opened,
    /// Enter while already open; the original join time was kept.
    AlreadyOpen,
    /// Qualifying session that raised `current_streak`.
    Increased { current: u32, longest: u32 },
    /// Qualifying session that left `current_streak` where it was or reset it.
    Maintained {
        current: u32,
        longest: u32,
        transition: Transition,
    },
    /// Session shorter than the minimum; streak untouched.
    TooShort {
        current: u32,
        longest: u32,
        minutes: i64,
    },
    /// The state machine refused the credit (date went backwards).
    Anomaly {
        current: u32,
        longest: u32,
        reason: String,
    },
    /// Leave without an open session (duplicate event, restart mid-session).
    NoOpenSession,
}

/// Apply one event to the population in place.
///
/// Unknown users get a zero-state record first. A known user's `username` is
/// refreshed to the label carried by the event.
pub fn apply_event(
    population: &mut Population,
    event: &SessionEvent,
    policy: &SessionPolicy,
) -> SessionOutcome {
    let record = population
        .entry(event.user_id.clone())
        .or_insert_with(|| {
            info!(user_id = %event.user_id, username = %event.username, "first sighting, creating streak record");
            StreakRecord::new(event.username.clone())
        });
    if record.username != event.username && !event.username.is_empty() {
        record.username = event.username.clone();
    }

    match event.kind {
        SessionEventKind::Enter => handle_enter(record, event),
        SessionEventKind::Leave => handle_leave(record, event, policy),
    }
}

fn handle_enter(record: &mut StreakRecord, event: &SessionEvent) -> SessionOutcome {
    if let Some(since) = record.join_time {
        warn!(
            user_id = %event.user_id,
            username = %record.username,
            since = %since,
            "enter while a session is already open, keeping original join time"
        );
        return SessionOutcome::AlreadyOpen;
    }
    record.join_time = Some(event.at);
    info!(user_id = %event.user_id, username = %record.username, "joined the study channel");
    SessionOutcome::Opened
}

fn handle_leave(
    record: &mut StreakRecord,
    event: &SessionEvent,
    policy: &SessionPolicy,
) -> SessionOutcome {
    let Some(joined) = record.join_time.take() else {
        info!(
            user_id = %event.user_id,
            username = %record.username,
            "left the study channel but had no active join time"
        );
        return SessionOutcome::NoOpenSession;
    };

    // Clock skew can put the leave before the join; count that as zero.
    let duration = (event.at - joined).max(chrono::Duration::zero());
    if duration < policy.minimum() {
        info!(
            user_id = %event.user_id,
            username = %record.username,
            minutes = duration.num_minutes(),
            minimum = policy.minimum_minutes,
            "left the study channel before the minimum duration"
        );
        return SessionOutcome::TooShort {
            current: record.current_streak,
            longest: record.longest_streak,
            minutes: duration.num_minutes(),
        };
    }

    let event_date = machine::today_in(&policy.timezone, event.at);
    let previous = record.current_streak;
    match machine::credit(record, event_date) {
        Ok((next, transition)) => {
            *record = next;
            info!(
                user_id = %event.user_id,
                username = %record.username,
                transition = %transition,
                streak = record.current_streak,
                longest = record.longest_streak,
                "streak credited"
            );
            if record.current_streak > previous {
                SessionOutcome::Increased {
                    current: record.current_streak,
                    longest: record.longest_streak,
                }
            } else {
                SessionOutcome::Maintained {
                    current: record.current_streak,
                    longest: record.longest_streak,
                    transition,
                }
            }
        }
        Err(e) => {
            warn!(
                user_id = %event.user_id,
                username = %record.username,
                error = %e,
                "streak anomaly, record left unchanged"
            );
            SessionOutcome::Anomaly {
                current: record.current_streak,
                longest: record.longest_streak,
                reason: e.to_string(),
            }
        }
    }
}
