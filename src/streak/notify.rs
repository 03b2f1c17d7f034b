//! Outbound notifications.
//!
//! The core decides *what* happened ([`Outcome`] plus the streak numbers); a
//! [`NotificationSink`] decides how a human gets to see it.

use std::io::Write;
use std::sync::Mutex;

use anyhow::Result;
use serde::Serialize;

use super::session::SessionOutcome;
use super::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Increased,
    Maintained,
    TooShort,
    Anomaly,
}

/// A streak change worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub user_id: UserId,
    pub username: String,
    pub outcome: Outcome,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub minimum_minutes: u32,
    /// Anomaly reason, or the transition for `maintained`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Set when the change could not be confirmed on disk.
    pub unconfirmed: bool,
}

impl Notification {
    /// Build the notification for a session outcome, if it warrants one.
    pub fn from_outcome(
        user_id: &str,
        username: &str,
        outcome: &SessionOutcome,
        minimum_minutes: u32,
    ) -> Option<Self> {
        let (kind, current, longest, detail) = match outcome {
            SessionOutcome::Increased { current, longest } => {
                (Outcome::Increased, *current, *longest, None)
            }
            SessionOutcome::Maintained {
                current,
                longest,
                transition,
            } => (
                Outcome::Maintained,
                *current,
                *longest,
                Some(transition.to_string()),
            ),
            SessionOutcome::TooShort {
                current, longest, ..
            } => (Outcome::TooShort, *current, *longest, None),
            SessionOutcome::Anomaly {
                current,
                longest,
                reason,
            } => (Outcome::Anomaly, *current, *longest, Some(reason.clone())),
            SessionOutcome::Opened | SessionOutcome::AlreadyOpen | SessionOutcome::NoOpenSession => {
                return None
            }
        };

        Some(Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            outcome: kind,
            current_streak: current,
            longest_streak: longest,
            minimum_minutes,
            detail,
            unconfirmed: false,
        })
    }
}

/// Receives everything the core wants a human to see.
pub trait NotificationSink: Send + Sync {
    /// A per-user streak change.
    fn notify(&self, notification: &Notification) -> Result<()>;

    /// The daily population summary, addressed to a channel.
    fn summary(&self, channel_id: u64, text: &str) -> Result<()>;
}

/// Wire form of everything a [`JsonLinesSink`] writes.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outbound<'a> {
    Notification(&'a Notification),
    Summary { channel_id: u64, text: &'a str },
}

/// Writes one JSON object per line, e.g. to stdout for a gateway process.
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn emit(&self, message: &Outbound<'_>) -> Result<()> {
        let line = serde_json::to_string(message)?;
        let mut out = self
            .out
            .lock()
            .map_err(|e| anyhow::anyhow!("sink lock poisoned: {e}"))?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.out
            .into_inner()
            .map_err(|e| anyhow::anyhow!("sink lock poisoned: {e}"))
    }
}

impl<W: Write + Send> NotificationSink for JsonLinesSink<W> {
    fn notify(&self, notification: &Notification) -> Result<()> {
        self.emit(&Outbound::Notification(notification))
    }

    fn summary(&self, channel_id: u64, text: &str) -> Result<()> {
        self.emit(&Outbound::Summary { channel_id, text })
    }
}
