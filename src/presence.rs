//! Boundary types for the chat platform's presence feed.
//!
//! The gateway process speaks newline-delimited JSON. Each inbound line is an
//! [`Inbound`] message; voice-state updates are turned into
//! [`SessionEvent`]s here so nothing past this module sees platform shapes.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::streak::session::SessionEvent;
use crate::streak::types::UserId;

/// A member's voice channel before and after a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    #[serde(deserialize_with = "snowflake")]
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub before_channel: Option<u64>,
    #[serde(default)]
    pub after_channel: Option<u64>,
    #[serde(default)]
    pub is_bot: bool,
}

/// A known community member, used for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(deserialize_with = "snowflake")]
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub is_bot: bool,
}

impl Member {
    pub fn new(user_id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_bot: false,
        }
    }
}

/// One line of the inbound feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    VoiceState(PresenceUpdate),
    /// The full member list, sent once the gateway is ready.
    Roster { members: Vec<Member> },
}

impl PresenceUpdate {
    /// Map the update onto the study channel, if it crosses its boundary.
    ///
    /// Bots never count. Moving within the study channel (mute, deafen,
    /// stream toggles) is neither an enter nor a leave.
    pub fn classify(&self, study_channel_id: u64, at: DateTime<Utc>) -> Option<SessionEvent> {
        if self.is_bot {
            return None;
        }
        let was_in = self.before_channel == Some(study_channel_id);
        let is_in = self.after_channel == Some(study_channel_id);
        match (was_in, is_in) {
            (false, true) => Some(SessionEvent::enter(&self.user_id, &self.username, at)),
            (true, false) => Some(SessionEvent::leave(&self.user_id, &self.username, at)),
            _ => None,
        }
    }
}

/// Read a JSON array of [`Member`]s.
pub fn read_roster(path: impl AsRef<Path>) -> Result<Vec<Member>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse roster {}", path.display()))
}

/// Platform ids arrive as JSON numbers or strings; store them as strings.
fn snowflake<'de, D>(deserializer: D) -> Result<UserId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Num(n) => n.to_string(),
        Raw::Str(s) => s,
    })
}
