//! Streak record definitions.
//!
//! [`StreakRecord`] is the per-user persisted state and [`Population`] is the
//! whole keyed collection, in first-seen order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque platform user identifier, kept as a string on disk.
pub type UserId = String;

/// Every known user's record, keyed by user id. Iteration order is insertion
/// order, which is also the on-disk order and the rollup order.
pub type Population = IndexMap<UserId, StreakRecord>;

/// Per-user streak state, matching the persisted JSON layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    /// Last-known display label.
    pub username: String,
    /// Consecutive credited days ending at `last_join_date`.
    pub current_streak: u32,
    /// High-water mark of `current_streak`.
    pub longest_streak: u32,
    /// Reference-zone date the streak was last credited. `None` if never.
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_join_date: Option<NaiveDate>,
    /// Set while the user sits in the study channel.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub join_time: Option<DateTime<Utc>>,
}

impl StreakRecord {
    /// Zero-state record for a user seen for the first time.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            current_streak: 0,
            longest_streak: 0,
            last_join_date: None,
            join_time: None,
        }
    }

    /// `true` while a session is open (joined, not yet left).
    pub fn is_open(&self) -> bool {
        self.join_time.is_some()
    }
}

/// Accepts `YYYY-MM-DD` as well as a full ISO datetime, keeping only the date.
/// Older files stored `datetime.isoformat()` here.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => parse_date_prefix(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}"))),
    }
}

fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Accepts RFC 3339 as well as an ISO datetime without an offset, which older
/// files wrote for open sessions. Offset-less values are taken as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
