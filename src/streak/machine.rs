//! Pure streak transitions.
//!
//! [`credit`] maps a record and the reference-zone date of a qualifying
//! session to the updated record:
//!
//! | last credited | days since | transition |
//! |---------------|------------|------------|
//! | never         | -          | [`Transition::Start`] |
//! | set           | 0          | [`Transition::SameDay`] (unchanged) |
//! | set           | 1          | [`Transition::Increment`] |
//! | set           | > 1        | [`Transition::Reset`] |
//! | set           | < 0        | [`CreditError::DateRegression`] |

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use super::error::CreditError;
use super::types::StreakRecord;

/// Which branch of the decision table was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Start,
    SameDay,
    Increment,
    Reset,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SameDay => "same_day",
            Self::Increment => "increment",
            Self::Reset => "reset",
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credit one qualifying session on `event_date`.
///
/// Returns the new record and the transition taken. The input is never
/// modified; on error the caller keeps the old record as-is.
pub fn credit(
    record: &StreakRecord,
    event_date: NaiveDate,
) -> Result<(StreakRecord, Transition), CreditError> {
    let mut next = record.clone();

    let transition = match record.last_join_date {
        None => {
            next.current_streak = 1;
            next.longest_streak = next.longest_streak.max(1);
            Transition::Start
        }
        Some(last) => match (event_date - last).num_days() {
            0 => return Ok((next, Transition::SameDay)),
            1 => {
                next.current_streak = next.current_streak.saturating_add(1);
                next.longest_streak = next.longest_streak.max(next.current_streak);
                Transition::Increment
            }
            d if d > 1 => {
                next.current_streak = 1;
                next.longest_streak = next.longest_streak.max(1);
                Transition::Reset
            }
            _ => {
                return Err(CreditError::DateRegression {
                    last,
                    event: event_date,
                })
            }
        },
    };

    next.last_join_date = Some(event_date);
    Ok((next, transition))
}

/// Calendar date of `instant` in the reference zone `tz`.
pub fn today_in<Tz: TimeZone>(tz: &Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}
