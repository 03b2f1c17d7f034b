//! Daily rollup: population summary on a wall-clock schedule, plus the
//! startup reconciliation that makes sure every known member has a record.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::notify::NotificationSink;
use super::service::StreakHandle;
use super::types::{Population, StreakRecord, UserId};
use crate::config::StreaksConfig;
use crate::presence::Member;

pub const SUMMARY_HEADER: &str = "**Daily Streak Update:**";

/// When and where the rollup runs.
#[derive(Debug, Clone)]
pub struct RollupSettings {
    pub channel_id: u64,
    pub at: NaiveTime,
    pub timezone: Tz,
    pub stale_after: Duration,
}

impl RollupSettings {
    pub fn from_config(config: &StreaksConfig) -> Result<Self> {
        Ok(Self {
            channel_id: config.summary_channel_id,
            at: config.rollup_at()?,
            timezone: config.tz()?,
            stale_after: config.stale_after(),
        })
    }
}

/// What a single rollup run produced.
#[derive(Debug, Clone)]
pub struct RollupReport {
    pub text: String,
    pub users: usize,
    pub stale: Vec<UserId>,
}

/// One `username: N days` line per user, in stored order.
pub fn format_summary(population: &Population) -> String {
    let mut text = String::from(SUMMARY_HEADER);
    text.push('\n');
    for record in population.values() {
        text.push_str(&format!("{}: {} days\n", record.username, record.current_streak));
    }
    text
}

/// Users whose session has been open for longer than `max_age`.
///
/// These are never closed automatically; they usually mean a leave event was
/// lost while the process was down.
pub fn stale_sessions(
    population: &Population,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Vec<(UserId, StreakRecord)> {
    population
        .iter()
        .filter(|(_, r)| r.join_time.is_some_and(|joined| now - joined > max_age))
        .map(|(id, r)| (id.clone(), r.clone()))
        .collect()
}

/// Insert a zero-state record for every non-bot member missing from the
/// population. Returns how many were added.
pub fn reconcile(population: &mut Population, members: &[Member]) -> usize {
    let mut added = 0;
    for member in members.iter().filter(|m| !m.is_bot) {
        if !population.contains_key(&member.user_id) {
            population.insert(member.user_id.clone(), StreakRecord::new(member.username.clone()));
            info!(
                user_id = %member.user_id,
                username = %member.username,
                "added to streaks data with initial streak of 0"
            );
            added += 1;
        }
    }
    added
}

/// The first instant strictly after `now` whose wall-clock time in `tz` is `at`.
///
/// A time that falls in a DST gap runs at the first valid instant after it;
/// an ambiguous time runs at its earlier occurrence.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime, tz: &Tz) -> DateTime<Utc> {
    let local_today = now.with_timezone(tz).date_naive();
    for offset in 0..=2 {
        let day = local_today + Duration::days(offset);
        if let Some(candidate) = resolve_local(tz, day.and_time(at)) {
            if candidate > now {
                return candidate;
            }
        }
    }
    now + Duration::days(1)
}

fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            // Inside a DST gap: walk forward to the first existing minute.
            (1..=180).find_map(|m| {
                tz.from_local_datetime(&(naive + Duration::minutes(m)))
                    .earliest()
                    .map(|t| t.with_timezone(&Utc))
            })
        }
    }
}

/// Produce and deliver one summary.
pub async fn run_once(
    handle: &StreakHandle,
    sink: &dyn NotificationSink,
    settings: &RollupSettings,
) -> Result<RollupReport> {
    let population = handle.snapshot().await?;
    let text = format_summary(&population);
    sink.summary(settings.channel_id, &text)?;

    let stale: Vec<UserId> = stale_sessions(&population, Utc::now(), settings.stale_after)
        .into_iter()
        .map(|(user_id, record)| {
            warn!(
                user_id = %user_id,
                username = %record.username,
                joined = ?record.join_time,
                "session open far longer than expected, a leave event was probably missed"
            );
            user_id
        })
        .collect();

    info!(users = population.len(), stale = stale.len(), "daily streak update sent");
    Ok(RollupReport {
        text,
        users: population.len(),
        stale,
    })
}

/// Run the rollup every day at the configured time until `shutdown` flips.
pub async fn run_daily(
    handle: StreakHandle,
    sink: Arc<dyn NotificationSink>,
    settings: RollupSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(at = %settings.at, timezone = %settings.timezone, "daily streak update task is ready");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let now = Utc::now();
        let next = next_run_after(now, settings.at, &settings.timezone);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next.with_timezone(&settings.timezone), "next daily streak update scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => break,
        }

        if let Err(e) = run_once(&handle, sink.as_ref(), &settings).await {
            error!(error = %e, "daily streak update failed");
        }
    }
    info!("daily streak update task stopped");
}
