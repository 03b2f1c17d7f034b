#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hooter::streak::notify::{Notification, NotificationSink};
use hooter::streak::session::SessionPolicy;
use hooter::streak::store::StreakStore;
use hooter::streak::{StreakHandle, StreakRecord, StreakService};
use tokio::task::JoinHandle;

/// Sink that remembers everything it was given.
#[derive(Default)]
pub struct RecordingSink {
    pub notifications: Mutex<Vec<Notification>>,
    pub summaries: Mutex<Vec<(u64, String)>>,
}

impl RecordingSink {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn summaries(&self) -> Vec<(u64, String)> {
        self.summaries.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn summary(&self, channel_id: u64, text: &str) -> anyhow::Result<()> {
        self.summaries.lock().unwrap().push((channel_id, text.to_string()));
        Ok(())
    }
}

/// Pacific-time policy with the community's 25-minute minimum.
pub fn policy() -> SessionPolicy {
    SessionPolicy {
        minimum_minutes: 25,
        timezone: chrono_tz::US::Pacific,
    }
}

/// Start a service over a store at `path`.
pub fn spawn_service(path: &Path) -> (StreakHandle, JoinHandle<()>, Arc<RecordingSink>) {
    spawn_service_with_timeout(path, Duration::from_secs(5))
}

/// Start a service whose store calls give up after `io_timeout`.
pub fn spawn_service_with_timeout(
    path: &Path,
    io_timeout: Duration,
) -> (StreakHandle, JoinHandle<()>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let (handle, task) =
        StreakService::spawn(StreakStore::new(path), policy(), sink.clone(), io_timeout);
    (handle, task, sink)
}

/// Create a named pipe. Opening it blocks until the other end is opened.
#[cfg(unix)]
pub fn mkfifo(path: &Path) {
    let status = std::process::Command::new("mkfifo").arg(path).status().unwrap();
    assert!(status.success(), "mkfifo failed for {}", path.display());
}

/// Instant for a Pacific wall-clock time (PDT in the dates tests use).
pub fn pacific(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    chrono_tz::US::Pacific
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A record with the given counters and last credited date.
pub fn record(username: &str, current: u32, longest: u32, last: Option<NaiveDate>) -> StreakRecord {
    StreakRecord {
        username: username.to_string(),
        current_streak: current,
        longest_streak: longest,
        last_join_date: last,
        join_time: None,
    }
}
