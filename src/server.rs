//! Stdio event loop.
//!
//! Provides [`serve_stdio`], which wires the streak store, the serialized
//! service, the daily rollup and the JSON-lines presence feed into a running
//! process. Notifications go to stdout, logs to stderr.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::HooterConfig;
use crate::presence::{self, Inbound};
use crate::streak::notify::{JsonLinesSink, NotificationSink};
use crate::streak::rollup::{self, RollupSettings};
use crate::streak::session::SessionPolicy;
use crate::streak::store::StreakStore;
use crate::streak::{StreakHandle, StreakService};

/// Shared setup: open the store and start the service task.
pub fn start_service(
    config: &HooterConfig,
    sink: Arc<dyn NotificationSink>,
) -> Result<(StreakHandle, JoinHandle<()>)> {
    let path = config.resolved_streaks_path();
    tracing::info!(path = %path.display(), "streaks file configured");

    let policy = SessionPolicy {
        minimum_minutes: config.streaks.minimum_minutes,
        timezone: config.streaks.tz()?,
    };
    Ok(StreakService::spawn(
        StreakStore::new(path),
        policy,
        sink,
        config.io_timeout(),
    ))
}

/// Run `future` to completion on a fresh multi-threaded runtime.
///
/// A store call that timed out may still be parked on the blocking pool;
/// shutdown waits at most `grace` for it instead of hanging the process.
pub fn block_on<F: Future>(grace: Duration, future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

/// Run until stdin closes or Ctrl-C.
pub async fn serve_stdio(config: HooterConfig, roster: Option<&Path>) -> Result<()> {
    tracing::info!("starting Hooter streak tracker on stdio");

    let sink: Arc<dyn NotificationSink> = Arc::new(JsonLinesSink::new(std::io::stdout()));
    let stdin = BufReader::new(tokio::io::stdin());
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received ctrl-c");
    };
    serve(&config, roster, sink, stdin, ctrl_c).await
}

/// Start the service, run the feed from `reader` until it ends or `stop`
/// resolves, then stop the service. The service is always shut down and
/// flushed, including when startup fails after it was spawned.
pub async fn serve<R, S>(
    config: &HooterConfig,
    roster: Option<&Path>,
    sink: Arc<dyn NotificationSink>,
    reader: R,
    stop: S,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let (handle, service) = start_service(config, Arc::clone(&sink))?;

    let result = run_feed(config, roster, &handle, sink, reader, stop).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "stopping after startup failure");
    }

    tracing::info!("shutting down");
    handle.shutdown().await;
    service.await?;
    tracing::info!("streak tracker shut down");
    result
}

async fn run_feed<R, S>(
    config: &HooterConfig,
    roster: Option<&Path>,
    handle: &StreakHandle,
    sink: Arc<dyn NotificationSink>,
    reader: R,
    stop: S,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    if let Some(path) = roster {
        let members = presence::read_roster(path)?;
        let added = handle.reconcile(members).await?;
        tracing::info!(added, roster = %path.display(), "roster reconciled");
    }

    let settings = RollupSettings::from_config(&config.streaks)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let rollup_task = tokio::spawn(rollup::run_daily(handle.clone(), sink, settings, shutdown_rx));

    run_lines(reader, handle, config.streaks.study_channel_id, stop).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = rollup_task.await {
        tracing::error!(error = %e, "rollup task panicked");
    }
    Ok(())
}

/// Feed every inbound line to the service until the reader ends or `stop`
/// resolves. Malformed lines are logged and skipped.
pub async fn run_lines<R, S>(reader: R, handle: &StreakHandle, study_channel_id: u64, stop: S)
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = reader.lines();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => dispatch(handle, &line, study_channel_id).await,
                Ok(None) => {
                    tracing::info!("presence feed closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to read presence feed");
                    break;
                }
            },
            _ = &mut stop => break,
        }
    }
}

async fn dispatch(handle: &StreakHandle, line: &str, study_channel_id: u64) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let message: Inbound = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed presence line");
            return;
        }
    };

    match message {
        Inbound::VoiceState(update) => {
            let Some(event) = update.classify(study_channel_id, Utc::now()) else {
                tracing::debug!(user_id = %update.user_id, "voice state change outside the study channel");
                return;
            };
            match handle.handle_event(event).await {
                Ok(outcome) => tracing::debug!(user_id = %update.user_id, ?outcome, "event applied"),
                Err(e) => tracing::error!(
                    user_id = %update.user_id,
                    error = %e,
                    "presence event not confirmed"
                ),
            }
        }
        Inbound::Roster { members } => match handle.reconcile(members).await {
            Ok(added) => tracing::info!(added, "roster reconciled"),
            Err(e) => tracing::error!(error = %e, "roster reconciliation failed"),
        },
    }
}
