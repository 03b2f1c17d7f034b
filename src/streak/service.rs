//! Serialized access to the streak population.
//!
//! Every load-mutate-save cycle runs on one task that drains an `mpsc`
//! queue, so two cycles can never interleave and no update is lost to a
//! concurrent writer. Callers talk to it through a cloneable [`StreakHandle`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::{ServiceError, StoreError};
use super::notify::{Notification, NotificationSink};
use super::rollup;
use super::session::{self, SessionEvent, SessionOutcome, SessionPolicy};
use super::store::StreakStore;
use super::types::{Population, StreakRecord, UserId};
use crate::presence::Member;

const QUEUE_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

enum Command {
    Event {
        event: SessionEvent,
        reply: Reply<SessionOutcome>,
    },
    Get {
        user_id: UserId,
        reply: Reply<Option<StreakRecord>>,
    },
    Reconcile {
        members: Vec<Member>,
        reply: Reply<usize>,
    },
    Snapshot {
        reply: Reply<Population>,
    },
    Shutdown,
}

/// Cloneable front door to the streak service task.
#[derive(Clone)]
pub struct StreakHandle {
    tx: mpsc::Sender<Command>,
}

impl StreakHandle {
    /// Apply a join/leave event and persist the result.
    ///
    /// An `Err` means the change was not confirmed on disk; any notification
    /// for it has already gone out marked `unconfirmed`.
    pub async fn handle_event(&self, event: SessionEvent) -> Result<SessionOutcome, ServiceError> {
        self.call(|reply| Command::Event { event, reply }).await
    }

    /// Read-only lookup for "show my streak".
    pub async fn get_record(&self, user_id: impl Into<UserId>) -> Result<Option<StreakRecord>, ServiceError> {
        let user_id = user_id.into();
        self.call(|reply| Command::Get { user_id, reply }).await
    }

    /// Insert zero-state records for members the store has never seen.
    pub async fn reconcile(&self, members: Vec<Member>) -> Result<usize, ServiceError> {
        self.call(|reply| Command::Reconcile { members, reply }).await
    }

    /// Full copy of the current population.
    pub async fn snapshot(&self) -> Result<Population, ServiceError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    /// Ask the service to stop after everything already queued.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ServiceError::Closed)?;
        Ok(rx.await.map_err(|_| ServiceError::Closed)??)
    }
}

/// Owns the store and processes commands one at a time.
pub struct StreakService {
    store: StreakStore,
    policy: SessionPolicy,
    sink: Arc<dyn NotificationSink>,
    io_timeout: Duration,
    /// Last population whose save failed; the next cycle starts from it and
    /// shutdown flushes it.
    pending: Option<Population>,
    /// Blocking store call that outlived its timeout.
    inflight: Option<JoinHandle<()>>,
    rx: mpsc::Receiver<Command>,
}

impl StreakService {
    /// Start the service task.
    pub fn spawn(
        store: StreakStore,
        policy: SessionPolicy,
        sink: Arc<dyn NotificationSink>,
        io_timeout: Duration,
    ) -> (StreakHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let service = Self {
            store,
            policy,
            sink,
            io_timeout,
            pending: None,
            inflight: None,
            rx,
        };
        let task = tokio::spawn(service.run());
        (StreakHandle { tx }, task)
    }

    async fn run(mut self) {
        info!(path = %self.store.path().display(), "streak service started");
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Event { event, reply } => {
                    let result = self.apply_event(event).await;
                    let _ = reply.send(result);
                }
                Command::Get { user_id, reply } => {
                    let result = self.current().await.map(|mut p| p.swap_remove(&user_id));
                    let _ = reply.send(result);
                }
                Command::Reconcile { members, reply } => {
                    let result = self.reconcile(members).await;
                    let _ = reply.send(result);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.current().await);
                }
                Command::Shutdown => break,
            }
        }
        self.flush_pending().await;
        info!("streak service stopped");
    }

    async fn apply_event(&mut self, event: SessionEvent) -> Result<SessionOutcome, StoreError> {
        let mut population = self.current().await?;
        let outcome = session::apply_event(&mut population, &event, &self.policy);
        let username = population
            .get(&event.user_id)
            .map(|r| r.username.clone())
            .unwrap_or_else(|| event.username.clone());

        let saved = self.persist(population).await;

        if let Some(mut notification) = Notification::from_outcome(
            &event.user_id,
            &username,
            &outcome,
            self.policy.minimum_minutes,
        ) {
            notification.unconfirmed = saved.is_err();
            if let Err(e) = self.sink.notify(&notification) {
                warn!(user_id = %event.user_id, error = %e, "failed to deliver notification");
            }
        }

        saved.map(|()| outcome)
    }

    async fn reconcile(&mut self, members: Vec<Member>) -> Result<usize, StoreError> {
        info!(members = members.len(), "initializing streaks data");
        let mut population = self.current().await?;
        let added = rollup::reconcile(&mut population, &members);
        self.persist(population).await?;
        info!(added, "streaks data initialization completed");
        Ok(added)
    }

    /// The latest intended population: a pending unsaved one, else the file.
    async fn current(&mut self) -> Result<Population, StoreError> {
        if let Some(pending) = &self.pending {
            return Ok(pending.clone());
        }
        let store = self.store.clone();
        self.blocking(move || store.load()).await
    }

    async fn persist(&mut self, population: Population) -> Result<(), StoreError> {
        let store = self.store.clone();
        let to_save = population.clone();
        match self.blocking(move || store.save(&to_save)).await {
            Ok(()) => {
                self.pending = None;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to save streaks, keeping changes in memory for retry");
                self.pending = Some(population);
                Err(e)
            }
        }
    }

    async fn flush_pending(&mut self) {
        let Some(population) = self.pending.take() else {
            return;
        };
        info!(users = population.len(), "saving pending streak changes before shutdown");
        let store = self.store.clone();
        if let Err(e) = self.blocking(move || store.save(&population)).await {
            error!(error = %e, "final save failed, last changes are lost");
        }
    }

    /// Run a store call off the async runtime, bounded by `io_timeout`.
    ///
    /// A call that times out keeps running; the next call waits for it first
    /// so two store operations never overlap.
    async fn blocking<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    {
        let secs = self.io_timeout.as_secs();
        if let Some(mut previous) = self.inflight.take() {
            match tokio::time::timeout(self.io_timeout, &mut previous).await {
                Ok(_) => debug!("earlier timed-out store call finished"),
                Err(_) => {
                    self.inflight = Some(previous);
                    return Err(StoreError::Timeout { secs });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        let mut task = tokio::task::spawn_blocking(move || {
            let _ = tx.send(f());
        });

        match tokio::time::timeout(self.io_timeout, &mut task).await {
            Ok(Ok(())) => rx.await.map_err(|_| {
                StoreError::io(self.store.path(), std::io::Error::other("store task dropped its result"))
            })?,
            Ok(Err(join)) => Err(StoreError::io(
                self.store.path(),
                std::io::Error::other(format!("store task failed: {join}")),
            )),
            Err(_) => {
                warn!(secs, path = %self.store.path().display(), "store call timed out");
                self.inflight = Some(task);
                Err(StoreError::Timeout { secs })
            }
        }
    }
}
