//! The bounded asynchronous sink.
//!
//! Producers call [`ChangeSink::emit`], which never blocks: the record goes
//! onto an mpsc queue and the caller moves on. One drain task owns the
//! receiving end. Before dequeuing a record it takes a permit from a
//! semaphore sized to `concurrent_saves`, then spawns the insert into a
//! `JoinSet` holding that permit, so at most `concurrent_saves` inserts are
//! ever in flight. A panicking insert stays inside its task and is reported
//! from the join result.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chg_core::AuditRecord;
use chg_store::{ChangeStore, StoreConnector};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::SinkError;
use crate::settings::SinkSettings;
use crate::state::{SinkState, StateCell};
use crate::stats::{Counters, InFlight, SinkStats};

enum QueueSender {
    Unbounded(mpsc::UnboundedSender<AuditRecord>),
    Bounded {
        tx: mpsc::Sender<AuditRecord>,
        capacity: usize,
    },
}

impl QueueSender {
    /// Enqueue without waiting. Hands the record back on failure so the
    /// caller can log it.
    fn send(&self, record: AuditRecord) -> Result<(), (SinkError, AuditRecord)> {
        match self {
            Self::Unbounded(tx) => tx.send(record).map_err(|e| (SinkError::Closed, e.0)),
            Self::Bounded { tx, capacity } => tx.try_send(record).map_err(|e| match e {
                TrySendError::Full(record) => (
                    SinkError::QueueFull {
                        capacity: *capacity,
                    },
                    record,
                ),
                TrySendError::Closed(record) => (SinkError::Closed, record),
            }),
        }
    }
}

enum QueueReceiver {
    Unbounded(mpsc::UnboundedReceiver<AuditRecord>),
    Bounded(mpsc::Receiver<AuditRecord>),
}

impl QueueReceiver {
    async fn recv(&mut self) -> Option<AuditRecord> {
        match self {
            Self::Unbounded(rx) => rx.recv().await,
            Self::Bounded(rx) => rx.recv().await,
        }
    }
}

fn queue(capacity: Option<usize>) -> (QueueSender, QueueReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            (
                QueueSender::Bounded { tx, capacity },
                QueueReceiver::Bounded(rx),
            )
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Persisted,
    Failed,
    Discarded,
}

struct Shared {
    settings: SinkSettings,
    connector: Arc<dyn StoreConnector>,
    state: StateCell,
    store: RwLock<Option<Arc<dyn ChangeStore>>>,
    /// `None` once shut down.
    queue: RwLock<Option<QueueSender>>,
    drain: Mutex<Option<JoinHandle<()>>>,
    counters: Counters,
    settled: Notify,
    state_changed: Notify,
}

/// Handle to a running sink. Cheap to clone; every clone feeds the same
/// queue and drain task.
///
/// Call [`ChangeSink::shutdown`] before the runtime stops so queued records
/// are persisted.
#[derive(Clone)]
pub struct ChangeSink {
    shared: Arc<Shared>,
}

impl ChangeSink {
    /// Start the drain task on the current Tokio runtime.
    ///
    /// The sink starts `Uninitialized`; records emitted before a successful
    /// [`Self::init`] are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Configuration` if `settings` are invalid or no Tokio
    /// runtime is running.
    pub fn spawn(
        settings: SinkSettings,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<Self, SinkError> {
        settings.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SinkError::Configuration(format!("a Tokio runtime is required: {e}")))?;

        let (tx, rx) = queue(settings.queue_capacity);
        let shared = Arc::new(Shared {
            settings,
            connector,
            state: StateCell::new(SinkState::Uninitialized),
            store: RwLock::new(None),
            queue: RwLock::new(Some(tx)),
            drain: Mutex::new(None),
            counters: Counters::default(),
            settled: Notify::new(),
            state_changed: Notify::new(),
        });

        let handle = runtime.spawn(drain(Arc::clone(&shared), rx));
        *shared.drain.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        debug!(
            collection = %shared.settings.collection,
            concurrent_saves = shared.settings.concurrent_saves,
            queue_capacity = ?shared.settings.queue_capacity,
            "change sink started"
        );
        Ok(Self { shared })
    }

    /// Connect to the store named by `connection_string`.
    ///
    /// A connection failure is logged and leaves the sink `Uninitialized` (or
    /// `Degraded` if it already was); it is not returned. Calling `init` again
    /// replaces the store handle.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Configuration` for an empty connection string.
    pub async fn init(&self, connection_string: &str) -> Result<(), SinkError> {
        if connection_string.trim().is_empty() {
            return Err(SinkError::Configuration(
                "a connection string is required".into(),
            ));
        }

        let shared = &self.shared;
        let previous = shared.state.swap(SinkState::Connecting);
        shared.state_changed.notify_waiters();

        let collection = shared.settings.collection.as_str();
        match shared.connector.connect(connection_string, collection).await {
            Ok(store) => {
                info!(store = store.kind(), collection, "change store connected");
                *shared.store.write().unwrap_or_else(PoisonError::into_inner) = Some(store);
                shared.state.set(SinkState::Ready);
            }
            Err(err) => {
                let fallback = if previous == SinkState::Degraded {
                    SinkState::Degraded
                } else {
                    SinkState::Uninitialized
                };
                error!(
                    error = %err,
                    collection,
                    state = %fallback,
                    "failed to establish change store connection"
                );
                shared.state.set(fallback);
            }
        }
        shared.state_changed.notify_waiters();
        Ok(())
    }

    /// Queue `record` for persistence. Never blocks and never fails the
    /// caller; refused records are logged and counted as dropped.
    pub fn emit(&self, record: AuditRecord) {
        let state = self.shared.state.get();
        if !state.accepts_emits() {
            self.shared
                .reject(&record, &SinkError::NotConnected { state });
            return;
        }

        // Admitted before the send: the drain must never settle a record
        // that `flush` has not counted yet.
        self.shared.counters.admitted();
        let sent = {
            let queue = self
                .shared
                .queue
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match queue.as_ref() {
                Some(tx) => tx.send(record),
                None => Err((SinkError::Closed, record)),
            }
        };
        if let Err((err, record)) = sent {
            self.shared.counters.withdrawn();
            self.shared.settled.notify_waiters();
            self.shared.reject(&record, &err);
        }
    }

    /// Report that the store connection was lost. Returns `false` unless the
    /// sink was `Ready`.
    pub fn mark_degraded(&self) -> bool {
        let changed = self
            .shared
            .state
            .transition(SinkState::Ready, SinkState::Degraded);
        if changed {
            warn!(collection = %self.shared.settings.collection, "change store degraded");
            self.shared.state_changed.notify_waiters();
        }
        changed
    }

    /// Restore `Ready` after [`Self::mark_degraded`]. Returns `false` unless
    /// the sink was `Degraded` with a store handle.
    pub fn mark_ready(&self) -> bool {
        let has_store = self
            .shared
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        let changed = has_store
            && self
                .shared
                .state
                .transition(SinkState::Degraded, SinkState::Ready);
        if changed {
            info!(collection = %self.shared.settings.collection, "change store ready again");
            self.shared.state_changed.notify_waiters();
        }
        changed
    }

    #[must_use]
    pub fn state(&self) -> SinkState {
        self.shared.state.get()
    }

    #[must_use]
    pub fn stats(&self) -> SinkStats {
        self.shared.counters.snapshot()
    }

    #[must_use]
    pub fn settings(&self) -> &SinkSettings {
        &self.shared.settings
    }

    /// Wait until every admitted record has been persisted, has failed, or
    /// has been discarded.
    pub async fn flush(&self) {
        loop {
            let settled = self.shared.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();
            if self.shared.counters.is_settled() {
                return;
            }
            settled.await;
        }
    }

    /// Close the queue, persist everything already admitted and stop the
    /// drain task. Later emits are dropped. Safe to call more than once.
    pub async fn shutdown(&self) {
        let sender = self
            .shared
            .queue
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            info!(
                collection = %self.shared.settings.collection,
                admitted = self.shared.counters.snapshot().admitted,
                "change sink shutting down"
            );
        }
        drop(sender);

        let handle = self
            .shared
            .drain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(error = %err, "change sink drain task failed");
            }
        }
        self.flush().await;
    }
}

impl fmt::Debug for ChangeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSink")
            .field("collection", &self.shared.settings.collection)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn reject(&self, record: &AuditRecord, err: &SinkError) {
        self.counters.rejected();
        error!(
            error = %err,
            action = %record.action(),
            model = record.model_name(),
            record = %record.to_json(),
            "change record dropped"
        );
    }

    /// The store handle once the sink is `Ready`, waiting out a connect in
    /// progress. `None` when there is nothing to write to.
    async fn ready_store(&self) -> Option<Arc<dyn ChangeStore>> {
        loop {
            let changed = self.state_changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();
            match self.state.get() {
                SinkState::Ready => {
                    return self
                        .store
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                }
                SinkState::Connecting => changed.await,
                SinkState::Uninitialized | SinkState::Degraded => return None,
            }
        }
    }

    async fn persist(&self, record: AuditRecord) {
        let in_flight = InFlight::enter(&self.counters);

        let outcome = match self.ready_store().await {
            None => {
                let err = SinkError::NotConnected {
                    state: self.state.get(),
                };
                error!(
                    error = %err,
                    action = %record.action(),
                    model = record.model_name(),
                    record = %record.to_json(),
                    "change record discarded before insert"
                );
                Outcome::Discarded
            }
            Some(store) => match store.insert(&record).await {
                Ok(()) => {
                    debug!(
                        store = store.kind(),
                        action = %record.action(),
                        model = record.model_name(),
                        "change record persisted"
                    );
                    Outcome::Persisted
                }
                Err(source) => {
                    let err = SinkError::Persistence {
                        record: Box::new(record),
                        source,
                    };
                    let json = err.record().map(AuditRecord::to_json).unwrap_or_default();
                    error!(
                        error = %err,
                        store = store.kind(),
                        record = %json,
                        "change record insert failed"
                    );
                    Outcome::Failed
                }
            },
        };

        drop(in_flight);
        self.settle(outcome);
    }

    fn settle(&self, outcome: Outcome) {
        match outcome {
            Outcome::Persisted => self.counters.persisted(),
            Outcome::Failed => self.counters.failed(),
            Outcome::Discarded => self.counters.discarded(),
        }
        self.settled.notify_waiters();
    }

    /// Account for a finished insert task. Successful tasks have already
    /// settled themselves; a task that panicked never got the chance.
    fn reap(
        &self,
        labels: &mut HashMap<task::Id, String>,
        joined: Result<(task::Id, ()), JoinError>,
    ) {
        match joined {
            Ok((id, ())) => {
                labels.remove(&id);
            }
            Err(err) => {
                let record = labels.remove(&err.id()).unwrap_or_default();
                error!(error = %err, record = %record, "change record insert panicked");
                self.settle(Outcome::Failed);
            }
        }
    }
}

async fn next_record(
    permits: &Arc<Semaphore>,
    rx: &mut QueueReceiver,
) -> Option<(OwnedSemaphorePermit, AuditRecord)> {
    let permit = Arc::clone(permits).acquire_owned().await.ok()?;
    let record = rx.recv().await?;
    Some((permit, record))
}

async fn drain(shared: Arc<Shared>, mut rx: QueueReceiver) {
    let permits = Arc::new(Semaphore::new(shared.settings.concurrent_saves));
    let mut tasks = JoinSet::new();
    // Serialized form of each running record, for panic reports.
    let mut labels: HashMap<task::Id, String> = HashMap::new();

    loop {
        tokio::select! {
            Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                shared.reap(&mut labels, joined);
            }
            next = next_record(&permits, &mut rx) => {
                let Some((permit, record)) = next else {
                    break;
                };
                let json = record.to_json();
                let task_shared = Arc::clone(&shared);
                let handle = tasks.spawn(async move {
                    task_shared.persist(record).await;
                    drop(permit);
                });
                labels.insert(handle.id(), json);
            }
        }
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        shared.reap(&mut labels, joined);
    }
    debug!(collection = %shared.settings.collection, "change sink drain stopped");
}
