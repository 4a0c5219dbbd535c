//! Instrumented in-memory store.
//!
//! Keeps every inserted record and tracks how many inserts run at the same
//! time. Inserts can be slowed down or made to fail for selected records,
//! which is how the sink's concurrency cap and failure isolation are tested.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chg_core::AuditRecord;

use crate::error::StoreError;
use crate::{ChangeStore, StoreConnector};

type RecordPredicate = Box<dyn Fn(&AuditRecord) -> bool + Send + Sync>;

/// A `ChangeStore` that keeps records in a `Vec`.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<AuditRecord>>,
    delay: Option<Duration>,
    fail_when: Option<RecordPredicate>,
    panic_when: Option<RecordPredicate>,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every insert for `delay` before completing it.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reject inserts of records matching `predicate`.
    #[must_use]
    pub fn failing_when(
        mut self,
        predicate: impl Fn(&AuditRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Panic inside inserts of records matching `predicate`.
    #[must_use]
    pub fn panicking_when(
        mut self,
        predicate: impl Fn(&AuditRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.panic_when = Some(Box::new(predicate));
        self
    }

    /// Records inserted successfully, in completion order.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts attempted, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Highest number of inserts observed running at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even if the insert panics.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChangeStore for InMemoryStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_when.as_ref().is_some_and(|p| p(record)) {
            panic!("in-memory store asked to panic on {}", record.to_json());
        }
        if self.fail_when.as_ref().is_some_and(|p| p(record)) {
            return Err(StoreError::Insert("in-memory store rejected record".into()));
        }

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// Hands out one shared [`InMemoryStore`], or refuses to connect.
pub struct InMemoryConnector {
    store: Arc<InMemoryStore>,
    refuse: AtomicBool,
    connects: AtomicUsize,
}

impl InMemoryConnector {
    #[must_use]
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            refuse: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        }
    }

    /// A connector whose every `connect` fails.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            refuse: AtomicBool::new(true),
            connects: AtomicUsize::new(0),
        }
    }

    /// Make later `connect` calls fail (`true`) or succeed again.
    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `connect` calls so far.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    async fn connect(
        &self,
        connection_string: &str,
        _collection: &str,
    ) -> Result<Arc<dyn ChangeStore>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(StoreError::Connect(format!(
                "{connection_string}: connection refused"
            )));
        }
        Ok(Arc::clone(&self.store) as Arc<dyn ChangeStore>)
    }
}
