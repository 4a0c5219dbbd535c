//! Pipeline counters.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Point-in-time view of the sink's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    /// Records accepted into the queue.
    pub admitted: u64,
    /// Records refused by `emit`, plus admitted records discarded because the
    /// store was not ready when their turn came.
    pub dropped: u64,
    pub persisted: u64,
    /// Inserts that returned an error or panicked.
    pub failed: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    admitted: AtomicU64,
    rejected: AtomicU64,
    discarded: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Counters {
    pub(crate) fn admitted(&self) {
        self.admitted.fetch_add(1, Ordering::AcqRel);
    }

    /// Undo an [`Self::admitted`] for a record the queue then refused.
    pub(crate) fn withdrawn(&self) {
        self.admitted.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn discarded(&self) {
        self.discarded.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn persisted(&self) {
        self.persisted.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
    }

    /// Count one more running persistence task. Paired with [`Self::exit`].
    pub(crate) fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    pub(crate) fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Every admitted record has reached a final outcome.
    pub(crate) fn is_settled(&self) -> bool {
        let settled = self.persisted.load(Ordering::Acquire)
            + self.failed.load(Ordering::Acquire)
            + self.discarded.load(Ordering::Acquire);
        settled >= self.admitted.load(Ordering::Acquire)
    }

    pub(crate) fn snapshot(&self) -> SinkStats {
        SinkStats {
            admitted: self.admitted.load(Ordering::Acquire),
            dropped: self.rejected.load(Ordering::Acquire)
                + self.discarded.load(Ordering::Acquire),
            persisted: self.persisted.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            in_flight: self.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
        }
    }
}

/// Keeps `in_flight` accurate when a persistence task unwinds.
pub(crate) struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    pub(crate) fn enter(counters: &'a Counters) -> Self {
        counters.enter();
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.exit();
    }
}
