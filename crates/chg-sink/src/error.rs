use chg_core::AuditRecord;
use chg_store::StoreError;

use crate::state::SinkState;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("change store is not connected (sink state: {state})")]
    NotConnected { state: SinkState },

    #[error("change sink is shut down")]
    Closed,

    #[error("change queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("failed to persist change record: {source}")]
    Persistence {
        record: Box<AuditRecord>,
        #[source]
        source: StoreError,
    },
}

impl SinkError {
    /// The record that could not be persisted, for persistence failures.
    #[must_use]
    pub fn record(&self) -> Option<&AuditRecord> {
        match self {
            Self::Persistence { record, .. } => Some(record),
            _ => None,
        }
    }
}
