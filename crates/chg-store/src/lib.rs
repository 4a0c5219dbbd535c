//! # chg-store
//!
//! The durable side of chg: append-only stores that accept one change record
//! per `insert`.
//!
//! - [`libsql_store::LibSqlChangeStore`] writes rows into a libSQL table
//!   (local file, `:memory:`, or a remote Turso database).
//! - [`jsonl_store::JsonlChangeStore`] appends one JSON line per record to
//!   `<dir>/<collection>.jsonl`.
//! - [`memory::InMemoryStore`] is an instrumented double for tests and hosts
//!   that want to observe the pipeline.
//! - [`connector::DefaultConnector`] maps a connection string to one of the
//!   above.

pub mod connector;
pub mod error;
pub mod jsonl_store;
pub mod libsql_store;
pub mod memory;
mod migrations;

use std::sync::Arc;

use async_trait::async_trait;
use chg_core::AuditRecord;

pub use connector::DefaultConnector;
pub use error::StoreError;

/// An append-only destination for change records.
///
/// Object-safe so the sink can hold it as `Arc<dyn ChangeStore>`.
#[async_trait]
pub trait ChangeStore: Send + Sync {
    /// Persist one record.
    async fn insert(&self, record: &AuditRecord) -> Result<(), StoreError>;

    /// Short label for logs (`"libsql"`, `"jsonl"`, ...).
    fn kind(&self) -> &'static str;
}

/// Opens a [`ChangeStore`] from a connection string.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connect and prepare `collection` for appends.
    async fn connect(
        &self,
        connection_string: &str,
        collection: &str,
    ) -> Result<Arc<dyn ChangeStore>, StoreError>;
}

/// Check that `collection` is a plain identifier usable as a table name or
/// file stem.
///
/// # Errors
///
/// Returns `StoreError::Configuration` for empty names or names with
/// characters outside `[A-Za-z0-9_]`, or a leading digit.
pub fn validate_collection(collection: &str) -> Result<(), StoreError> {
    let mut chars = collection.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Configuration(format!(
            "invalid collection name '{collection}': expected [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}
