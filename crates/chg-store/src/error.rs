//! Store error types for chg-store.

use thiserror::Error;

/// Errors from change store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection string or collection name is unusable.
    #[error("Store configuration error: {0}")]
    Configuration(String),

    /// The store could not be reached or opened.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// A single insert was rejected.
    #[error("Insert failed: {0}")]
    Insert(String),

    /// Schema setup failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Underlying file error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
