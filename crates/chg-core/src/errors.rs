//! Cross-cutting error types for chg.
//!
//! Store, sink, and hook errors live in their own crates, each with its own
//! `Configuration` variant for setup problems. Everything else on the audit
//! path is logged and absorbed.

use thiserror::Error;

/// Errors raised by the core types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A string could not be parsed as a correlation id.
    #[error("Invalid correlation id: {0}")]
    InvalidCorrelationId(String),

    /// A string does not name a known mutation kind.
    #[error("Unknown mutation kind: {0}")]
    UnknownMutationKind(String),

    /// A filter or update payload could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
