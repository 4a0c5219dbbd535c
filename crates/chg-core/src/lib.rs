//! # chg-core
//!
//! Core types, ID generation, and error types for chg.
//!
//! This crate provides the foundational types shared across all chg crates:
//! - Mutation kinds and their interception style
//! - Correlation ids (object-id layout) and operation ids
//! - Actor attribution with call-site capture
//! - The immutable change record and its factory
//! - Merging attribution into store-bound update payloads
//! - Cross-cutting error types

pub mod attribution;
pub mod enums;
pub mod errors;
pub mod factory;
pub mod ids;
pub mod merge;
pub mod record;

pub use attribution::{Actor, Attribution, CapturePoint};
pub use enums::{MutationKind, MutationStyle};
pub use errors::CoreError;
pub use ids::{CorrelationId, OperationId};
pub use record::{AuditRecord, QueryExtra};
