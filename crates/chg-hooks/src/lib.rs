//! # chg-hooks
//!
//! Glue between a host model layer and the chg pipeline.
//!
//! A host exposes its schema through [`ModelSchema`] (or embeds a
//! [`HookRegistry`]) and its in-flight operations through
//! [`MutationTarget`]. Callers attribute operations through an
//! [`AttributionContext`], and [`ChangeLogger::register`] installs the hooks
//! that turn each attributed mutation into a change record on a
//! [`chg_sink::ChangeSink`].

pub mod context;
pub mod error;
pub mod logger;
pub mod schema;
pub mod target;

pub use context::{AttributionContext, AttributionGuard};
pub use error::HookError;
pub use logger::{AttributionWarning, ChangeLogger, PreparedRecord, RegistrationParams};
pub use schema::{FieldType, HiddenField, HookRegistry, ModelSchema, PostHook, PreHook};
pub use target::{Attributable, DocumentOperation, HookOutcome, MutationTarget, QueryOperation};
