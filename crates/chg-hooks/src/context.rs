//! Side-channel attribution for in-flight operations.
//!
//! Attribution is keyed by [`OperationId`] instead of being stored on the
//! operation, so the host's operation types stay untouched and two
//! operations can never see each other's actor. An operation that is
//! dropped without running holds an [`AttributionGuard`] that clears its
//! entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chg_core::{Actor, Attribution, OperationId};

/// Map of pending attributions, one entry per in-flight operation.
#[derive(Debug, Default)]
pub struct AttributionContext {
    entries: Mutex<HashMap<OperationId, Attribution>>,
}

impl AttributionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<OperationId, Attribution>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attribute `operation` to `actor` with a fresh correlation id and the
    /// caller's location. Replaces any earlier attribution of the same
    /// operation.
    #[track_caller]
    pub fn attribute(&self, operation: OperationId, actor: impl Into<Actor>) -> OperationId {
        let attribution = Attribution::new(actor);
        self.entries().insert(operation, attribution);
        operation
    }

    #[must_use]
    pub fn get(&self, operation: OperationId) -> Option<Attribution> {
        self.entries().get(&operation).cloned()
    }

    /// Clear the attribution of `operation`, returning it.
    pub fn reset(&self, operation: OperationId) -> Option<Attribution> {
        self.entries().remove(&operation)
    }

    #[must_use]
    pub fn is_attributed(&self, operation: OperationId) -> bool {
        self.entries().contains_key(&operation)
    }

    /// Number of operations currently attributed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Clears one operation's attribution when dropped.
///
/// Holds the context weakly: a guard outliving its context does nothing.
#[derive(Debug)]
pub struct AttributionGuard {
    ctx: Weak<AttributionContext>,
    operation: OperationId,
}

impl AttributionGuard {
    #[must_use]
    pub fn new(ctx: &Arc<AttributionContext>, operation: OperationId) -> Self {
        Self {
            ctx: Arc::downgrade(ctx),
            operation,
        }
    }

    #[must_use]
    pub const fn operation(&self) -> OperationId {
        self.operation
    }

    /// Whether this guard clears `operation` in `ctx`.
    #[must_use]
    pub fn covers(&self, ctx: &Arc<AttributionContext>, operation: OperationId) -> bool {
        self.operation == operation && std::ptr::eq(self.ctx.as_ptr(), Arc::as_ptr(ctx))
    }
}

impl PartialEq for AttributionGuard {
    fn eq(&self, other: &Self) -> bool {
        self.operation == other.operation && Weak::ptr_eq(&self.ctx, &other.ctx)
    }
}

impl Drop for AttributionGuard {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.reset(self.operation);
        }
    }
}
