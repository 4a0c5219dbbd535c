//! The in-flight operation as seen by hooks.

use std::sync::Arc;

use chg_core::{Actor, OperationId};
use serde_json::{Value, json};

use crate::context::{AttributionContext, AttributionGuard};

/// An operation the host is about to run (pre hooks) or has just run (post
/// hooks).
pub trait MutationTarget: Send + Sync {
    /// Key of this operation in the [`AttributionContext`].
    fn operation_id(&self) -> OperationId;

    /// JSON description used in warnings.
    fn describe(&self) -> Value;

    /// The query filter. `None` for document operations.
    fn filter(&self) -> Option<&Value> {
        None
    }

    /// The store-bound update payload. `None` for document operations and
    /// for queries that carry no update.
    fn update(&self) -> Option<&Value> {
        None
    }

    /// Mutable access to the update payload, for merging attribution.
    fn update_mut(&mut self) -> Option<&mut Value> {
        None
    }
}

/// Attach an actor to an operation before handing it to the host.
///
/// The operation keeps an [`AttributionGuard`], so its entry is cleared
/// when the operation is dropped even if it never reaches the post hooks.
pub trait Attributable: MutationTarget + Sized {
    /// Storage for the guard of this operation's attribution.
    fn attribution_slot(&mut self) -> &mut Option<Arc<AttributionGuard>>;

    /// Attribute this operation to `actor` and return it for chaining.
    #[must_use]
    #[track_caller]
    fn by(mut self, ctx: &Arc<AttributionContext>, actor: impl Into<Actor>) -> Self {
        let operation = ctx.attribute(self.operation_id(), actor);
        let slot = self.attribution_slot();
        // Replacing a guard for the same entry would clear the attribution
        // just made.
        if !slot
            .as_ref()
            .is_some_and(|guard| guard.covers(ctx, operation))
        {
            *slot = Some(Arc::new(AttributionGuard::new(ctx, operation)));
        }
        self
    }
}

/// A filter-based operation, optionally carrying an update.
///
/// Clones share the operation id and its attribution, which is cleared when
/// the last clone is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOperation {
    id: OperationId,
    pub filter: Value,
    pub update: Option<Value>,
    guard: Option<Arc<AttributionGuard>>,
}

impl QueryOperation {
    /// Query matching `filter`, with a new operation id.
    #[must_use]
    pub fn new(filter: Value) -> Self {
        Self {
            id: OperationId::next(),
            filter,
            update: None,
            guard: None,
        }
    }

    #[must_use]
    pub fn with_update(mut self, update: Value) -> Self {
        self.update = Some(update);
        self
    }
}

impl MutationTarget for QueryOperation {
    fn operation_id(&self) -> OperationId {
        self.id
    }

    fn describe(&self) -> Value {
        json!({ "conditions": self.filter, "update": self.update })
    }

    fn filter(&self) -> Option<&Value> {
        Some(&self.filter)
    }

    fn update(&self) -> Option<&Value> {
        self.update.as_ref()
    }

    fn update_mut(&mut self) -> Option<&mut Value> {
        self.update.as_mut()
    }
}

impl Attributable for QueryOperation {
    fn attribution_slot(&mut self) -> &mut Option<Arc<AttributionGuard>> {
        &mut self.guard
    }
}

/// A whole-document operation (create, save, remove).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOperation {
    id: OperationId,
    pub document: Value,
    guard: Option<Arc<AttributionGuard>>,
}

impl DocumentOperation {
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self {
            id: OperationId::next(),
            document,
            guard: None,
        }
    }
}

impl MutationTarget for DocumentOperation {
    fn operation_id(&self) -> OperationId {
        self.id
    }

    fn describe(&self) -> Value {
        self.document.clone()
    }
}

impl Attributable for DocumentOperation {
    fn attribution_slot(&mut self) -> &mut Option<Arc<AttributionGuard>> {
        &mut self.guard
    }
}

/// How the host's mutation ended, passed to post hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Success,
    Failure(String),
}

impl HookOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn operations_get_distinct_ids() {
        let a = QueryOperation::new(json!({}));
        let b = DocumentOperation::new(json!({}));
        assert_ne!(a.operation_id(), b.operation_id());
    }

    #[test]
    fn by_attributes_and_returns_the_operation() {
        let ctx = Arc::new(AttributionContext::new());
        let query = QueryOperation::new(json!({"status": "open"})).by(&ctx, "alice");

        let attribution = ctx.get(query.operation_id()).unwrap();
        assert_eq!(attribution.actor.as_str(), Some("alice"));
        assert!(attribution.capture_point.file.ends_with("target.rs"));
    }

    #[test]
    fn documents_expose_no_query_parts() {
        let mut doc = DocumentOperation::new(json!({"sku": "A-1"}));
        assert!(doc.filter().is_none());
        assert!(doc.update_mut().is_none());
        assert_eq!(doc.describe(), json!({"sku": "A-1"}));
    }

    #[test]
    fn query_description_includes_update() {
        let query = QueryOperation::new(json!({"_id": 1})).with_update(json!({"$set": {"x": 2}}));
        assert_eq!(
            query.describe(),
            json!({"conditions": {"_id": 1}, "update": {"$set": {"x": 2}}})
        );
    }

    #[test]
    fn dropped_operations_leave_no_attribution_behind() {
        let ctx = Arc::new(AttributionContext::new());
        for i in 0..1000 {
            let query = QueryOperation::new(json!({"n": i})).by(&ctx, "alice");
            let doc = DocumentOperation::new(json!({"n": i})).by(&ctx, "bob");
            assert!(ctx.is_attributed(query.operation_id()));
            assert!(ctx.is_attributed(doc.operation_id()));
        }
        assert!(ctx.is_empty());
    }

    #[test]
    fn reattributing_keeps_the_new_entry() {
        let ctx = Arc::new(AttributionContext::new());
        let doc = DocumentOperation::new(json!({})).by(&ctx, "alice");
        let doc = doc.by(&ctx, "bob");

        let attribution = ctx.get(doc.operation_id()).unwrap();
        assert_eq!(attribution.actor.as_str(), Some("bob"));
        drop(doc);
        assert!(ctx.is_empty());
    }

    #[test]
    fn clones_share_the_attribution_until_the_last_is_dropped() {
        let ctx = Arc::new(AttributionContext::new());
        let query = QueryOperation::new(json!({})).by(&ctx, "alice");
        let copy = query.clone();

        drop(query);
        assert!(ctx.is_attributed(copy.operation_id()));
        drop(copy);
        assert!(ctx.is_empty());
    }

    #[test]
    fn moving_to_another_context_clears_the_first() {
        let first = Arc::new(AttributionContext::new());
        let second = Arc::new(AttributionContext::new());
        let doc = DocumentOperation::new(json!({}))
            .by(&first, "alice")
            .by(&second, "bob");

        assert!(first.is_empty());
        assert!(second.is_attributed(doc.operation_id()));
    }
}
