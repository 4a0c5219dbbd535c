//! The schema capability a host model layer provides, and a ready-made
//! implementation of it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chg_core::MutationKind;
use chg_core::ids::{ACTOR_FIELD, CHANGE_ID_FIELD};
use serde::Serialize;

use crate::target::{HookOutcome, MutationTarget};

/// Runs before the host's mutation; may edit the target's update payload.
pub type PreHook = Arc<dyn Fn(MutationKind, &mut dyn MutationTarget) + Send + Sync>;

/// Runs after the host's mutation, whether it succeeded or not.
pub type PostHook = Arc<dyn Fn(MutationKind, &dyn MutationTarget, &HookOutcome) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    ObjectId,
    Mixed,
}

/// A field stored on entities but excluded from reads unless asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HiddenField {
    pub name: &'static str,
    pub field_type: FieldType,
    pub selected_by_default: bool,
}

impl HiddenField {
    /// `__changeId`: correlation id of the last attributed change.
    #[must_use]
    pub const fn change_id() -> Self {
        Self {
            name: CHANGE_ID_FIELD,
            field_type: FieldType::ObjectId,
            selected_by_default: false,
        }
    }

    /// `__actor`: actor of the last attributed change.
    #[must_use]
    pub const fn actor() -> Self {
        Self {
            name: ACTOR_FIELD,
            field_type: FieldType::Mixed,
            selected_by_default: false,
        }
    }
}

/// What the change logger needs from a host schema.
pub trait ModelSchema {
    fn add_hidden_field(&mut self, field: HiddenField);
    fn pre(&mut self, kind: MutationKind, hook: PreHook);
    fn post(&mut self, kind: MutationKind, hook: PostHook);
}

/// Hidden fields plus pre and post hooks per mutation kind.
///
/// Host adapters embed one per model and call [`HookRegistry::run_pre`] and
/// [`HookRegistry::run_post`] around each mutation.
#[derive(Default)]
pub struct HookRegistry {
    hidden_fields: Vec<HiddenField>,
    pre: HashMap<MutationKind, Vec<PreHook>>,
    post: HashMap<MutationKind, Vec<PostHook>>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn hidden_fields(&self) -> &[HiddenField] {
        &self.hidden_fields
    }

    /// Number of (pre, post) hooks registered for `kind`.
    #[must_use]
    pub fn hook_count(&self, kind: MutationKind) -> (usize, usize) {
        (
            self.pre.get(&kind).map_or(0, Vec::len),
            self.post.get(&kind).map_or(0, Vec::len),
        )
    }

    /// Run the pre hooks for `kind` in registration order.
    pub fn run_pre(&self, kind: MutationKind, target: &mut dyn MutationTarget) {
        for hook in self.pre.get(&kind).into_iter().flatten() {
            hook(kind, &mut *target);
        }
    }

    /// Run the post hooks for `kind` in registration order.
    pub fn run_post(
        &self,
        kind: MutationKind,
        target: &dyn MutationTarget,
        outcome: &HookOutcome,
    ) {
        for hook in self.post.get(&kind).into_iter().flatten() {
            hook(kind, target, outcome);
        }
    }

    /// Run `mutation` between the pre and post hooks of `kind`.
    ///
    /// Post hooks see the mutation's outcome and run on failure too. A panic
    /// in a pre hook or in `mutation` reaches the post hooks as a
    /// [`HookOutcome::Failure`] and is then resumed.
    ///
    /// # Errors
    ///
    /// Returns whatever `mutation` returns.
    pub fn run_around<T, E: fmt::Display>(
        &self,
        kind: MutationKind,
        target: &mut dyn MutationTarget,
        mutation: impl FnOnce(&dyn MutationTarget) -> Result<T, E>,
    ) -> Result<T, E> {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_pre(kind, &mut *target);
            mutation(&*target)
        }));
        let outcome = match &attempt {
            Ok(Ok(_)) => HookOutcome::Success,
            Ok(Err(err)) => HookOutcome::Failure(err.to_string()),
            Err(payload) => HookOutcome::Failure(panic_message(&**payload)),
        };
        self.run_post(kind, &*target, &outcome);
        match attempt {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    format!("panicked: {detail}")
}

impl ModelSchema for HookRegistry {
    fn add_hidden_field(&mut self, field: HiddenField) {
        if !self.hidden_fields.iter().any(|f| f.name == field.name) {
            self.hidden_fields.push(field);
        }
    }

    fn pre(&mut self, kind: MutationKind, hook: PreHook) {
        self.pre.entry(kind).or_default().push(hook);
    }

    fn post(&mut self, kind: MutationKind, hook: PostHook) {
        self.post.entry(kind).or_default().push(hook);
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hidden_fields", &self.hidden_fields)
            .field("pre_kinds", &self.pre.len())
            .field("post_kinds", &self.post.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::QueryOperation;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn hidden_fields_are_declared_once() {
        let mut registry = HookRegistry::new();
        registry.add_hidden_field(HiddenField::change_id());
        registry.add_hidden_field(HiddenField::actor());
        registry.add_hidden_field(HiddenField::change_id());

        let names: Vec<_> = registry.hidden_fields().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["__changeId", "__actor"]);
        assert!(registry.hidden_fields().iter().all(|f| !f.selected_by_default));
    }

    #[test]
    fn hooks_run_in_order_for_their_kind_only() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        for label in ["first", "second"] {
            let calls = Arc::clone(&calls);
            registry.pre(
                MutationKind::UpdateOne,
                Arc::new(move |_: MutationKind, _: &mut dyn MutationTarget| {
                    calls.lock().unwrap().push(label);
                }),
            );
        }

        let mut query = QueryOperation::new(json!({}));
        registry.run_pre(MutationKind::DeleteOne, &mut query);
        registry.run_pre(MutationKind::UpdateOne, &mut query);

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(registry.hook_count(MutationKind::UpdateOne), (2, 0));
    }

    #[test]
    fn post_hooks_see_failures() {
        let seen = Arc::new(Mutex::new(None));
        let mut registry = HookRegistry::new();
        {
            let seen = Arc::clone(&seen);
            registry.post(
                MutationKind::Save,
                Arc::new(
                    move |_: MutationKind, _: &dyn MutationTarget, outcome: &HookOutcome| {
                        *seen.lock().unwrap() = Some(outcome.clone());
                    },
                ),
            );
        }

        let mut doc = crate::target::DocumentOperation::new(json!({}));
        let result: Result<(), String> =
            registry.run_around(MutationKind::Save, &mut doc, |_| Err("duplicate key".into()));

        assert!(result.is_err());
        assert_eq!(
            *seen.lock().unwrap(),
            Some(HookOutcome::Failure("duplicate key".into()))
        );
    }

    #[test]
    fn post_hooks_run_when_the_mutation_panics() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        {
            let seen = Arc::clone(&seen);
            registry.post(
                MutationKind::Create,
                Arc::new(
                    move |_: MutationKind, _: &dyn MutationTarget, outcome: &HookOutcome| {
                        seen.lock().unwrap().push(outcome.clone());
                    },
                ),
            );
        }

        let mut doc = crate::target::DocumentOperation::new(json!({}));
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), String> =
                registry.run_around(MutationKind::Create, &mut doc, |_| panic!("driver crashed"));
        }));

        assert!(unwound.is_err());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![HookOutcome::Failure("panicked: driver crashed".into())]
        );
    }

    #[test]
    fn post_hooks_run_when_a_pre_hook_panics() {
        let posts = Arc::new(Mutex::new(0));
        let mut registry = HookRegistry::new();
        registry.pre(
            MutationKind::Save,
            Arc::new(|_: MutationKind, _: &mut dyn MutationTarget| {
                panic!("{}", String::from("bad pre hook"));
            }),
        );
        {
            let posts = Arc::clone(&posts);
            registry.post(
                MutationKind::Save,
                Arc::new(
                    move |_: MutationKind, _: &dyn MutationTarget, outcome: &HookOutcome| {
                        assert_eq!(outcome, &HookOutcome::Failure("panicked: bad pre hook".into()));
                        *posts.lock().unwrap() += 1;
                    },
                ),
            );
        }

        let mut doc = crate::target::DocumentOperation::new(json!({}));
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), String> = registry.run_around(MutationKind::Save, &mut doc, |_| Ok(()));
        }));

        assert!(unwound.is_err());
        assert_eq!(*posts.lock().unwrap(), 1);
    }
}
