//! Merging attribution into store-bound update payloads.
//!
//! For updating query kinds the affected documents should carry the same
//! correlation id and actor as the change record, so the hidden fields are
//! written into the update itself before it reaches the store.

use serde_json::{Map, Value};

use crate::attribution::Attribution;
use crate::ids::{ACTOR_FIELD, CHANGE_ID_FIELD};

const SET_OPERATOR: &str = "$set";

/// Merge `attribution` into `update` in place.
///
/// Operator-style updates (any `$`-prefixed key) get the fields in `$set`,
/// which is created if missing. Replacement-style updates get them as
/// top-level fields. Returns `false` when `update` is not a JSON object and
/// nothing was merged.
pub fn merge_attribution(update: &mut Value, attribution: &Attribution) -> bool {
    let Value::Object(root) = update else {
        return false;
    };

    let uses_operators = root.keys().any(|key| key.starts_with('$'));
    let target = if uses_operators {
        let set = root
            .entry(SET_OPERATOR)
            .or_insert_with(|| Value::Object(Map::new()));
        match set {
            Value::Object(fields) => fields,
            _ => return false,
        }
    } else {
        root
    };

    target.insert(
        CHANGE_ID_FIELD.to_string(),
        Value::String(attribution.correlation_id.to_hex()),
    );
    target.insert(ACTOR_FIELD.to_string(), attribution.actor.as_value().clone());
    true
}
