//! Pure construction of change records.

use chrono::{DateTime, Utc};

use crate::attribution::Attribution;
use crate::enums::MutationKind;
use crate::record::{AuditRecord, QueryExtra};

/// Build a record stamped with the current time.
///
/// A missing attribution, or one whose actor is `null`, still yields a record;
/// callers decide how loudly to report it.
#[must_use]
pub fn build_record(
    kind: MutationKind,
    model_name: &str,
    attribution: Option<&Attribution>,
    extra: Option<QueryExtra>,
) -> AuditRecord {
    build_record_at(kind, model_name, attribution, extra, Utc::now())
}

/// Build a record with an explicit timestamp.
#[must_use]
pub fn build_record_at(
    kind: MutationKind,
    model_name: &str,
    attribution: Option<&Attribution>,
    extra: Option<QueryExtra>,
    occurred_at: DateTime<Utc>,
) -> AuditRecord {
    let id = attribution.map(|a| a.correlation_id);
    let actor = attribution
        .map(|a| a.actor.clone())
        .filter(|actor| !actor.is_null());
    let capture_point = attribution.map(|a| a.capture_point.to_string());

    AuditRecord::from_parts(
        id,
        kind,
        actor,
        model_name.to_string(),
        capture_point,
        occurred_at,
        extra,
    )
}
