//! The immutable change record persisted for every intercepted mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attribution::Actor;
use crate::enums::MutationKind;
use crate::errors::CoreError;
use crate::ids::CorrelationId;

/// Serialized filter and update payload of a query-style mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryExtra {
    /// JSON of the query filter.
    pub conditions: String,
    /// JSON of the store-bound update document, after attribution was merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
}

impl QueryExtra {
    /// Serialize a filter and an optional update document.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if either value fails to serialize.
    pub fn capture(
        filter: &serde_json::Value,
        update: Option<&serde_json::Value>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            conditions: serde_json::to_string(filter)?,
            update: update.map(serde_json::to_string).transpose()?,
        })
    }

    /// Parse `conditions` back into JSON.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the stored string is not JSON.
    pub fn conditions_json(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::from_str(&self.conditions)?)
    }

    /// Parse `update` back into JSON, if present.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the stored string is not JSON.
    pub fn update_json(&self) -> Result<Option<serde_json::Value>, CoreError> {
        self.update
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(CoreError::from)
    }
}

/// An append-only change record.
///
/// Built by [`crate::factory::build_record`]; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<CorrelationId>,
    action: MutationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor: Option<Actor>,
    model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capture_point: Option<String>,
    occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extra: Option<QueryExtra>,
}

impl AuditRecord {
    pub(crate) fn from_parts(
        id: Option<CorrelationId>,
        action: MutationKind,
        actor: Option<Actor>,
        model_name: String,
        capture_point: Option<String>,
        occurred_at: DateTime<Utc>,
        extra: Option<QueryExtra>,
    ) -> Self {
        Self {
            id,
            action,
            actor,
            model_name,
            capture_point,
            occurred_at,
            extra,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Option<CorrelationId> {
        self.id
    }

    #[must_use]
    pub const fn action(&self) -> MutationKind {
        self.action
    }

    #[must_use]
    pub const fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    #[must_use]
    pub fn capture_point(&self) -> Option<&str> {
        self.capture_point.as_deref()
    }

    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    #[must_use]
    pub const fn extra(&self) -> Option<&QueryExtra> {
        self.extra.as_ref()
    }

    /// Whether the record lacks actor or correlation id.
    #[must_use]
    pub const fn is_unattributed(&self) -> bool {
        self.id.is_none() || self.actor.is_none()
    }

    /// Compact JSON form, used for store payloads and failure logs.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Every field serializes infallibly: strings, ids, and JSON values.
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
