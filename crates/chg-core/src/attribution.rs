//! Actor attribution carried by an in-flight mutation.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

use crate::ids::CorrelationId;

/// Opaque, caller-supplied identity of whoever performs a mutation.
///
/// Usually a user id string, but any JSON value is accepted so hosts can
/// attach structured principals (`{"user": "alice", "via": "api"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(serde_json::Value);

impl Actor {
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    /// A `null` actor counts as no actor at all.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// The actor as a plain string, when it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}

impl From<&str> for Actor {
    fn from(value: &str) -> Self {
        Self(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Actor {
    fn from(value: String) -> Self {
        Self(serde_json::Value::String(value))
    }
}

impl From<serde_json::Value> for Actor {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// Source location of the call that attributed a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePoint {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl CapturePoint {
    /// The location of whoever called the enclosing `#[track_caller]` chain.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&Location<'_>> for CapturePoint {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CapturePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Who is performing a pending mutation, and from where.
///
/// Owned by exactly one in-flight operation. A new `Attribution` always gets a
/// fresh correlation id, so re-attributing an operation replaces, never
/// accumulates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub correlation_id: CorrelationId,
    pub actor: Actor,
    pub capture_point: CapturePoint,
}

impl Attribution {
    /// Attribute to `actor`, capturing the caller's location.
    #[must_use]
    #[track_caller]
    pub fn new(actor: impl Into<Actor>) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            actor: actor.into(),
            capture_point: CapturePoint::caller(),
        }
    }

    /// Whether the actor is set to something other than `null`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.actor.is_null()
    }
}
