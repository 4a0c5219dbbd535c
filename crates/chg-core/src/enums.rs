//! Mutation kinds and their interception style.
//!
//! All enums serialize as `camelCase` because that is the form hosts use for
//! hook names (`updateMany`, `findAndDelete`, ...) and the form stored in the
//! `action` column of every change record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// MutationStyle
// ---------------------------------------------------------------------------

/// How a mutation reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationStyle {
    /// A whole document is written or removed (`save`, `remove`).
    Document,
    /// A filter selects documents and an optional update payload applies.
    Query,
}

// ---------------------------------------------------------------------------
// MutationKind
// ---------------------------------------------------------------------------

/// The closed set of mutations that produce a change record.
///
/// ```text
/// document: create, save, remove
/// query:    updateOne, updateMany, deleteOne, deleteMany,
///           findAndUpdate, findAndDelete
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    Create,
    Save,
    Remove,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    FindAndUpdate,
    FindAndDelete,
}

impl MutationKind {
    /// Every kind, in hook registration order.
    pub const ALL: [Self; 9] = [
        Self::Create,
        Self::Save,
        Self::Remove,
        Self::UpdateOne,
        Self::UpdateMany,
        Self::DeleteOne,
        Self::DeleteMany,
        Self::FindAndUpdate,
        Self::FindAndDelete,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Save => "save",
            Self::Remove => "remove",
            Self::UpdateOne => "updateOne",
            Self::UpdateMany => "updateMany",
            Self::DeleteOne => "deleteOne",
            Self::DeleteMany => "deleteMany",
            Self::FindAndUpdate => "findAndUpdate",
            Self::FindAndDelete => "findAndDelete",
        }
    }

    #[must_use]
    pub const fn style(self) -> MutationStyle {
        match self {
            Self::Create | Self::Save | Self::Remove => MutationStyle::Document,
            Self::UpdateOne
            | Self::UpdateMany
            | Self::DeleteOne
            | Self::DeleteMany
            | Self::FindAndUpdate
            | Self::FindAndDelete => MutationStyle::Query,
        }
    }

    /// Whether attribution is merged into the store-bound update payload.
    #[must_use]
    pub const fn merges_attribution(self) -> bool {
        matches!(
            self,
            Self::UpdateOne | Self::UpdateMany | Self::FindAndUpdate
        )
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownMutationKind(s.to_string()))
    }
}
