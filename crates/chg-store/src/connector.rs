//! Connection-string routing.
//!
//! | connection string        | store                         |
//! |--------------------------|-------------------------------|
//! | `jsonl://<dir>`          | [`JsonlChangeStore`]          |
//! | `libsql://`, `http(s)://`| remote [`LibSqlChangeStore`]  |
//! | `file:<path>`            | local [`LibSqlChangeStore`]   |
//! | anything else            | local [`LibSqlChangeStore`]   |

use std::sync::Arc;

use async_trait::async_trait;
use chg_config::{StoreConfig, is_remote_url};

use crate::error::StoreError;
use crate::jsonl_store::JsonlChangeStore;
use crate::libsql_store::LibSqlChangeStore;
use crate::{ChangeStore, StoreConnector};

const JSONL_SCHEME: &str = "jsonl://";
const FILE_SCHEME: &str = "file:";

/// Where a connection string points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Jsonl(String),
    RemoteLibSql(String),
    LocalLibSql(String),
}

impl StoreTarget {
    /// Classify a connection string.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` for an empty string or a
    /// scheme with no location after it.
    pub fn parse(connection_string: &str) -> Result<Self, StoreError> {
        let trimmed = connection_string.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Configuration(
                "connection string is required".into(),
            ));
        }

        let target = if let Some(dir) = trimmed.strip_prefix(JSONL_SCHEME) {
            Self::Jsonl(dir.to_string())
        } else if is_remote_url(trimmed) {
            Self::RemoteLibSql(trimmed.to_string())
        } else if let Some(path) = trimmed.strip_prefix(FILE_SCHEME) {
            Self::LocalLibSql(path.to_string())
        } else {
            Self::LocalLibSql(trimmed.to_string())
        };

        match &target {
            Self::Jsonl(loc) | Self::LocalLibSql(loc) if loc.is_empty() => Err(
                StoreError::Configuration(format!("no location in '{connection_string}'")),
            ),
            _ => Ok(target),
        }
    }
}

/// Opens libSQL or JSONL stores based on the connection string.
#[derive(Debug, Clone, Default)]
pub struct DefaultConnector {
    auth_token: String,
}

impl DefaultConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector carrying the auth token from `config`.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new().with_auth_token(config.auth_token.clone())
    }

    /// Use `auth_token` for remote libSQL connections.
    #[must_use]
    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = auth_token.into();
        self
    }
}

#[async_trait]
impl StoreConnector for DefaultConnector {
    async fn connect(
        &self,
        connection_string: &str,
        collection: &str,
    ) -> Result<Arc<dyn ChangeStore>, StoreError> {
        let store: Arc<dyn ChangeStore> = match StoreTarget::parse(connection_string)? {
            StoreTarget::Jsonl(dir) => Arc::new(JsonlChangeStore::new(dir, collection)?),
            StoreTarget::RemoteLibSql(url) => {
                if self.auth_token.is_empty() {
                    tracing::warn!(%url, "connecting to remote libSQL without an auth token");
                }
                Arc::new(LibSqlChangeStore::open_remote(&url, &self.auth_token, collection).await?)
            }
            StoreTarget::LocalLibSql(path) => {
                Arc::new(LibSqlChangeStore::open_local(&path, collection).await?)
            }
        };
        tracing::debug!(kind = store.kind(), collection, "change store connected");
        Ok(store)
    }
}
