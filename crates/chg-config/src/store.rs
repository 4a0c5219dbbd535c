//! Change store connection configuration.

use serde::{Deserialize, Serialize};

/// Default collection (table or file stem) receiving change records.
pub const DEFAULT_COLLECTION: &str = "changes";

/// URL schemes served by a remote libSQL server.
pub const REMOTE_SCHEMES: [&str; 3] = ["libsql://", "https://", "http://"];

/// Whether `connection_string` points at a remote libSQL server.
#[must_use]
pub fn is_remote_url(connection_string: &str) -> bool {
    let trimmed = connection_string.trim();
    REMOTE_SCHEMES
        .iter()
        .any(|scheme| trimmed.starts_with(scheme))
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Where change records go: a libSQL path, `:memory:`, a `libsql://` URL,
    /// or `jsonl://<dir>`.
    #[serde(default)]
    pub connection_string: String,

    /// Auth token for remote libSQL URLs.
    #[serde(default)]
    pub auth_token: String,

    /// Collection receiving change records.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            auth_token: String::new(),
            collection: default_collection(),
        }
    }
}

impl StoreConfig {
    /// Whether a connection string has been provided.
    pub fn is_configured(&self) -> bool {
        !self.connection_string.is_empty()
    }

    /// Whether the connection string points at a remote libSQL server.
    pub fn is_remote(&self) -> bool {
        is_remote_url(&self.connection_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_configured() {
        let config = StoreConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.collection, "changes");
        assert!(!config.is_remote());
    }

    #[test]
    fn remote_detection() {
        let config = StoreConfig {
            connection_string: "libsql://audit-acme.turso.io".into(),
            ..Default::default()
        };
        assert!(config.is_configured());
        assert!(config.is_remote());

        let local = StoreConfig {
            connection_string: "./changes.db".into(),
            ..Default::default()
        };
        assert!(!local.is_remote());
    }

    #[test]
    fn remote_schemes_ignore_surrounding_whitespace() {
        assert!(is_remote_url("  http://127.0.0.1:8080 "));
        assert!(!is_remote_url("jsonl://./audit"));
        assert!(!is_remote_url("file:changes.db"));
    }
}
