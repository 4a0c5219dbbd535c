//! JSONL change files.
//!
//! Appends one change record per line to `{dir}/{collection}.jsonl` with
//! `serde_jsonlines::append_json_lines`. Appends are serialized through a
//! mutex so concurrent inserts never interleave partial lines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chg_core::AuditRecord;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::{ChangeStore, validate_collection};

/// Appends change records to a JSONL file.
pub struct JsonlChangeStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlChangeStore {
    /// Create a store writing to `{dir}/{collection}.jsonl`.
    ///
    /// Creates the directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the collection name is invalid or the directory
    /// cannot be created.
    pub fn new(dir: impl Into<PathBuf>, collection: &str) -> Result<Self, StoreError> {
        validate_collection(collection)?;
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join(format!("{collection}.jsonl")),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The file receiving records.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record from the file, oldest first.
    ///
    /// A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read or a line is not a
    /// valid record.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let records = serde_jsonlines::json_lines::<AuditRecord, _>(&self.path)?
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(records)
    }
}

#[async_trait]
impl ChangeStore for JsonlChangeStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || serde_jsonlines::append_json_lines(&path, [record]))
            .await
            .map_err(|e| StoreError::Insert(format!("append task failed: {e}")))??;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chg_core::factory::build_record;
    use chg_core::{Attribution, MutationKind};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let store = JsonlChangeStore::new(dir.path().join("audit"), "changes").unwrap();
        let attribution = Attribution::new("alice");

        let first = build_record(MutationKind::Save, "Order", Some(&attribution), None);
        let second = build_record(MutationKind::Remove, "Order", None, None);
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(store.read_all().unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn concurrent_inserts_keep_lines_intact() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonlChangeStore::new(dir.path(), "changes").unwrap());

        let mut set = tokio::task::JoinSet::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            set.spawn(async move {
                let attribution = Attribution::new(format!("user-{i}"));
                let record = build_record(MutationKind::Save, "Order", Some(&attribution), None);
                store.insert(&record).await.unwrap();
            });
        }
        while let Some(joined) = set.join_next().await {
            joined.unwrap();
        }

        assert_eq!(store.read_all().unwrap().len(), 32);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonlChangeStore::new(dir.path(), "changes").unwrap();
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn rejects_path_like_collection() {
        let dir = TempDir::new().unwrap();
        assert!(JsonlChangeStore::new(dir.path(), "../escape").is_err());
    }
}
