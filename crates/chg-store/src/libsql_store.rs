//! libSQL-backed change collection.
//!
//! Each record becomes one row. The full JSON form is kept in `record` so the
//! collection can be read back without loss; the other columns exist for
//! filtering by correlation id, model, and time.

use async_trait::async_trait;
use chg_core::AuditRecord;
use libsql::Builder;

use crate::error::StoreError;
use crate::{ChangeStore, migrations, validate_collection};

/// Appends change records to a libSQL table.
pub struct LibSqlChangeStore {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    collection: String,
    insert_sql: String,
}

impl LibSqlChangeStore {
    /// Open a local database file (or `":memory:"`) and prepare `collection`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the collection name is invalid, the file cannot
    /// be opened, or the schema cannot be created.
    pub async fn open_local(path: &str, collection: &str) -> Result<Self, StoreError> {
        validate_collection(collection)?;
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connect(format!("{path}: {e}")))?;
        Self::from_database(db, collection).await
    }

    /// Open a remote libSQL database and prepare `collection`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the collection name is invalid, the server
    /// cannot be reached, or the schema cannot be created.
    pub async fn open_remote(
        url: &str,
        auth_token: &str,
        collection: &str,
    ) -> Result<Self, StoreError> {
        validate_collection(collection)?;
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| StoreError::Connect(format!("{url}: {e}")))?;
        Self::from_database(db, collection).await
    }

    async fn from_database(db: libsql::Database, collection: &str) -> Result<Self, StoreError> {
        let conn = db.connect()?;
        migrations::run(&conn, collection).await?;
        let insert_sql = format!(
            "INSERT INTO {collection} (id, action, actor, model_name, capture_point, occurred_at, conditions, updates, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        Ok(Self {
            db,
            conn,
            collection: collection.to_string(),
            insert_sql,
        })
    }

    /// Name of the table receiving records.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of records in the collection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {}", self.collection), ())
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::Insert("COUNT(*) returned no row".into()))?;
        let count = row.get::<i64>(0)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Records for one correlation id, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails or a stored row is not a valid
    /// record.
    pub async fn find_by_correlation(&self, id: &str) -> Result<Vec<AuditRecord>, StoreError> {
        let sql = format!(
            "SELECT record FROM {} WHERE id = ?1 ORDER BY seq",
            self.collection
        );
        let rows = self.conn.query(&sql, [id]).await?;
        collect_records(rows).await
    }

    /// The most recent records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails or a stored row is not a valid
    /// record.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AuditRecord>, StoreError> {
        let sql = format!(
            "SELECT record FROM {} ORDER BY seq DESC LIMIT ?1",
            self.collection
        );
        let rows = self.conn.query(&sql, libsql::params![limit]).await?;
        collect_records(rows).await
    }
}

async fn collect_records(mut rows: libsql::Rows) -> Result<Vec<AuditRecord>, StoreError> {
    let mut records = Vec::new();
    while let Some(row) = rows.next().await? {
        let json = row.get::<String>(0)?;
        records.push(serde_json::from_str(&json)?);
    }
    Ok(records)
}

#[async_trait]
impl ChangeStore for LibSqlChangeStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let id = record.id().map(|id| id.to_hex());
        let actor = record
            .actor()
            .map(|actor| serde_json::to_string(actor.as_value()))
            .transpose()?;
        let extra = record.extra();
        let json = serde_json::to_string(record)?;

        self.conn
            .execute(
                &self.insert_sql,
                libsql::params![
                    id.as_deref(),
                    record.action().as_str(),
                    actor.as_deref(),
                    record.model_name(),
                    record.capture_point(),
                    record.occurred_at().to_rfc3339(),
                    extra.map(|e| e.conditions.as_str()),
                    extra.and_then(|e| e.update.as_deref()),
                    json.as_str()
                ],
            )
            .await
            .map_err(|e| StoreError::Insert(format!("{}: {e}", self.collection)))?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "libsql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chg_core::factory::build_record;
    use chg_core::{Attribution, MutationKind, QueryExtra};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn memory_store() -> LibSqlChangeStore {
        LibSqlChangeStore::open_local(":memory:", "changes")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let store = memory_store().await;
        let attribution = Attribution::new("alice");
        let record = build_record(
            MutationKind::UpdateOne,
            "Ticket",
            Some(&attribution),
            Some(QueryExtra::capture(&json!({"_id": 7}), Some(&json!({"$set": {"x": 1}}))).unwrap()),
        );

        store.insert(&record).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let found = store
            .find_by_correlation(&attribution.correlation_id.to_hex())
            .await
            .unwrap();
        assert_eq!(found, vec![record]);
    }

    #[tokio::test]
    async fn unattributed_records_are_stored() {
        let store = memory_store().await;
        store
            .insert(&build_record(MutationKind::Save, "Order", None, None))
            .await
            .unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert!(recent[0].actor().is_none());
    }

    #[tokio::test]
    async fn recent_is_newest_first() {
        let store = memory_store().await;
        for kind in [MutationKind::Create, MutationKind::Save, MutationKind::Remove] {
            store
                .insert(&build_record(kind, "Order", None, None))
                .await
                .unwrap();
        }

        let actions: Vec<_> = store
            .recent(2)
            .await
            .unwrap()
            .iter()
            .map(AuditRecord::action)
            .collect();
        assert_eq!(actions, vec![MutationKind::Remove, MutationKind::Save]);
    }

    #[tokio::test]
    async fn reopening_existing_collection_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("changes.db");
        let path = path.to_str().unwrap();

        let first = LibSqlChangeStore::open_local(path, "changes").await.unwrap();
        first
            .insert(&build_record(MutationKind::Create, "Order", None, None))
            .await
            .unwrap();
        drop(first);

        let second = LibSqlChangeStore::open_local(path, "changes").await.unwrap();
        assert_eq!(second.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_collection_is_rejected_before_connecting() {
        let result = LibSqlChangeStore::open_local(":memory:", "bad name").await;
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }
}
