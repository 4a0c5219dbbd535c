//! Collection schema setup.
//!
//! Embeds the SQL template at compile time. All statements use
//! `IF NOT EXISTS` so reconnecting to an existing collection is a no-op.

use crate::error::StoreError;

const MIGRATION_001: &str = include_str!("../migrations/001_changes.sql");

/// Render the schema for `collection`. The name must already be validated.
pub(crate) fn changes_schema(collection: &str) -> String {
    MIGRATION_001.replace("{collection}", collection)
}

/// Create the collection table and its indexes.
pub(crate) async fn run(conn: &libsql::Connection, collection: &str) -> Result<(), StoreError> {
    conn.execute_batch(&changes_schema(collection))
        .await
        .map_err(|e| StoreError::Migration(format!("001_changes ({collection}): {e}")))?;
    Ok(())
}
