//! Connector integration tests: connection string in, working store out.

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use chg_core::factory::build_record;
use chg_core::merge::merge_attribution;
use chg_core::{Attribution, MutationKind, QueryExtra};
use chg_store::jsonl_store::JsonlChangeStore;
use chg_store::libsql_store::LibSqlChangeStore;
use chg_store::{DefaultConnector, StoreConnector, StoreError};

fn update_record(actor: &str) -> (Attribution, chg_core::AuditRecord) {
    let attribution = Attribution::new(actor);
    let mut update = json!({"$set": {"status": "closed"}});
    merge_attribution(&mut update, &attribution);
    let extra = QueryExtra::capture(&json!({"status": "open"}), Some(&update)).unwrap();
    let record = build_record(
        MutationKind::UpdateMany,
        "Ticket",
        Some(&attribution),
        Some(extra),
    );
    (attribution, record)
}

#[tokio::test]
async fn file_connection_string_persists_to_libsql() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("changes.db");
    let conn = format!("file:{}", db_path.display());

    let (attribution, record) = update_record("alice");
    let store = DefaultConnector::new()
        .connect(&conn, "ticket_changes")
        .await
        .unwrap();
    store.insert(&record).await.unwrap();
    drop(store);

    let reopened = LibSqlChangeStore::open_local(db_path.to_str().unwrap(), "ticket_changes")
        .await
        .unwrap();
    let found = reopened
        .find_by_correlation(&attribution.correlation_id.to_hex())
        .await
        .unwrap();
    assert_eq!(found, vec![record]);
}

#[tokio::test]
async fn jsonl_connection_string_appends_lines() {
    let dir = TempDir::new().unwrap();
    let conn = format!("jsonl://{}", dir.path().display());

    let store = DefaultConnector::new().connect(&conn, "changes").await.unwrap();
    let (_, first) = update_record("alice");
    let (_, second) = update_record("bob");
    store.insert(&first).await.unwrap();
    store.insert(&second).await.unwrap();

    let reader = JsonlChangeStore::new(dir.path(), "changes").unwrap();
    let actors: Vec<_> = reader
        .read_all()
        .unwrap()
        .iter()
        .map(|r| r.actor().unwrap().to_string())
        .collect();
    assert_eq!(actors, vec!["alice", "bob"]);
}

#[tokio::test]
async fn empty_connection_string_is_configuration_error() {
    let result = DefaultConnector::new().connect("", "changes").await;
    assert!(matches!(result, Err(StoreError::Configuration(_))));
}

#[tokio::test]
async fn invalid_collection_is_configuration_error() {
    let result = DefaultConnector::new().connect(":memory:", "drop table").await;
    assert!(matches!(result, Err(StoreError::Configuration(_))));
}
