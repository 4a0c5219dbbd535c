//! Wire-shape tests for change records as stored in the change collection.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use chg_core::factory::build_record_at;
use chg_core::merge::merge_attribution;
use chg_core::{Attribution, AuditRecord, MutationKind, QueryExtra};

#[test]
fn query_record_uses_camel_case_keys() {
    let attribution = Attribution::new("alice");
    let mut update = json!({"$set": {"status": "closed"}});
    merge_attribution(&mut update, &attribution);

    let extra = QueryExtra::capture(&json!({"status": "open"}), Some(&update)).unwrap();
    let when = Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap();
    let record = build_record_at(
        MutationKind::UpdateMany,
        "Ticket",
        Some(&attribution),
        Some(extra),
        when,
    );

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["id"], json!(attribution.correlation_id.to_hex()));
    assert_eq!(value["action"], json!("updateMany"));
    assert_eq!(value["actor"], json!("alice"));
    assert_eq!(value["modelName"], json!("Ticket"));
    assert_eq!(value["occurredAt"], json!("2026-05-04T09:30:00Z"));
    assert!(value["capturePoint"].as_str().unwrap().contains("record_json.rs"));

    let conditions: serde_json::Value =
        serde_json::from_str(value["extra"]["conditions"].as_str().unwrap()).unwrap();
    assert_eq!(conditions, json!({"status": "open"}));

    let stored_update: serde_json::Value =
        serde_json::from_str(value["extra"]["update"].as_str().unwrap()).unwrap();
    assert_eq!(stored_update["$set"]["status"], json!("closed"));
    assert_eq!(stored_update["$set"]["__actor"], json!("alice"));
}

#[test]
fn unattributed_document_record_omits_absent_fields() {
    let when = Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap();
    let record = build_record_at(MutationKind::Save, "Order", None, None, when);

    let value = serde_json::to_value(&record).unwrap();
    let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["action", "modelName", "occurredAt"]);
}

#[test]
fn stored_json_reads_back() {
    let attribution = Attribution::new(json!({"user": "bob", "via": "batch"}));
    let record = build_record_at(
        MutationKind::DeleteMany,
        "Ticket",
        Some(&attribution),
        Some(QueryExtra::capture(&json!({"archived": true}), None).unwrap()),
        Utc::now(),
    );

    let back: AuditRecord = serde_json::from_str(&record.to_json()).unwrap();
    assert_eq!(back, record);
    assert!(back.extra().unwrap().update.is_none());
}
