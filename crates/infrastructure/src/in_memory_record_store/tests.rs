use chrono::{TimeZone, Utc};
use serde_json::json;
use trialdesk_application::RecordStore;
use trialdesk_core::{AppError, AuditActionRef, DatabaseActionContext};
use trialdesk_domain::AuditTrail;

use super::InMemoryRecordStore;

fn context() -> DatabaseActionContext {
    DatabaseActionContext::system(AuditActionRef {
        pk: 1,
        date: Utc
            .with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
            .single()
            .unwrap_or_else(|| unreachable!()),
    })
}

#[test]
fn keys_are_allocated_per_table() {
    let store = InMemoryRecordStore::new();

    assert_eq!(store.next_pk("form").ok(), Some(1));
    assert_eq!(store.next_pk("form").ok(), Some(2));
    assert_eq!(store.next_pk("field").ok(), Some(1));
}

#[test]
fn insert_rejects_existing_keys() {
    let store = InMemoryRecordStore::new();
    assert!(store.insert("form", 1, &json!({"pk": 1})).is_ok());

    let result = store.insert("form", 1, &json!({"pk": 1, "status": "OPEN"}));

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(store.fetch("form", 1).ok(), Some(Some(json!({"pk": 1}))));
}

#[test]
fn update_requires_a_stored_record() {
    let store = InMemoryRecordStore::new();

    assert!(matches!(
        store.update("form", 7, &json!({"pk": 7})),
        Err(AppError::NotFound(_))
    ));

    assert!(store.insert("form", 7, &json!({"pk": 7})).is_ok());
    assert!(store.update("form", 7, &json!({"pk": 7, "status": "CLOSED"})).is_ok());
    assert_eq!(
        store
            .fetch("form", 7)
            .ok()
            .flatten()
            .and_then(|record| record.get("status").cloned()),
        Some(json!("CLOSED"))
    );
}

#[test]
fn find_by_filters_one_table_in_key_order() {
    let store = InMemoryRecordStore::new();
    for (pk, form) in [(3, 10), (1, 10), (2, 11)] {
        assert!(
            store
                .insert("field", pk, &json!({"pk": pk, "form_pk": form}))
                .is_ok()
        );
    }
    assert!(store.insert("event", 4, &json!({"pk": 4, "form_pk": 10})).is_ok());

    let found = store
        .find_by("field", "form_pk", &json!(10))
        .unwrap_or_else(|_| unreachable!());

    let keys: Vec<_> = found.iter().filter_map(|record| record.get("pk")).collect();
    assert_eq!(keys, vec![&json!(1), &json!(3)]);
    assert!(
        store
            .find_by("scope", "form_pk", &json!(10))
            .unwrap_or_else(|_| unreachable!())
            .is_empty()
    );
}

#[test]
fn delete_reports_whether_a_record_existed() {
    let store = InMemoryRecordStore::new();
    assert!(store.insert("workflow_status", 1, &json!({"pk": 1})).is_ok());

    assert_eq!(store.delete("workflow_status", 1).ok(), Some(true));
    assert_eq!(store.delete("workflow_status", 1).ok(), Some(false));
    assert_eq!(store.record_count("workflow_status").ok(), Some(0));
}

#[test]
fn audit_trails_are_keyed_and_listed_per_object() {
    let store = InMemoryRecordStore::new();
    let context = context();

    let first = store
        .append_audit_trail(AuditTrail::record("form", 1, json!({"pk": 1}), &context, None))
        .unwrap_or_else(|_| unreachable!());
    assert!(
        store
            .append_audit_trail(AuditTrail::record("form", 2, json!({"pk": 2}), &context, None))
            .is_ok()
    );
    assert!(
        store
            .append_audit_trail(AuditTrail::record(
                "form",
                1,
                json!({"pk": 1, "deleted": true}),
                &context,
                Some("entered in error"),
            ))
            .is_ok()
    );

    assert_eq!(first.pk(), Some(1));
    assert_eq!(store.audit_trail_count().ok(), Some(3));
    let trails = store
        .list_audit_trails("form", 1)
        .unwrap_or_else(|_| unreachable!());
    let rationales: Vec<_> = trails.iter().map(AuditTrail::rationale).collect();
    assert_eq!(rationales, vec![None, Some("entered in error")]);
}
