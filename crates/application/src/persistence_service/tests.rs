use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use trialdesk_core::{AppError, AppResult};
use trialdesk_domain::{
    AuditTrail, Form, Persistable, SoftDeletable, Timeframe, Timestampable, WorkflowAnchor, WorkflowStatus,
};

use crate::persistence_ports::RecordStore;
use crate::test_support::{FakeRecordStore, base_time, context_at};

use super::AuditedPersistence;

fn substrate() -> (Arc<FakeRecordStore>, AuditedPersistence) {
    let store = Arc::new(FakeRecordStore::default());
    let persistence = AuditedPersistence::new(store.clone());
    (store, persistence)
}

fn saved_form(persistence: &AuditedPersistence) -> Form {
    let mut form = Form::new(1, Some(2), "DEMOGRAPHICS", "OPEN").unwrap_or_else(|_| unreachable!());
    let changed = persistence
        .save(&mut form, &context_at(0), Some("created"))
        .unwrap_or_else(|_| unreachable!());
    assert!(changed);
    form
}

#[test]
fn identical_second_save_performs_no_write() {
    let (store, persistence) = substrate();
    let mut form = saved_form(&persistence);

    let changed = persistence
        .save(&mut form, &context_at(5), None)
        .unwrap_or_else(|_| unreachable!());

    assert!(!changed);
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.audit_trail_count(), 1);
}

#[test]
fn redundant_save_is_detected_after_the_cache_was_cleared() {
    let (store, persistence) = substrate();
    let form = saved_form(&persistence);
    assert!(persistence.clear_cache().is_ok());
    assert_eq!(persistence.cache().len().ok(), Some(0));

    let mut reloaded = persistence
        .get::<Form>(form.pk().unwrap_or_default())
        .unwrap_or_else(|_| unreachable!());
    let changed = persistence
        .save(&mut reloaded, &context_at(5), None)
        .unwrap_or_else(|_| unreachable!());

    assert!(!changed);
    assert_eq!(store.write_count(), 1);
}

#[test]
fn genuine_change_is_stamped_and_audited_once() {
    let (store, persistence) = substrate();
    let mut form = saved_form(&persistence);
    assert!(form.set_status("SUBMITTED").is_ok());

    let changed = persistence
        .save(&mut form, &context_at(10), Some("submitted by site"))
        .unwrap_or_else(|_| unreachable!());

    assert!(changed);
    assert_eq!(store.write_count(), 2);
    assert_eq!(store.audit_trail_count(), 2);
    assert_eq!(
        form.timestamps().last_update_time(),
        Some(context_at(10).operation_time())
    );
    assert_eq!(form.timestamps().creation_time(), Some(base_time()));
}

#[test]
fn delete_keeps_the_row_and_restore_reverses_it() {
    let (store, persistence) = substrate();
    let mut form = saved_form(&persistence);
    let pk = form.pk().unwrap_or_default();

    assert!(
        persistence
            .delete(&mut form, &context_at(3), Some("entered in error"))
            .unwrap_or_else(|_| unreachable!())
    );
    let stored = store
        .record(Form::TABLE, pk)
        .unwrap_or_else(|| unreachable!());
    assert_eq!(stored.get("deleted"), Some(&serde_json::Value::Bool(true)));
    assert_eq!(
        form.timestamps().last_update_time(),
        Some(context_at(3).operation_time())
    );

    assert!(
        persistence
            .restore(&mut form, &context_at(4), None)
            .unwrap_or_else(|_| unreachable!())
    );
    assert!(!form.is_deleted());
    assert_eq!(
        form.timestamps().last_update_time(),
        Some(context_at(4).operation_time())
    );
    assert_eq!(store.audit_trail_count(), 3);
}

#[test]
fn earlier_operation_time_is_fatal_and_writes_nothing() {
    let (store, persistence) = substrate();
    let mut form = saved_form(&persistence);
    assert!(form.set_status("SUBMITTED").is_ok());

    let result = persistence.save(&mut form, &context_at(-1), None);

    assert!(matches!(result, Err(AppError::InvariantViolation(_))));
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.audit_trail_count(), 1);
}

#[test]
fn failed_delete_leaves_the_flag_untouched() {
    let (store, persistence) = substrate();
    let mut form = saved_form(&persistence);

    let result = persistence.delete(&mut form, &context_at(-5), None);

    assert!(result.is_err_and(|error| error.is_fatal()));
    assert!(!form.is_deleted());
    assert_eq!(store.write_count(), 1);
}

#[test]
fn deleting_an_unsaved_object_is_rejected() {
    let (_, persistence) = substrate();
    let mut form = Form::new(1, None, "AE", "OPEN").unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        persistence.delete(&mut form, &context_at(0), None),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn hard_delete_bypasses_auditing() {
    let (store, persistence) = substrate();
    let mut status = WorkflowStatus::new(
        WorkflowAnchor {
            scope_pk: 1,
            event_pk: None,
            form_pk: Some(3),
            field_pk: None,
        },
        "REVIEW",
        "OPEN",
        None,
    )
    .unwrap_or_else(|_| unreachable!());
    assert!(persistence.save(&mut status, &context_at(0), None).is_ok());

    let removed = persistence
        .hard_delete(&status)
        .unwrap_or_else(|_| unreachable!());

    assert!(removed);
    assert_eq!(store.audit_trail_count(), 1);
    assert!(
        store
            .record(WorkflowStatus::TABLE, status.pk().unwrap_or_default())
            .is_none()
    );
    assert_eq!(persistence.cache().len().ok(), Some(0));
}

#[test]
fn audit_queries_filter_by_window_actor_and_changed_properties() {
    let (_, persistence) = substrate();
    let mut form = saved_form(&persistence);
    assert!(form.set_status("SUBMITTED").is_ok());
    assert!(persistence.save(&mut form, &context_at(10), None).is_ok());
    assert!(persistence.delete(&mut form, &context_at(20), None).is_ok());

    let all = persistence
        .audit_trails(&form, None, None)
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].rationale(), Some("created"));

    let window = Timeframe {
        from: Some(context_at(5).operation_time()),
        to: Some(context_at(15).operation_time()),
    };
    let windowed = persistence
        .audit_trails(&form, Some(&window), Some("investigator"))
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(windowed.len(), 1);
    assert!(
        persistence
            .audit_trails(&form, None, Some("monitor"))
            .unwrap_or_else(|_| unreachable!())
            .is_empty()
    );

    let status_changes = persistence
        .audit_trails_for_properties(&form, None, &["status"])
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(status_changes.len(), 2);
    assert_eq!(
        status_changes[1].datetime(),
        context_at(10).operation_time()
    );
}

/// Record store whose inserts and updates fail while `rejecting` is set.
#[derive(Default)]
struct RejectingStore {
    inner: FakeRecordStore,
    rejecting: AtomicBool,
}

impl RejectingStore {
    fn check(&self, table: &str) -> AppResult<()> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(AppError::Internal(format!("{table} is read-only")));
        }
        Ok(())
    }
}

impl RecordStore for RejectingStore {
    fn next_pk(&self, table: &str) -> AppResult<i64> {
        self.inner.next_pk(table)
    }

    fn insert(&self, table: &str, pk: i64, record: &Value) -> AppResult<()> {
        self.check(table)?;
        self.inner.insert(table, pk, record)
    }

    fn update(&self, table: &str, pk: i64, record: &Value) -> AppResult<()> {
        self.check(table)?;
        self.inner.update(table, pk, record)
    }

    fn fetch(&self, table: &str, pk: i64) -> AppResult<Option<Value>> {
        self.inner.fetch(table, pk)
    }

    fn find_by(&self, table: &str, property: &str, value: &Value) -> AppResult<Vec<Value>> {
        self.inner.find_by(table, property, value)
    }

    fn delete(&self, table: &str, pk: i64) -> AppResult<bool> {
        self.inner.delete(table, pk)
    }

    fn append_audit_trail(&self, trail: AuditTrail) -> AppResult<AuditTrail> {
        self.inner.append_audit_trail(trail)
    }

    fn list_audit_trails(&self, table: &str, object_pk: i64) -> AppResult<Vec<AuditTrail>> {
        self.inner.list_audit_trails(table, object_pk)
    }
}

#[test]
fn failed_store_write_leaves_the_object_untouched() {
    let store = Arc::new(RejectingStore::default());
    let persistence = AuditedPersistence::new(store.clone());
    store.rejecting.store(true, Ordering::SeqCst);

    let mut fresh = Form::new(1, Some(2), "DEMOGRAPHICS", "OPEN").unwrap_or_else(|_| unreachable!());
    assert!(persistence.save(&mut fresh, &context_at(0), None).is_err());
    assert_eq!(fresh.pk(), None);
    assert_eq!(fresh.timestamps().creation_time(), None);
    assert_eq!(fresh.timestamps().last_update_time(), None);

    store.rejecting.store(false, Ordering::SeqCst);
    let mut form = saved_form(&persistence);
    let saved_update_time = form.timestamps().last_update_time();
    assert!(form.set_status("SUBMITTED").is_ok());
    store.rejecting.store(true, Ordering::SeqCst);

    assert!(persistence.save(&mut form, &context_at(10), None).is_err());
    assert_eq!(form.timestamps().last_update_time(), saved_update_time);
    assert_eq!(store.inner.audit_trail_count(), 1);
}
