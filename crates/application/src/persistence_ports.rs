use serde_json::Value;
use trialdesk_core::AppResult;
use trialdesk_domain::AuditTrail;

/// Relational store port used by the audited persistence substrate.
///
/// Records are JSON objects keyed by table and primary key. Calls are blocking
/// and run inside the caller's ambient transaction.
pub trait RecordStore: Send + Sync {
    /// Allocates the next primary key of a table.
    fn next_pk(&self, table: &str) -> AppResult<i64>;

    /// Inserts a new record.
    fn insert(&self, table: &str, pk: i64, record: &Value) -> AppResult<()>;

    /// Replaces an existing record.
    fn update(&self, table: &str, pk: i64, record: &Value) -> AppResult<()>;

    /// Returns one record.
    fn fetch(&self, table: &str, pk: i64) -> AppResult<Option<Value>>;

    /// Returns records whose `property` equals `value`, ordered by primary key.
    fn find_by(&self, table: &str, property: &str, value: &Value) -> AppResult<Vec<Value>>;

    /// Physically removes a record and returns whether it existed.
    fn delete(&self, table: &str, pk: i64) -> AppResult<bool>;

    /// Appends an audit row and returns it with its allocated key.
    fn append_audit_trail(&self, trail: AuditTrail) -> AppResult<AuditTrail>;

    /// Returns the audit rows of one object in insertion order.
    fn list_audit_trails(&self, table: &str, object_pk: i64) -> AppResult<Vec<AuditTrail>>;
}
