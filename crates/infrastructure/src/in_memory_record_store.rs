use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::trace;
use trialdesk_application::RecordStore;
use trialdesk_core::{AppError, AppResult};
use trialdesk_domain::AuditTrail;

type Tables = HashMap<String, BTreeMap<i64, Value>>;

/// In-memory record store implementation.
///
/// Tables keep their records ordered by primary key, so `find_by` returns
/// them in key order like an indexed query would.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<Tables>,
    sequences: RwLock<HashMap<String, i64>>,
    audit_trails: RwLock<Vec<AuditTrail>>,
}

impl InMemoryRecordStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records stored in a table.
    pub fn record_count(&self, table: &str) -> AppResult<usize> {
        Ok(self.read_tables()?.get(table).map_or(0, BTreeMap::len))
    }

    /// Returns the number of audit rows across all tables.
    pub fn audit_trail_count(&self) -> AppResult<usize> {
        Ok(read(&self.audit_trails)?.len())
    }

    fn read_tables(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        read(&self.tables)
    }

    fn write_tables(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        write(&self.tables)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn next_pk(&self, table: &str) -> AppResult<i64> {
        let mut sequences = write(&self.sequences)?;
        let next = sequences.entry(table.to_owned()).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    fn insert(&self, table: &str, pk: i64, record: &Value) -> AppResult<()> {
        let mut tables = self.write_tables()?;
        let rows = tables.entry(table.to_owned()).or_default();
        if rows.contains_key(&pk) {
            return Err(AppError::Conflict(format!(
                "record {table} #{pk} already exists"
            )));
        }

        rows.insert(pk, record.clone());
        trace!(table, pk, "record inserted");
        Ok(())
    }

    fn update(&self, table: &str, pk: i64, record: &Value) -> AppResult<()> {
        let mut tables = self.write_tables()?;
        let stored = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&pk))
            .ok_or_else(|| AppError::NotFound(format!("record {table} #{pk} does not exist")))?;

        *stored = record.clone();
        trace!(table, pk, "record updated");
        Ok(())
    }

    fn fetch(&self, table: &str, pk: i64) -> AppResult<Option<Value>> {
        Ok(self
            .read_tables()?
            .get(table)
            .and_then(|rows| rows.get(&pk))
            .cloned())
    }

    fn find_by(&self, table: &str, property: &str, value: &Value) -> AppResult<Vec<Value>> {
        let tables = self.read_tables()?;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };

        Ok(rows
            .values()
            .filter(|record| record.get(property) == Some(value))
            .cloned()
            .collect())
    }

    fn delete(&self, table: &str, pk: i64) -> AppResult<bool> {
        let removed = self
            .write_tables()?
            .get_mut(table)
            .and_then(|rows| rows.remove(&pk))
            .is_some();
        trace!(table, pk, removed, "record deleted");
        Ok(removed)
    }

    fn append_audit_trail(&self, trail: AuditTrail) -> AppResult<AuditTrail> {
        let mut trails = write(&self.audit_trails)?;
        let pk = i64::try_from(trails.len())
            .map_err(|_| AppError::Internal("audit trail key overflow".to_owned()))?
            + 1;
        let trail = trail.with_pk(pk);
        trails.push(trail.clone());
        Ok(trail)
    }

    fn list_audit_trails(&self, table: &str, object_pk: i64) -> AppResult<Vec<AuditTrail>> {
        Ok(read(&self.audit_trails)?
            .iter()
            .filter(|trail| trail.table() == table && trail.object_pk() == object_pk)
            .cloned()
            .collect())
    }
}

fn read<T>(lock: &RwLock<T>) -> AppResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| AppError::Internal("record store lock poisoned".to_owned()))
}

fn write<T>(lock: &RwLock<T>) -> AppResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| AppError::Internal("record store lock poisoned".to_owned()))
}

#[cfg(test)]
mod tests;
