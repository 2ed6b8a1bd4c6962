use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use trialdesk_core::{AppError, AppResult};

/// Request-scoped copy of stored records used for redundant-save detection.
///
/// Entries reflect what the current unit of work read or wrote. The host clears
/// the cache at every transaction boundary.
#[derive(Debug, Default)]
pub struct TransactionCache {
    records: Mutex<HashMap<(String, i64), Value>>,
}

impl TransactionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached record of one object.
    pub fn get(&self, table: &str, pk: i64) -> AppResult<Option<Value>> {
        Ok(self.lock()?.get(&(table.to_owned(), pk)).cloned())
    }

    /// Stores the current record of one object.
    pub fn put(&self, table: &str, pk: i64, record: Value) -> AppResult<()> {
        self.lock()?.insert((table.to_owned(), pk), record);
        Ok(())
    }

    /// Drops the cached record of one object.
    pub fn evict(&self, table: &str, pk: i64) -> AppResult<()> {
        self.lock()?.remove(&(table.to_owned(), pk));
        Ok(())
    }

    /// Drops every cached record.
    pub fn clear(&self) -> AppResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    /// Returns the number of cached records.
    pub fn len(&self) -> AppResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns whether nothing is cached.
    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, HashMap<(String, i64), Value>>> {
        self.records
            .lock()
            .map_err(|_| AppError::Internal("transaction cache lock poisoned".to_owned()))
    }
}
