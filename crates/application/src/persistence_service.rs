use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use trialdesk_core::{AppError, AppResult, DatabaseActionContext};
use trialdesk_domain::{AuditTrail, HardDeletable, Persistable, SoftDeletable};

use crate::persistence_ports::RecordStore;

mod audit_queries;
mod cache;

pub use cache::TransactionCache;

/// Generic save, soft-delete and restore with audit-trail mirroring.
pub struct AuditedPersistence {
    store: Arc<dyn RecordStore>,
    cache: TransactionCache,
}

impl AuditedPersistence {
    /// Creates the substrate over a record store with an empty cache.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            cache: TransactionCache::new(),
        }
    }

    /// Returns the transaction-scoped record cache.
    #[must_use]
    pub fn cache(&self) -> &TransactionCache {
        &self.cache
    }

    /// Clears the record cache at a unit-of-work boundary.
    pub fn clear_cache(&self) -> AppResult<()> {
        self.cache.clear()
    }

    /// Loads one object.
    pub fn load<T: Persistable>(&self, pk: i64) -> AppResult<Option<T>> {
        self.stored_record(T::TABLE, pk)?
            .map(decode::<T>)
            .transpose()
    }

    /// Loads one object, failing when it does not exist.
    pub fn get<T: Persistable>(&self, pk: i64) -> AppResult<T> {
        self.load::<T>(pk)?
            .ok_or_else(|| AppError::NotFound(format!("{} #{pk}", T::TABLE)))
    }

    /// Loads every object whose `property` equals `value`, ordered by key.
    pub fn find_by<T: Persistable>(&self, property: &str, value: Value) -> AppResult<Vec<T>> {
        let records = self.store.find_by(T::TABLE, property, &value)?;
        let mut objects = Vec::with_capacity(records.len());
        for record in records {
            let object = decode::<T>(record.clone())?;
            if let Some(pk) = object.pk() {
                self.cache.put(T::TABLE, pk, record)?;
            }
            objects.push(object);
        }
        Ok(objects)
    }

    /// Saves an object and returns whether anything was written.
    ///
    /// A field-identical save of a stored object performs no write. Otherwise
    /// the object is stamped with the operation time, inserted or updated, and
    /// mirrored into exactly one audit row when auditable. A stamp earlier than
    /// the stored times fails with an invariant violation before any write.
    pub fn save<T: Persistable>(
        &self,
        object: &mut T,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        object.before_save()?;

        let stored = match object.pk() {
            Some(pk) => self.stored_record(T::TABLE, pk)?,
            None => None,
        };

        if let (Some(pk), Some(stored)) = (object.pk(), stored.as_ref())
            && encode(object)? == *stored
        {
            debug!(table = T::TABLE, pk, "redundant save skipped");
            return Ok(false);
        }

        // The caller's object only changes once the store accepted the write.
        let mut written = object.clone();
        if let Some(timestampable) = written.as_timestampable_mut() {
            timestampable
                .timestamps_mut()
                .stamp(context.operation_time())?;
        }

        let pk = match written.pk() {
            Some(pk) => pk,
            None => {
                let pk = self.store.next_pk(T::TABLE)?;
                written.assign_pk(pk);
                pk
            }
        };

        let record = encode(&written)?;
        if stored.is_some() {
            self.store.update(T::TABLE, pk, &record)?;
        } else {
            self.store.insert(T::TABLE, pk, &record)?;
        }
        *object = written;

        object.after_save()?;
        self.cache.put(T::TABLE, pk, record.clone())?;

        if let Some(auditable) = object.as_auditable() {
            let snapshot = without_properties(record, auditable.unaudited_properties());
            let trail = self.store.append_audit_trail(AuditTrail::record(
                T::TABLE,
                pk,
                snapshot,
                context,
                rationale,
            ))?;
            info!(
                table = T::TABLE,
                pk,
                audit_trail_pk = trail.pk(),
                actor = trail.actor_name(),
                "audited write"
            );
        }

        Ok(true)
    }

    /// Marks a stored object as removed.
    pub fn delete<T: Persistable + SoftDeletable>(
        &self,
        object: &mut T,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        self.toggle_deleted(object, true, context, rationale)
    }

    /// Clears the removed flag of a stored object.
    pub fn restore<T: Persistable + SoftDeletable>(
        &self,
        object: &mut T,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        self.toggle_deleted(object, false, context, rationale)
    }

    /// Physically removes a record without auditing.
    pub fn hard_delete<T: HardDeletable>(&self, object: &T) -> AppResult<bool> {
        let Some(pk) = object.pk() else {
            return Ok(false);
        };

        self.cache.evict(T::TABLE, pk)?;
        let removed = self.store.delete(T::TABLE, pk)?;
        debug!(table = T::TABLE, pk, removed, "hard delete");
        Ok(removed)
    }

    fn toggle_deleted<T: Persistable + SoftDeletable>(
        &self,
        object: &mut T,
        deleted: bool,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        if object.pk().is_none() {
            return Err(AppError::Validation(format!(
                "cannot change the removed flag of an unsaved {} record",
                T::TABLE
            )));
        }

        let previous = object.is_deleted();
        object.set_deleted(deleted);
        let result = self.save(object, context, rationale);
        if result.is_err() {
            object.set_deleted(previous);
        }
        result
    }

    fn stored_record(&self, table: &str, pk: i64) -> AppResult<Option<Value>> {
        if let Some(record) = self.cache.get(table, pk)? {
            return Ok(Some(record));
        }

        let record = self.store.fetch(table, pk)?;
        if let Some(record) = &record {
            self.cache.put(table, pk, record.clone())?;
        }
        Ok(record)
    }
}

fn encode<T: Persistable>(object: &T) -> AppResult<Value> {
    serde_json::to_value(object).map_err(|error| {
        AppError::Internal(format!("failed to encode {} record: {error}", T::TABLE))
    })
}

fn decode<T: Persistable>(record: Value) -> AppResult<T> {
    serde_json::from_value(record).map_err(|error| {
        AppError::Internal(format!("failed to decode {} record: {error}", T::TABLE))
    })
}

fn without_properties(mut record: Value, properties: &[&str]) -> Value {
    if let Value::Object(map) = &mut record {
        for property in properties {
            map.remove(*property);
        }
    }
    record
}

#[cfg(test)]
mod tests;
