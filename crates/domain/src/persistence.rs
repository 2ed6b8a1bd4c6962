use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use trialdesk_core::{AppError, AppResult};

/// Creation and last-update times of a timestampable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timestamps {
    creation_time: Option<DateTime<Utc>>,
    last_update_time: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Returns the creation time.
    #[must_use]
    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_time
    }

    /// Returns the last update time.
    #[must_use]
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.last_update_time
    }

    /// Checks that a write at `operation_time` keeps the times monotonic.
    pub fn check(&self, operation_time: DateTime<Utc>) -> AppResult<()> {
        for (label, existing) in [
            ("creation time", self.creation_time),
            ("last update time", self.last_update_time),
        ] {
            if let Some(existing) = existing
                && operation_time < existing
            {
                return Err(AppError::InvariantViolation(format!(
                    "operation time {operation_time} precedes {label} {existing}"
                )));
            }
        }

        Ok(())
    }

    /// Stamps a write at `operation_time`, setting the creation time on first write.
    ///
    /// Leaves the times untouched when the check fails.
    pub fn stamp(&mut self, operation_time: DateTime<Utc>) -> AppResult<()> {
        self.check(operation_time)?;
        if self.creation_time.is_none() {
            self.creation_time = Some(operation_time);
        }
        self.last_update_time = Some(operation_time);
        Ok(())
    }
}

/// Object stored as one record of a table.
///
/// Capabilities are discovered through the `as_*` accessors, which entity types
/// override for the capability traits they implement.
pub trait Persistable: Serialize + DeserializeOwned + Clone {
    /// Table the records are stored in.
    const TABLE: &'static str;

    /// Returns the primary key, absent before the first insert.
    fn pk(&self) -> Option<i64>;

    /// Assigns the primary key allocated by the store.
    fn assign_pk(&mut self, pk: i64);

    /// Runs before the record is built and compared.
    fn before_save(&mut self) -> AppResult<()> {
        Ok(())
    }

    /// Runs after the record was written.
    fn after_save(&self) -> AppResult<()> {
        Ok(())
    }

    /// Returns the timestamp capability.
    fn as_timestampable_mut(&mut self) -> Option<&mut dyn Timestampable> {
        None
    }

    /// Returns the audit capability.
    fn as_auditable(&self) -> Option<&dyn Auditable> {
        None
    }
}

/// Object carrying creation and last-update times.
pub trait Timestampable {
    /// Returns the timestamps.
    fn timestamps(&self) -> &Timestamps;

    /// Returns the timestamps for stamping.
    fn timestamps_mut(&mut self) -> &mut Timestamps;
}

/// Object mirrored into the audit trail on every write.
pub trait Auditable {
    /// Record properties left out of audit snapshots.
    fn unaudited_properties(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Object removed by toggling a flag rather than deleting its record.
pub trait SoftDeletable {
    /// Returns whether the object is removed.
    fn is_deleted(&self) -> bool;

    /// Sets the removed flag.
    fn set_deleted(&mut self, deleted: bool);
}

/// Object whose record may be physically removed without auditing.
pub trait HardDeletable: Persistable {}
