use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trialdesk_core::{AppResult, NonEmptyString};

use crate::{
    Auditable, Evaluable, Persistable, RulableEntity, SoftDeletable, Timestampable, Timestamps,
};

/// Visit or other timeline event of a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pk: Option<i64>,
    scope_pk: i64,
    event_model_id: NonEmptyString,
    date: Option<DateTime<Utc>>,
    expected_date: Option<DateTime<Utc>>,
    blocked: bool,
    not_done: bool,
    deleted: bool,
    #[serde(flatten)]
    timestamps: Timestamps,
}

impl Event {
    /// Creates an unsaved event.
    pub fn new(scope_pk: i64, event_model_id: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            pk: None,
            scope_pk,
            event_model_id: NonEmptyString::new(event_model_id)?,
            date: None,
            expected_date: None,
            blocked: false,
            not_done: false,
            deleted: false,
            timestamps: Timestamps::default(),
        })
    }

    /// Returns the owning scope key.
    #[must_use]
    pub fn scope_pk(&self) -> i64 {
        self.scope_pk
    }

    /// Returns the event model id.
    #[must_use]
    pub fn event_model_id(&self) -> &NonEmptyString {
        &self.event_model_id
    }

    /// Returns the actual date.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    /// Sets the actual date.
    pub fn set_date(&mut self, date: Option<DateTime<Utc>>) {
        self.date = date;
    }

    /// Returns the planned date.
    #[must_use]
    pub fn expected_date(&self) -> Option<DateTime<Utc>> {
        self.expected_date
    }

    /// Sets the planned date.
    pub fn set_expected_date(&mut self, expected_date: Option<DateTime<Utc>>) {
        self.expected_date = expected_date;
    }

    /// Returns the actual date, falling back to the planned one.
    #[must_use]
    pub fn date_or_expected_date(&self) -> Option<DateTime<Utc>> {
        self.date.or(self.expected_date)
    }

    /// Returns whether data entry is blocked.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Sets the blocking flag.
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Returns whether the event was marked as not done.
    #[must_use]
    pub fn is_not_done(&self) -> bool {
        self.not_done
    }

    /// Sets the not-done flag.
    pub fn set_not_done(&mut self, not_done: bool) {
        self.not_done = not_done;
    }

    /// Returns the creation time once saved.
    #[must_use]
    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.timestamps.creation_time()
    }

    /// Returns the rule evaluation identity once saved.
    #[must_use]
    pub fn evaluable(&self) -> Option<Evaluable> {
        self.pk.map(|pk| Evaluable::new(RulableEntity::Event, pk))
    }
}

impl Persistable for Event {
    const TABLE: &'static str = "event";

    fn pk(&self) -> Option<i64> {
        self.pk
    }

    fn assign_pk(&mut self, pk: i64) {
        self.pk = Some(pk);
    }

    fn as_timestampable_mut(&mut self) -> Option<&mut dyn Timestampable> {
        Some(self)
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        Some(self)
    }
}

impl Timestampable for Event {
    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }
}

impl Auditable for Event {}

impl SoftDeletable for Event {
    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}
