use serde::{Deserialize, Serialize};
use trialdesk_core::{AppResult, NonEmptyString};

use crate::{
    Auditable, Evaluable, Persistable, RulableEntity, SoftDeletable, Timestampable, Timestamps,
};

/// Data-entry form of a scope, optionally bound to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pk: Option<i64>,
    scope_pk: i64,
    event_pk: Option<i64>,
    form_model_id: NonEmptyString,
    status: NonEmptyString,
    deleted: bool,
    #[serde(flatten)]
    timestamps: Timestamps,
}

impl Form {
    /// Creates an unsaved form.
    pub fn new(
        scope_pk: i64,
        event_pk: Option<i64>,
        form_model_id: impl Into<String>,
        status: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            pk: None,
            scope_pk,
            event_pk,
            form_model_id: NonEmptyString::new(form_model_id)?,
            status: NonEmptyString::new(status)?,
            deleted: false,
            timestamps: Timestamps::default(),
        })
    }

    /// Returns the owning scope key.
    #[must_use]
    pub fn scope_pk(&self) -> i64 {
        self.scope_pk
    }

    /// Returns the owning event key.
    #[must_use]
    pub fn event_pk(&self) -> Option<i64> {
        self.event_pk
    }

    /// Returns the form model id.
    #[must_use]
    pub fn form_model_id(&self) -> &NonEmptyString {
        &self.form_model_id
    }

    /// Returns the data-entry status.
    #[must_use]
    pub fn status(&self) -> &NonEmptyString {
        &self.status
    }

    /// Replaces the data-entry status.
    pub fn set_status(&mut self, status: impl Into<String>) -> AppResult<()> {
        self.status = NonEmptyString::new(status)?;
        Ok(())
    }

    /// Returns the rule evaluation identity once saved.
    #[must_use]
    pub fn evaluable(&self) -> Option<Evaluable> {
        self.pk.map(|pk| Evaluable::new(RulableEntity::Form, pk))
    }
}

impl Persistable for Form {
    const TABLE: &'static str = "form";

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

impl Timestampable for Form {
    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }
}

impl Auditable for Form {}

impl SoftDeletable for Form {
    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}
