use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use trialdesk_core::{AppResult, NonEmptyString};

use crate::{
    Auditable, Evaluable, LITERAL_DATE_FORMAT, Persistable, RulableEntity, Timestampable,
    Timestamps,
};

/// Single captured value of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pk: Option<i64>,
    scope_pk: i64,
    event_pk: Option<i64>,
    form_pk: Option<i64>,
    field_model_id: NonEmptyString,
    value: Option<String>,
    #[serde(flatten)]
    timestamps: Timestamps,
}

impl Field {
    /// Creates an unsaved empty field.
    pub fn new(
        scope_pk: i64,
        event_pk: Option<i64>,
        form_pk: Option<i64>,
        field_model_id: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            pk: None,
            scope_pk,
            event_pk,
            form_pk,
            field_model_id: NonEmptyString::new(field_model_id)?,
            value: None,
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

    /// Returns the owning form key.
    #[must_use]
    pub fn form_pk(&self) -> Option<i64> {
        self.form_pk
    }

    /// Returns the field model id.
    #[must_use]
    pub fn field_model_id(&self) -> &NonEmptyString {
        &self.field_model_id
    }

    /// Returns the captured text.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Replaces the captured text.
    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    /// Returns the captured text parsed as a number.
    #[must_use]
    pub fn value_as_number(&self) -> Option<f64> {
        self.value.as_deref()?.trim().parse().ok()
    }

    /// Returns the captured text parsed as a `dd.MM.yyyy` date at midnight UTC.
    #[must_use]
    pub fn value_as_date(&self) -> Option<DateTime<Utc>> {
        NaiveDate::parse_from_str(self.value.as_deref()?.trim(), LITERAL_DATE_FORMAT)
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
    }

    /// Returns the time of the last change.
    #[must_use]
    pub fn modification_time(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last_update_time()
    }

    /// Returns whether a non-blank value was captured.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|value| !value.trim().is_empty())
    }

    /// Returns the rule evaluation identity once saved.
    #[must_use]
    pub fn evaluable(&self) -> Option<Evaluable> {
        self.pk.map(|pk| Evaluable::new(RulableEntity::Field, pk))
    }
}

impl Persistable for Field {
    const TABLE: &'static str = "field";

    fn pk(&self) -> Option<i64> {
        self.pk
    }

    fn assign_pk(&mut self, pk: i64) {
        self.pk = Some(pk);
    }

    fn before_save(&mut self) -> AppResult<()> {
        if !self.has_value() {
            self.value = None;
        }
        Ok(())
    }

    fn as_timestampable_mut(&mut self) -> Option<&mut dyn Timestampable> {
        Some(self)
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        Some(self)
    }
}

impl Timestampable for Field {
    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }
}

impl Auditable for Field {}
