use std::sync::Arc;

use serde_json::Value;
use trialdesk_core::{AppResult, DatabaseActionContext};
use trialdesk_domain::{AuditTrail, Field};

use super::modify;
use crate::persistence_service::AuditedPersistence;

/// Field lookups and value capture.
#[derive(Clone)]
pub struct FieldService {
    persistence: Arc<AuditedPersistence>,
}

impl FieldService {
    /// Creates the service.
    #[must_use]
    pub fn new(persistence: Arc<AuditedPersistence>) -> Self {
        Self { persistence }
    }

    /// Returns one field.
    pub fn get(&self, pk: i64) -> AppResult<Field> {
        self.persistence.get::<Field>(pk)
    }

    /// Saves a new field.
    pub fn create(&self, mut field: Field, context: &DatabaseActionContext) -> AppResult<Field> {
        self.persistence.save(&mut field, context, None)?;
        Ok(field)
    }

    /// Returns the fields of a form.
    pub fn for_form(&self, form_pk: i64) -> AppResult<Vec<Field>> {
        self.persistence.find_by::<Field>("form_pk", Value::from(form_pk))
    }

    /// Returns the fields of an event.
    pub fn for_event(&self, event_pk: i64) -> AppResult<Vec<Field>> {
        self.persistence
            .find_by::<Field>("event_pk", Value::from(event_pk))
    }

    /// Returns the fields of a scope.
    pub fn for_scope(&self, scope_pk: i64) -> AppResult<Vec<Field>> {
        self.persistence
            .find_by::<Field>("scope_pk", Value::from(scope_pk))
    }

    /// Returns whether any field of the scope holds a value.
    pub fn scope_contains_data(&self, scope_pk: i64) -> AppResult<bool> {
        Ok(self.for_scope(scope_pk)?.iter().any(Field::has_value))
    }

    /// Returns whether any field of the event holds a value.
    pub fn event_contains_data(&self, event_pk: i64) -> AppResult<bool> {
        Ok(self.for_event(event_pk)?.iter().any(Field::has_value))
    }

    /// Replaces the captured value; `None` resets the field.
    pub fn set_value(
        &self,
        pk: i64,
        value: Option<String>,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        modify::<Field>(&self.persistence, pk, context, rationale, |field| {
            field.set_value(value);
            Ok(())
        })
    }

    /// Returns the audit history of a field, oldest first.
    pub fn audit_trails(&self, pk: i64) -> AppResult<Vec<AuditTrail>> {
        let field = self.get(pk)?;
        self.persistence.audit_trails(&field, None, None)
    }
}
