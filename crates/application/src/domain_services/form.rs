use std::sync::Arc;

use serde_json::Value;
use trialdesk_core::{AppResult, DatabaseActionContext};
use trialdesk_domain::{Form, SoftDeletable};

use super::modify;
use crate::persistence_service::AuditedPersistence;

/// Form lookups and mutations.
#[derive(Clone)]
pub struct FormService {
    persistence: Arc<AuditedPersistence>,
}

impl FormService {
    /// Creates the service.
    #[must_use]
    pub fn new(persistence: Arc<AuditedPersistence>) -> Self {
        Self { persistence }
    }

    /// Returns one form.
    pub fn get(&self, pk: i64) -> AppResult<Form> {
        self.persistence.get::<Form>(pk)
    }

    /// Saves a new form.
    pub fn create(&self, mut form: Form, context: &DatabaseActionContext) -> AppResult<Form> {
        self.persistence.save(&mut form, context, None)?;
        Ok(form)
    }

    /// Returns the non-removed forms of an event.
    pub fn for_event(&self, event_pk: i64) -> AppResult<Vec<Form>> {
        self.active_by("event_pk", event_pk)
    }

    /// Returns the non-removed forms of a scope.
    pub fn for_scope(&self, scope_pk: i64) -> AppResult<Vec<Form>> {
        self.active_by("scope_pk", scope_pk)
    }

    /// Replaces the data-entry status.
    pub fn change_status(
        &self,
        pk: i64,
        status: &str,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        modify::<Form>(&self.persistence, pk, context, rationale, |form| {
            form.set_status(status)
        })
    }

    /// Soft-deletes a form.
    pub fn remove(
        &self,
        pk: i64,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        let mut form = self.get(pk)?;
        self.persistence.delete(&mut form, context, rationale)
    }

    /// Restores a soft-deleted form.
    pub fn restore(
        &self,
        pk: i64,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        let mut form = self.get(pk)?;
        self.persistence.restore(&mut form, context, rationale)
    }

    fn active_by(&self, property: &str, pk: i64) -> AppResult<Vec<Form>> {
        Ok(self
            .persistence
            .find_by::<Form>(property, Value::from(pk))?
            .into_iter()
            .filter(|form| !form.is_deleted())
            .collect())
    }
}
