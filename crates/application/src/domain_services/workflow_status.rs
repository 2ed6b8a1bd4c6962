use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use trialdesk_core::{AppError, AppResult, DatabaseActionContext};
use trialdesk_domain::{
    AuditTrail, Evaluable, RulableEntity, RuleCatalog, WorkflowAnchor, WorkflowStatus,
};

use crate::persistence_service::AuditedPersistence;

/// Workflow status lookups and transitions validated against the catalog.
#[derive(Clone)]
pub struct WorkflowStatusService {
    persistence: Arc<AuditedPersistence>,
    catalog: Arc<RuleCatalog>,
}

impl WorkflowStatusService {
    /// Creates the service.
    #[must_use]
    pub fn new(persistence: Arc<AuditedPersistence>, catalog: Arc<RuleCatalog>) -> Self {
        Self {
            persistence,
            catalog,
        }
    }

    /// Returns one workflow status.
    pub fn get(&self, pk: i64) -> AppResult<WorkflowStatus> {
        self.persistence.get::<WorkflowStatus>(pk)
    }

    /// Returns the statuses attached directly to an object.
    pub fn for_owner(&self, owner: Evaluable) -> AppResult<Vec<WorkflowStatus>> {
        let property = match owner.entity() {
            RulableEntity::Scope => "scope_pk",
            RulableEntity::Event => "event_pk",
            RulableEntity::Form => "form_pk",
            RulableEntity::Field => "field_pk",
            RulableEntity::Workflow => return Ok(Vec::new()),
        };

        Ok(self
            .persistence
            .find_by::<WorkflowStatus>(property, Value::from(owner.pk()))?
            .into_iter()
            .filter(|status| status.anchor().owner() == owner)
            .collect())
    }

    /// Starts a workflow in its initial state unless the owner already has it.
    pub fn initialize(
        &self,
        anchor: WorkflowAnchor,
        workflow_id: &str,
        action_id: Option<String>,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<Evaluable> {
        if let Some(existing) = self
            .for_owner(anchor.owner())?
            .into_iter()
            .find(|status| status.workflow_id().as_str() == workflow_id)
            .and_then(|status| status.evaluable())
        {
            debug!(workflow_id, owner = %anchor.owner(), "workflow already initialized");
            return Ok(existing);
        }

        let workflow = self.catalog.workflow(workflow_id)?;
        let initial_state = workflow.initial_state().ok_or_else(|| {
            AppError::Validation(format!("workflow '{workflow_id}' has no initial state"))
        })?;

        let mut status =
            WorkflowStatus::new(anchor, workflow_id, initial_state.as_str(), action_id)?;
        self.persistence.save(&mut status, context, rationale)?;
        status
            .evaluable()
            .ok_or_else(|| AppError::Internal("saved workflow status has no key".to_owned()))
    }

    /// Moves a status to another state declared by its workflow.
    pub fn change_status(
        &self,
        pk: i64,
        state_id: &str,
        action_id: Option<String>,
        validator_id: Option<String>,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        let mut status = self.get(pk)?;
        let workflow = self.catalog.workflow(status.workflow_id().as_str())?;
        if !workflow.has_state(state_id) {
            return Err(AppError::Validation(format!(
                "workflow '{}' has no state '{state_id}'",
                workflow.id()
            )));
        }

        status.transition(state_id, action_id)?;
        if validator_id.is_some() {
            status.set_validator_id(validator_id);
        }
        self.persistence.save(&mut status, context, rationale)
    }

    /// Physically removes the statuses of an owner, optionally only one workflow.
    pub fn delete_for_owner(&self, owner: Evaluable, workflow_id: Option<&str>) -> AppResult<usize> {
        let mut removed = 0;
        for status in self.for_owner(owner)? {
            if workflow_id.is_some_and(|workflow_id| status.workflow_id().as_str() != workflow_id) {
                continue;
            }
            if self.persistence.hard_delete(&status)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Returns the audit history of a status ordered by datetime.
    pub fn audit_trails(&self, pk: i64) -> AppResult<Vec<AuditTrail>> {
        let status = self.get(pk)?;
        self.persistence.audit_trails(&status, None, None)
    }
}
