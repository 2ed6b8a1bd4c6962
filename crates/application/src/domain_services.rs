use std::sync::Arc;

use trialdesk_core::{AppError, AppResult, DatabaseActionContext};
use trialdesk_domain::{
    DataState, Evaluable, Persistable, RulableEntity, RuleCatalog, WorkflowAnchor,
};

use crate::persistence_service::AuditedPersistence;

mod event;
mod field;
mod form;
mod scope;
mod workflow_status;

pub use event::EventService;
pub use field::FieldService;
pub use form::FormService;
pub use scope::ScopeService;
pub use workflow_status::WorkflowStatusService;

/// Services owning the rulable entities, shared by plugins and callers.
pub struct DomainServices {
    persistence: Arc<AuditedPersistence>,
    scopes: ScopeService,
    events: EventService,
    forms: FormService,
    fields: FieldService,
    workflows: WorkflowStatusService,
}

impl DomainServices {
    /// Creates every domain service over one persistence substrate.
    #[must_use]
    pub fn new(persistence: Arc<AuditedPersistence>, catalog: Arc<RuleCatalog>) -> Self {
        Self {
            scopes: ScopeService::new(persistence.clone()),
            events: EventService::new(persistence.clone()),
            forms: FormService::new(persistence.clone()),
            fields: FieldService::new(persistence.clone()),
            workflows: WorkflowStatusService::new(persistence.clone(), catalog),
            persistence,
        }
    }

    /// Returns the persistence substrate.
    #[must_use]
    pub fn persistence(&self) -> &AuditedPersistence {
        &self.persistence
    }

    /// Returns the scope service.
    #[must_use]
    pub fn scopes(&self) -> &ScopeService {
        &self.scopes
    }

    /// Returns the event service.
    #[must_use]
    pub fn events(&self) -> &EventService {
        &self.events
    }

    /// Returns the form service.
    #[must_use]
    pub fn forms(&self) -> &FormService {
        &self.forms
    }

    /// Returns the field service.
    #[must_use]
    pub fn fields(&self) -> &FieldService {
        &self.fields
    }

    /// Returns the workflow status service.
    #[must_use]
    pub fn workflows(&self) -> &WorkflowStatusService {
        &self.workflows
    }

    /// Builds the data state of a triggering object.
    ///
    /// The state is anchored at the object and also holds the objects it
    /// belongs to, so rules can address its form, event and scope directly.
    pub fn data_state_for(&self, evaluable: Evaluable) -> AppResult<DataState> {
        let mut state = DataState::new(evaluable);
        let anchor = match evaluable.entity() {
            RulableEntity::Workflow => *self.workflows.get(evaluable.pk())?.anchor(),
            _ => self.anchor_for(evaluable)?,
        };

        state.insert(Evaluable::new(RulableEntity::Scope, anchor.scope_pk));
        for (entity, pk) in [
            (RulableEntity::Event, anchor.event_pk),
            (RulableEntity::Form, anchor.form_pk),
            (RulableEntity::Field, anchor.field_pk),
        ] {
            if let Some(pk) = pk {
                state.insert(Evaluable::new(entity, pk));
            }
        }

        Ok(state)
    }

    /// Returns the keys a workflow status attached to `owner` carries.
    pub fn anchor_for(&self, owner: Evaluable) -> AppResult<WorkflowAnchor> {
        let pk = owner.pk();
        match owner.entity() {
            RulableEntity::Scope => {
                self.scopes.get(pk)?;
                Ok(WorkflowAnchor {
                    scope_pk: pk,
                    event_pk: None,
                    form_pk: None,
                    field_pk: None,
                })
            }
            RulableEntity::Event => Ok(WorkflowAnchor {
                scope_pk: self.events.get(pk)?.scope_pk(),
                event_pk: Some(pk),
                form_pk: None,
                field_pk: None,
            }),
            RulableEntity::Form => {
                let form = self.forms.get(pk)?;
                Ok(WorkflowAnchor {
                    scope_pk: form.scope_pk(),
                    event_pk: form.event_pk(),
                    form_pk: Some(pk),
                    field_pk: None,
                })
            }
            RulableEntity::Field => {
                let field = self.fields.get(pk)?;
                Ok(WorkflowAnchor {
                    scope_pk: field.scope_pk(),
                    event_pk: field.event_pk(),
                    form_pk: field.form_pk(),
                    field_pk: Some(pk),
                })
            }
            RulableEntity::Workflow => Err(AppError::Unsupported(
                "workflow statuses cannot own workflow statuses".to_owned(),
            )),
        }
    }

    /// Starts a workflow on an object unless it already runs there.
    pub fn initialize_workflow(
        &self,
        owner: Evaluable,
        workflow_id: &str,
        action_id: Option<String>,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<Evaluable> {
        let anchor = self.anchor_for(owner)?;
        self.workflows
            .initialize(anchor, workflow_id, action_id, context, rationale)
    }
}

/// Loads one object, applies `change` and saves it.
fn modify<T: Persistable>(
    persistence: &AuditedPersistence,
    pk: i64,
    context: &DatabaseActionContext,
    rationale: Option<&str>,
    change: impl FnOnce(&mut T) -> AppResult<()>,
) -> AppResult<bool> {
    let mut object = persistence.get::<T>(pk)?;
    change(&mut object)?;
    persistence.save(&mut object, context, rationale)
}

#[cfg(test)]
mod tests;
