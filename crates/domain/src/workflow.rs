use serde::{Deserialize, Serialize};
use trialdesk_core::{AppResult, NonEmptyString};

use crate::{
    Auditable, Evaluable, HardDeletable, Persistable, RulableEntity, Timestampable, Timestamps,
};

/// Object a workflow status is attached to.
///
/// The most specific key present identifies the owner; the broader keys are
/// denormalized for traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowAnchor {
    /// Owning scope key.
    pub scope_pk: i64,
    /// Owning event key.
    pub event_pk: Option<i64>,
    /// Owning form key.
    pub form_pk: Option<i64>,
    /// Owning field key.
    pub field_pk: Option<i64>,
}

impl WorkflowAnchor {
    /// Returns the evaluable owning the status.
    #[must_use]
    pub fn owner(&self) -> Evaluable {
        if let Some(pk) = self.field_pk {
            Evaluable::new(RulableEntity::Field, pk)
        } else if let Some(pk) = self.form_pk {
            Evaluable::new(RulableEntity::Form, pk)
        } else if let Some(pk) = self.event_pk {
            Evaluable::new(RulableEntity::Event, pk)
        } else {
            Evaluable::new(RulableEntity::Scope, self.scope_pk)
        }
    }
}

/// Current state of one workflow on one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pk: Option<i64>,
    #[serde(flatten)]
    anchor: WorkflowAnchor,
    workflow_id: NonEmptyString,
    state_id: NonEmptyString,
    creation_action_id: Option<String>,
    action_id: Option<String>,
    validator_id: Option<String>,
    #[serde(flatten)]
    timestamps: Timestamps,
}

impl WorkflowStatus {
    /// Creates an unsaved status in the given state.
    pub fn new(
        anchor: WorkflowAnchor,
        workflow_id: impl Into<String>,
        state_id: impl Into<String>,
        creation_action_id: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            pk: None,
            anchor,
            workflow_id: NonEmptyString::new(workflow_id)?,
            state_id: NonEmptyString::new(state_id)?,
            action_id: creation_action_id.clone(),
            creation_action_id,
            validator_id: None,
            timestamps: Timestamps::default(),
        })
    }

    /// Returns the owning object keys.
    #[must_use]
    pub fn anchor(&self) -> &WorkflowAnchor {
        &self.anchor
    }

    /// Returns the workflow model id.
    #[must_use]
    pub fn workflow_id(&self) -> &NonEmptyString {
        &self.workflow_id
    }

    /// Returns the current state id.
    #[must_use]
    pub fn state_id(&self) -> &NonEmptyString {
        &self.state_id
    }

    /// Moves to another state through a workflow action.
    pub fn transition(
        &mut self,
        state_id: impl Into<String>,
        action_id: Option<String>,
    ) -> AppResult<()> {
        self.state_id = NonEmptyString::new(state_id)?;
        self.action_id = action_id;
        Ok(())
    }

    /// Returns the action that created the status.
    #[must_use]
    pub fn creation_action_id(&self) -> Option<&str> {
        self.creation_action_id.as_deref()
    }

    /// Returns the action that led to the current state.
    #[must_use]
    pub fn action_id(&self) -> Option<&str> {
        self.action_id.as_deref()
    }

    /// Returns the validator recorded on the last transition.
    #[must_use]
    pub fn validator_id(&self) -> Option<&str> {
        self.validator_id.as_deref()
    }

    /// Sets the validator.
    pub fn set_validator_id(&mut self, validator_id: Option<String>) {
        self.validator_id = validator_id;
    }

    /// Returns the rule evaluation identity once saved.
    #[must_use]
    pub fn evaluable(&self) -> Option<Evaluable> {
        self.pk.map(|pk| Evaluable::new(RulableEntity::Workflow, pk))
    }
}

impl Persistable for WorkflowStatus {
    const TABLE: &'static str = "workflow_status";

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

impl Timestampable for WorkflowStatus {
    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }
}

impl Auditable for WorkflowStatus {}

impl HardDeletable for WorkflowStatus {}
