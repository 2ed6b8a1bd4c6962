use std::sync::Arc;

use trialdesk_core::AppResult;
use trialdesk_domain::{Evaluable, OperandType, OperandValue, RulableEntity};

use super::shared_actions::{ACTION, STATUS, VALIDATOR};
use super::{
    ActionInvocation, EntityAction, EntityAttribute, EntityPluginRegistry, EntityRelation,
    expect_kind,
};
use crate::domain_services::DomainServices;

#[derive(Debug, Clone, Copy)]
enum WorkflowAttribute {
    Id,
    Status,
    CreationAction,
    ValidatorId,
    DateOfFirstStatusAfterInitialization,
    CommentOnLastAuditTrail,
}

impl WorkflowAttribute {
    const ALL: [Self; 6] = [
        Self::Id,
        Self::Status,
        Self::CreationAction,
        Self::ValidatorId,
        Self::DateOfFirstStatusAfterInitialization,
        Self::CommentOnLastAuditTrail,
    ];
}

impl EntityAttribute for WorkflowAttribute {
    fn id(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Status => "STATUS",
            Self::CreationAction => "CREATION_ACTION",
            Self::ValidatorId => "VALIDATOR_ID",
            Self::DateOfFirstStatusAfterInitialization => {
                "DATE_OF_FIRST_STATUS_AFTER_INITIALIZATION"
            }
            Self::CommentOnLastAuditTrail => "COMMENT_ON_LAST_AUDIT_TRAIL",
        }
    }

    fn operand_type(&self) -> OperandType {
        match self {
            Self::Id => OperandType::Number,
            Self::DateOfFirstStatusAfterInitialization => OperandType::Date,
            Self::Status
            | Self::CreationAction
            | Self::ValidatorId
            | Self::CommentOnLastAuditTrail => OperandType::String,
        }
    }

    fn value(&self, services: &DomainServices, evaluable: Evaluable) -> AppResult<OperandValue> {
        let pk = expect_kind(evaluable, RulableEntity::Workflow)?;
        let workflows = services.workflows();
        let value = match self {
            Self::Id => OperandValue::Number(pk as f64),
            Self::Status => OperandValue::String(workflows.get(pk)?.state_id().to_string()),
            Self::CreationAction => {
                OperandValue::from_optional_str(workflows.get(pk)?.creation_action_id())
            }
            Self::ValidatorId => OperandValue::from_optional_str(workflows.get(pk)?.validator_id()),
            // The first row records the initialization itself.
            Self::DateOfFirstStatusAfterInitialization => OperandValue::from_optional_date(
                workflows.audit_trails(pk)?.get(1).map(|trail| trail.datetime()),
            ),
            Self::CommentOnLastAuditTrail => OperandValue::from_optional_str(
                workflows
                    .audit_trails(pk)?
                    .last()
                    .and_then(|trail| trail.rationale()),
            ),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy)]
enum WorkflowRelation {
    Scope,
    Event,
    Form,
    Field,
}

impl EntityRelation for WorkflowRelation {
    fn id(&self) -> &'static str {
        match self {
            Self::Scope => "SCOPE",
            Self::Event => "EVENT",
            Self::Form => "FORM",
            Self::Field => "FIELD",
        }
    }

    fn target(&self) -> RulableEntity {
        match self {
            Self::Scope => RulableEntity::Scope,
            Self::Event => RulableEntity::Event,
            Self::Form => RulableEntity::Form,
            Self::Field => RulableEntity::Field,
        }
    }

    fn related(
        &self,
        services: &DomainServices,
        evaluable: Evaluable,
    ) -> AppResult<Vec<Evaluable>> {
        let pk = expect_kind(evaluable, RulableEntity::Workflow)?;
        let anchor = *services.workflows().get(pk)?.anchor();
        let related = match self {
            Self::Scope => Some(anchor.scope_pk),
            Self::Event => anchor.event_pk,
            Self::Form => anchor.form_pk,
            Self::Field => anchor.field_pk,
        };
        Ok(related
            .map(|related_pk| Evaluable::new(self.target(), related_pk))
            .into_iter()
            .collect())
    }
}

/// Moves the targeted status to the `STATUS` state.
struct ChangeStatus;

impl EntityAction for ChangeStatus {
    fn id(&self) -> &'static str {
        "CHANGE_STATUS"
    }

    fn execute(&self, invocation: &ActionInvocation<'_>, target: Evaluable) -> AppResult<()> {
        let pk = expect_kind(target, RulableEntity::Workflow)?;
        let parameters = invocation.parameters;
        let state_id = parameters.required_text(STATUS)?;
        invocation.services.workflows().change_status(
            pk,
            &state_id,
            parameters.text(ACTION)?,
            parameters.text(VALIDATOR)?,
            invocation.context,
            invocation.message,
        )?;
        Ok(())
    }
}

pub(super) fn register(registry: &mut EntityPluginRegistry) -> AppResult<()> {
    for attribute in WorkflowAttribute::ALL {
        registry.register_attribute(RulableEntity::Workflow, Arc::new(attribute))?;
    }
    for relation in [
        WorkflowRelation::Scope,
        WorkflowRelation::Event,
        WorkflowRelation::Form,
        WorkflowRelation::Field,
    ] {
        registry.register_relation(RulableEntity::Workflow, Arc::new(relation))?;
    }
    registry.register_action(RulableEntity::Workflow, Arc::new(ChangeStatus))
}
