use std::sync::Arc;

use trialdesk_core::AppResult;
use trialdesk_domain::{Evaluable, OperandType, OperandValue, RulableEntity, SoftDeletable};

use super::shared_actions::{STATUS, register_delete_workflow, register_initialize_workflow};
use super::{
    ActionInvocation, EntityAction, EntityAttribute, EntityPluginRegistry, EntityRelation,
    evaluables_of, expect_kind,
};
use crate::domain_services::DomainServices;

#[derive(Debug, Clone, Copy)]
enum FormAttribute {
    Id,
    Status,
    Removed,
}

impl EntityAttribute for FormAttribute {
    fn id(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Status => "STATUS",
            Self::Removed => "REMOVED",
        }
    }

    fn operand_type(&self) -> OperandType {
        match self {
            Self::Id => OperandType::Number,
            Self::Status => OperandType::String,
            Self::Removed => OperandType::Boolean,
        }
    }

    fn value(&self, services: &DomainServices, evaluable: Evaluable) -> AppResult<OperandValue> {
        let pk = expect_kind(evaluable, RulableEntity::Form)?;
        Ok(match self {
            Self::Id => OperandValue::Number(pk as f64),
            Self::Status => OperandValue::String(services.forms().get(pk)?.status().to_string()),
            Self::Removed => OperandValue::Boolean(services.forms().get(pk)?.is_deleted()),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum FormRelation {
    Scope,
    Event,
    Workflow,
    Field,
}

impl EntityRelation for FormRelation {
    fn id(&self) -> &'static str {
        match self {
            Self::Scope => "SCOPE",
            Self::Event => "EVENT",
            Self::Workflow => "WORKFLOW",
            Self::Field => "FIELD",
        }
    }

    fn target(&self) -> RulableEntity {
        match self {
            Self::Scope => RulableEntity::Scope,
            Self::Event => RulableEntity::Event,
            Self::Workflow => RulableEntity::Workflow,
            Self::Field => RulableEntity::Field,
        }
    }

    fn related(
        &self,
        services: &DomainServices,
        evaluable: Evaluable,
    ) -> AppResult<Vec<Evaluable>> {
        let pk = expect_kind(evaluable, RulableEntity::Form)?;
        Ok(match self {
            Self::Scope => vec![Evaluable::new(
                RulableEntity::Scope,
                services.forms().get(pk)?.scope_pk(),
            )],
            Self::Event => services
                .forms()
                .get(pk)?
                .event_pk()
                .map(|event_pk| Evaluable::new(RulableEntity::Event, event_pk))
                .into_iter()
                .collect(),
            Self::Workflow => evaluables_of(services.workflows().for_owner(evaluable)?, |status| {
                status.evaluable()
            }),
            Self::Field => {
                evaluables_of(services.fields().for_form(pk)?, |field| field.evaluable())
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum FormAction {
    Remove,
    Restore,
    ChangeStatus,
}

impl EntityAction for FormAction {
    fn id(&self) -> &'static str {
        match self {
            Self::Remove => "REMOVE",
            Self::Restore => "RESTORE",
            Self::ChangeStatus => "CHANGE_STATUS",
        }
    }

    fn execute(&self, invocation: &ActionInvocation<'_>, target: Evaluable) -> AppResult<()> {
        let pk = expect_kind(target, RulableEntity::Form)?;
        let forms = invocation.services.forms();
        let (context, rationale) = (invocation.context, invocation.message);
        match self {
            Self::Remove => {
                forms.remove(pk, context, rationale)?;
            }
            Self::Restore => {
                forms.restore(pk, context, rationale)?;
            }
            Self::ChangeStatus => {
                let status = invocation.parameters.required_text(STATUS)?;
                forms.change_status(pk, &status, context, rationale)?;
            }
        }
        Ok(())
    }
}

pub(super) fn register(registry: &mut EntityPluginRegistry) -> AppResult<()> {
    for attribute in [FormAttribute::Id, FormAttribute::Status, FormAttribute::Removed] {
        registry.register_attribute(RulableEntity::Form, Arc::new(attribute))?;
    }
    for relation in [
        FormRelation::Scope,
        FormRelation::Event,
        FormRelation::Workflow,
        FormRelation::Field,
    ] {
        registry.register_relation(RulableEntity::Form, Arc::new(relation))?;
    }
    for action in [
        FormAction::Remove,
        FormAction::Restore,
        FormAction::ChangeStatus,
    ] {
        registry.register_action(RulableEntity::Form, Arc::new(action))?;
    }
    register_initialize_workflow(registry, RulableEntity::Form)?;
    register_delete_workflow(registry, RulableEntity::Form)
}
