use std::sync::Arc;

use trialdesk_core::AppResult;
use trialdesk_domain::{Evaluable, OperandType, OperandValue, RulableEntity};

use super::shared_actions::{VALUE, register_delete_workflow, register_initialize_workflow};
use super::{
    ActionInvocation, EntityAction, EntityAttribute, EntityPluginRegistry, EntityRelation,
    evaluables_of, expect_kind,
};
use crate::domain_services::DomainServices;

#[derive(Debug, Clone, Copy)]
enum FieldAttribute {
    Id,
    Value,
    ValueNumber,
    ValueDate,
    ModificationDate,
    NewestAuditTrail,
    OldestAuditTrail,
    HasWorkflow,
}

impl FieldAttribute {
    const ALL: [Self; 8] = [
        Self::Id,
        Self::Value,
        Self::ValueNumber,
        Self::ValueDate,
        Self::ModificationDate,
        Self::NewestAuditTrail,
        Self::OldestAuditTrail,
        Self::HasWorkflow,
    ];
}

impl EntityAttribute for FieldAttribute {
    fn id(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Value => "VALUE",
            Self::ValueNumber => "VALUE_NUMBER",
            Self::ValueDate => "VALUE_DATE",
            Self::ModificationDate => "MODIFICATION_DATE",
            Self::NewestAuditTrail => "NEWEST_AUDIT_TRAIL",
            Self::OldestAuditTrail => "OLDEST_AUDIT_TRAIL",
            Self::HasWorkflow => "HAS_WORKFLOW",
        }
    }

    fn operand_type(&self) -> OperandType {
        match self {
            Self::Id | Self::ValueNumber => OperandType::Number,
            Self::Value => OperandType::String,
            Self::ValueDate
            | Self::ModificationDate
            | Self::NewestAuditTrail
            | Self::OldestAuditTrail => OperandType::Date,
            Self::HasWorkflow => OperandType::Boolean,
        }
    }

    fn value(&self, services: &DomainServices, evaluable: Evaluable) -> AppResult<OperandValue> {
        let pk = expect_kind(evaluable, RulableEntity::Field)?;
        let fields = services.fields();
        let value = match self {
            Self::Id => OperandValue::Number(pk as f64),
            Self::Value => OperandValue::from_optional_str(fields.get(pk)?.value()),
            Self::ValueNumber => fields
                .get(pk)?
                .value_as_number()
                .map_or(OperandValue::Null, OperandValue::Number),
            Self::ValueDate => OperandValue::from_optional_date(fields.get(pk)?.value_as_date()),
            Self::ModificationDate => {
                OperandValue::from_optional_date(fields.get(pk)?.modification_time())
            }
            Self::NewestAuditTrail => OperandValue::from_optional_date(
                fields.audit_trails(pk)?.last().map(|trail| trail.datetime()),
            ),
            Self::OldestAuditTrail => OperandValue::from_optional_date(
                fields.audit_trails(pk)?.first().map(|trail| trail.datetime()),
            ),
            Self::HasWorkflow => {
                OperandValue::Boolean(!services.workflows().for_owner(evaluable)?.is_empty())
            }
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldRelation {
    Form,
    Event,
    Scope,
    Workflow,
}

impl EntityRelation for FieldRelation {
    fn id(&self) -> &'static str {
        match self {
            Self::Form => "FORM",
            Self::Event => "EVENT",
            Self::Scope => "SCOPE",
            Self::Workflow => "WORKFLOW",
        }
    }

    fn target(&self) -> RulableEntity {
        match self {
            Self::Form => RulableEntity::Form,
            Self::Event => RulableEntity::Event,
            Self::Scope => RulableEntity::Scope,
            Self::Workflow => RulableEntity::Workflow,
        }
    }

    fn related(
        &self,
        services: &DomainServices,
        evaluable: Evaluable,
    ) -> AppResult<Vec<Evaluable>> {
        let pk = expect_kind(evaluable, RulableEntity::Field)?;
        if let Self::Workflow = self {
            return Ok(evaluables_of(
                services.workflows().for_owner(evaluable)?,
                |status| status.evaluable(),
            ));
        }

        let field = services.fields().get(pk)?;
        let related = match self {
            Self::Form => field
                .form_pk()
                .map(|form_pk| Evaluable::new(RulableEntity::Form, form_pk)),
            Self::Event => field
                .event_pk()
                .map(|event_pk| Evaluable::new(RulableEntity::Event, event_pk)),
            Self::Scope => Some(Evaluable::new(RulableEntity::Scope, field.scope_pk())),
            Self::Workflow => None,
        };
        Ok(related.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldAction {
    SetStringValue,
    Reset,
    Calculate,
}

impl EntityAction for FieldAction {
    fn id(&self) -> &'static str {
        match self {
            Self::SetStringValue => "SET_STRING_VALUE",
            Self::Reset => "RESET",
            Self::Calculate => "CALCULATE",
        }
    }

    fn execute(&self, invocation: &ActionInvocation<'_>, target: Evaluable) -> AppResult<()> {
        let pk = expect_kind(target, RulableEntity::Field)?;
        let fields = invocation.services.fields();
        let (context, rationale) = (invocation.context, invocation.message);
        match self {
            Self::SetStringValue => {
                let value = invocation.parameters.text(VALUE)?;
                fields.set_value(pk, value, context, rationale)?;
            }
            Self::Reset => {
                fields.set_value(pk, None, context, rationale)?;
            }
            // A formula that could not be resolved leaves the field untouched.
            Self::Calculate => {
                if let Some(value) = invocation.parameters.text(VALUE)? {
                    fields.set_value(pk, Some(value), context, rationale)?;
                }
            }
        }
        Ok(())
    }
}

pub(super) fn register(registry: &mut EntityPluginRegistry) -> AppResult<()> {
    for attribute in FieldAttribute::ALL {
        registry.register_attribute(RulableEntity::Field, Arc::new(attribute))?;
    }
    for relation in [
        FieldRelation::Form,
        FieldRelation::Event,
        FieldRelation::Scope,
        FieldRelation::Workflow,
    ] {
        registry.register_relation(RulableEntity::Field, Arc::new(relation))?;
    }
    for action in [
        FieldAction::SetStringValue,
        FieldAction::Reset,
        FieldAction::Calculate,
    ] {
        registry.register_action(RulableEntity::Field, Arc::new(action))?;
    }
    register_initialize_workflow(registry, RulableEntity::Field)?;
    register_delete_workflow(registry, RulableEntity::Field)
}
