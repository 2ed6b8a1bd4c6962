use std::sync::Arc;

use trialdesk_core::AppResult;
use trialdesk_domain::{
    Evaluable, OperandType, OperandValue, RulableEntity, Scope, SoftDeletable,
};

use super::shared_actions::{CODE, SHORTNAME, register_initialize_workflow};
use super::{
    ActionInvocation, EntityAction, EntityAttribute, EntityPluginRegistry, EntityRelation,
    evaluables_of, expect_kind,
};
use crate::domain_services::DomainServices;

#[derive(Debug, Clone, Copy)]
enum ScopeAttribute {
    Id,
    Code,
    Model,
    Removed,
    NumberInParent,
    ContainsData,
}

impl ScopeAttribute {
    const ALL: [Self; 6] = [
        Self::Id,
        Self::Code,
        Self::Model,
        Self::Removed,
        Self::NumberInParent,
        Self::ContainsData,
    ];
}

impl EntityAttribute for ScopeAttribute {
    fn id(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Code => "CODE",
            Self::Model => "MODEL",
            Self::Removed => "REMOVED",
            Self::NumberInParent => "SCOPE_NUMBER_IN_PARENT",
            Self::ContainsData => "CONTAINS_DATA",
        }
    }

    fn operand_type(&self) -> OperandType {
        match self {
            Self::Id | Self::NumberInParent => OperandType::Number,
            Self::Code | Self::Model => OperandType::String,
            Self::Removed | Self::ContainsData => OperandType::Boolean,
        }
    }

    fn value(&self, services: &DomainServices, evaluable: Evaluable) -> AppResult<OperandValue> {
        let pk = expect_kind(evaluable, RulableEntity::Scope)?;
        let value = match self {
            Self::Id => OperandValue::Number(pk as f64),
            Self::Code => OperandValue::String(services.scopes().get(pk)?.code().to_string()),
            Self::Model => OperandValue::String(services.scopes().get(pk)?.model_id().to_string()),
            Self::Removed => OperandValue::Boolean(services.scopes().get(pk)?.is_deleted()),
            Self::NumberInParent => services
                .scopes()
                .number_in_parent(pk)?
                .map_or(OperandValue::Null, |number| OperandValue::Number(number as f64)),
            Self::ContainsData => {
                OperandValue::Boolean(services.fields().scope_contains_data(pk)?)
            }
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy)]
enum ScopeRelation {
    Parent,
    Ancestor,
    Descendant,
    Event,
    Form,
    Workflow,
}

impl ScopeRelation {
    const ALL: [Self; 6] = [
        Self::Parent,
        Self::Ancestor,
        Self::Descendant,
        Self::Event,
        Self::Form,
        Self::Workflow,
    ];
}

impl EntityRelation for ScopeRelation {
    fn id(&self) -> &'static str {
        match self {
            Self::Parent => "PARENT",
            Self::Ancestor => "ANCESTOR",
            Self::Descendant => "DESCENDANT",
            Self::Event => "EVENT",
            Self::Form => "FORM",
            Self::Workflow => "WORKFLOW",
        }
    }

    fn target(&self) -> RulableEntity {
        match self {
            Self::Parent | Self::Ancestor | Self::Descendant => RulableEntity::Scope,
            Self::Event => RulableEntity::Event,
            Self::Form => RulableEntity::Form,
            Self::Workflow => RulableEntity::Workflow,
        }
    }

    fn related(
        &self,
        services: &DomainServices,
        evaluable: Evaluable,
    ) -> AppResult<Vec<Evaluable>> {
        let pk = expect_kind(evaluable, RulableEntity::Scope)?;
        let related = match self {
            Self::Parent => services
                .scopes()
                .get(pk)?
                .parent_pk()
                .map(|parent_pk| Evaluable::new(RulableEntity::Scope, parent_pk))
                .into_iter()
                .collect(),
            Self::Ancestor => evaluables_of(services.scopes().ancestors(pk)?, Scope::evaluable),
            Self::Descendant => {
                evaluables_of(services.scopes().descendants(pk)?, Scope::evaluable)
            }
            Self::Event => evaluables_of(services.events().for_scope(pk)?, |event| {
                event.evaluable()
            }),
            Self::Form => evaluables_of(services.forms().for_scope(pk)?, |form| form.evaluable()),
            Self::Workflow => evaluables_of(services.workflows().for_owner(evaluable)?, |status| {
                status.evaluable()
            }),
        };
        Ok(related)
    }
}

#[derive(Debug, Clone, Copy)]
enum ScopeAction {
    ChangeCode,
    ChangeShortname,
    Remove,
    Restore,
}

impl ScopeAction {
    const ALL: [Self; 4] = [
        Self::ChangeCode,
        Self::ChangeShortname,
        Self::Remove,
        Self::Restore,
    ];
}

impl EntityAction for ScopeAction {
    fn id(&self) -> &'static str {
        match self {
            Self::ChangeCode => "CHANGE_CODE",
            Self::ChangeShortname => "CHANGE_SHORTNAME",
            Self::Remove => "REMOVE",
            Self::Restore => "RESTORE",
        }
    }

    fn execute(&self, invocation: &ActionInvocation<'_>, target: Evaluable) -> AppResult<()> {
        let pk = expect_kind(target, RulableEntity::Scope)?;
        let scopes = invocation.services.scopes();
        let (context, rationale) = (invocation.context, invocation.message);
        match self {
            Self::ChangeCode => {
                let code = invocation.parameters.required_text(CODE)?;
                scopes.change_code(pk, &code, context, rationale)?;
            }
            Self::ChangeShortname => {
                let shortname = invocation.parameters.text(SHORTNAME)?;
                scopes.change_shortname(pk, shortname, context, rationale)?;
            }
            Self::Remove => {
                scopes.remove(pk, context, rationale)?;
            }
            Self::Restore => {
                scopes.restore(pk, context, rationale)?;
            }
        }
        Ok(())
    }
}

pub(super) fn register(registry: &mut EntityPluginRegistry) -> AppResult<()> {
    for attribute in ScopeAttribute::ALL {
        registry.register_attribute(RulableEntity::Scope, Arc::new(attribute))?;
    }
    for relation in ScopeRelation::ALL {
        registry.register_relation(RulableEntity::Scope, Arc::new(relation))?;
    }
    for action in ScopeAction::ALL {
        registry.register_action(RulableEntity::Scope, Arc::new(action))?;
    }
    register_initialize_workflow(registry, RulableEntity::Scope)
}
