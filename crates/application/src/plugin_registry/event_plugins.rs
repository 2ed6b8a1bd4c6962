use std::sync::Arc;

use trialdesk_core::AppResult;
use trialdesk_domain::{Evaluable, OperandType, OperandValue, RulableEntity, SoftDeletable};

use super::shared_actions::{
    BLOCKING, DATE, register_delete_workflow, register_initialize_workflow,
};
use super::{
    ActionInvocation, EntityAction, EntityAttribute, EntityPluginRegistry, EntityRelation,
    evaluables_of, expect_kind,
};
use crate::domain_services::DomainServices;

#[derive(Debug, Clone, Copy)]
enum EventAttribute {
    Id,
    Date,
    ExpectedDate,
    DateOrExpectedDate,
    CreationDate,
    Blocked,
    NotDone,
    Removed,
    ContainsData,
}

impl EventAttribute {
    const ALL: [Self; 9] = [
        Self::Id,
        Self::Date,
        Self::ExpectedDate,
        Self::DateOrExpectedDate,
        Self::CreationDate,
        Self::Blocked,
        Self::NotDone,
        Self::Removed,
        Self::ContainsData,
    ];
}

impl EntityAttribute for EventAttribute {
    fn id(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Date => "DATE",
            Self::ExpectedDate => "EXPECTED_DATE",
            Self::DateOrExpectedDate => "DATE_OR_EXPECTED_DATE",
            Self::CreationDate => "CREATION_DATE",
            Self::Blocked => "BLOCKED",
            Self::NotDone => "NOT_DONE",
            Self::Removed => "REMOVED",
            Self::ContainsData => "CONTAINS_DATA",
        }
    }

    fn operand_type(&self) -> OperandType {
        match self {
            Self::Id => OperandType::Number,
            Self::Date | Self::ExpectedDate | Self::DateOrExpectedDate | Self::CreationDate => {
                OperandType::Date
            }
            Self::Blocked | Self::NotDone | Self::Removed | Self::ContainsData => {
                OperandType::Boolean
            }
        }
    }

    fn value(&self, services: &DomainServices, evaluable: Evaluable) -> AppResult<OperandValue> {
        let pk = expect_kind(evaluable, RulableEntity::Event)?;
        if let Self::Id = self {
            return Ok(OperandValue::Number(pk as f64));
        }
        if let Self::ContainsData = self {
            return Ok(OperandValue::Boolean(
                services.fields().event_contains_data(pk)?,
            ));
        }

        let event = services.events().get(pk)?;
        Ok(match self {
            Self::Date => OperandValue::from_optional_date(event.date()),
            Self::ExpectedDate => OperandValue::from_optional_date(event.expected_date()),
            Self::DateOrExpectedDate => {
                OperandValue::from_optional_date(event.date_or_expected_date())
            }
            Self::CreationDate => OperandValue::from_optional_date(event.creation_time()),
            Self::Blocked => OperandValue::Boolean(event.is_blocked()),
            Self::NotDone => OperandValue::Boolean(event.is_not_done()),
            Self::Removed => OperandValue::Boolean(event.is_deleted()),
            Self::Id | Self::ContainsData => OperandValue::Null,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum EventRelation {
    Scope,
    Previous,
    Next,
    Form,
    Field,
    Workflow,
}

impl EventRelation {
    const ALL: [Self; 6] = [
        Self::Scope,
        Self::Previous,
        Self::Next,
        Self::Form,
        Self::Field,
        Self::Workflow,
    ];
}

impl EntityRelation for EventRelation {
    fn id(&self) -> &'static str {
        match self {
            Self::Scope => "SCOPE",
            Self::Previous => "PREVIOUS",
            Self::Next => "NEXT",
            Self::Form => "FORM",
            Self::Field => "FIELD",
            Self::Workflow => "WORKFLOW",
        }
    }

    fn target(&self) -> RulableEntity {
        match self {
            Self::Scope => RulableEntity::Scope,
            Self::Previous | Self::Next => RulableEntity::Event,
            Self::Form => RulableEntity::Form,
            Self::Field => RulableEntity::Field,
            Self::Workflow => RulableEntity::Workflow,
        }
    }

    fn related(
        &self,
        services: &DomainServices,
        evaluable: Evaluable,
    ) -> AppResult<Vec<Evaluable>> {
        let pk = expect_kind(evaluable, RulableEntity::Event)?;
        let events = services.events();
        let related = match self {
            Self::Scope => vec![Evaluable::new(
                RulableEntity::Scope,
                events.get(pk)?.scope_pk(),
            )],
            Self::Previous => evaluables_of(events.previous(pk)?, |event| event.evaluable()),
            Self::Next => evaluables_of(events.next(pk)?, |event| event.evaluable()),
            Self::Form => evaluables_of(services.forms().for_event(pk)?, |form| form.evaluable()),
            Self::Field => {
                evaluables_of(services.fields().for_event(pk)?, |field| field.evaluable())
            }
            Self::Workflow => evaluables_of(services.workflows().for_owner(evaluable)?, |status| {
                status.evaluable()
            }),
        };
        Ok(related)
    }
}

#[derive(Debug, Clone, Copy)]
enum EventAction {
    SetBlocking,
    SetDate,
    SetExpectedDate,
    SetNotDone,
    SetDone,
    Remove,
    Restore,
}

impl EventAction {
    const ALL: [Self; 7] = [
        Self::SetBlocking,
        Self::SetDate,
        Self::SetExpectedDate,
        Self::SetNotDone,
        Self::SetDone,
        Self::Remove,
        Self::Restore,
    ];
}

impl EntityAction for EventAction {
    fn id(&self) -> &'static str {
        match self {
            Self::SetBlocking => "SET_BLOCKING",
            Self::SetDate => "SET_DATE",
            Self::SetExpectedDate => "SET_EXPECTED_DATE",
            Self::SetNotDone => "SET_NOT_DONE",
            Self::SetDone => "SET_DONE",
            Self::Remove => "REMOVE",
            Self::Restore => "RESTORE",
        }
    }

    fn execute(&self, invocation: &ActionInvocation<'_>, target: Evaluable) -> AppResult<()> {
        let pk = expect_kind(target, RulableEntity::Event)?;
        let events = invocation.services.events();
        let (context, rationale) = (invocation.context, invocation.message);
        match self {
            Self::SetBlocking => {
                let blocked = invocation.parameters.flag(BLOCKING, true)?;
                events.set_blocking(pk, blocked, context, rationale)?;
            }
            Self::SetDate => {
                let date = invocation.parameters.date(DATE)?;
                events.set_date(pk, date, context, rationale)?;
            }
            Self::SetExpectedDate => {
                let date = invocation.parameters.date(DATE)?;
                events.set_expected_date(pk, date, context, rationale)?;
            }
            Self::SetNotDone => {
                events.set_not_done(pk, true, context, rationale)?;
            }
            Self::SetDone => {
                events.set_not_done(pk, false, context, rationale)?;
            }
            Self::Remove => {
                events.remove(pk, context, rationale)?;
            }
            Self::Restore => {
                events.restore(pk, context, rationale)?;
            }
        }
        Ok(())
    }
}

pub(super) fn register(registry: &mut EntityPluginRegistry) -> AppResult<()> {
    for attribute in EventAttribute::ALL {
        registry.register_attribute(RulableEntity::Event, Arc::new(attribute))?;
    }
    for relation in EventRelation::ALL {
        registry.register_relation(RulableEntity::Event, Arc::new(relation))?;
    }
    for action in EventAction::ALL {
        registry.register_action(RulableEntity::Event, Arc::new(action))?;
    }
    register_initialize_workflow(registry, RulableEntity::Event)?;
    register_delete_workflow(registry, RulableEntity::Event)
}
