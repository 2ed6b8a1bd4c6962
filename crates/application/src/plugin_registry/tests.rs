use std::sync::Arc;

use serde_json::Map;
use trialdesk_core::{AppError, AppResult};
use trialdesk_domain::{Evaluable, OperandType, OperandValue, PluginType, RulableEntity};

use crate::test_support::{context_at, review_catalog, study_fixture};

use super::{
    ActionInvocation, ActionParameters, EntityPluginRegistry, ParameterValue, StaticAction,
};

fn registry() -> EntityPluginRegistry {
    EntityPluginRegistry::with_defaults().unwrap_or_else(|_| unreachable!())
}

struct Noop;

impl StaticAction for Noop {
    fn id(&self) -> &'static str {
        "LOG"
    }

    fn execute(&self, _invocation: &ActionInvocation<'_>) -> AppResult<()> {
        Ok(())
    }
}

#[test]
fn default_registry_exposes_each_kind_namespace() {
    let registry = registry();

    assert!(registry.exists(RulableEntity::Scope, PluginType::Attribute, "SCOPE_NUMBER_IN_PARENT"));
    assert!(registry.exists(RulableEntity::Event, PluginType::Relation, "PREVIOUS"));
    assert!(registry.exists(RulableEntity::Form, PluginType::Action, "DELETE_WORKFLOW"));
    assert!(registry.exists(RulableEntity::Field, PluginType::Action, "CALCULATE"));
    assert!(registry.exists(RulableEntity::Workflow, PluginType::Action, "CHANGE_STATUS"));
    assert!(!registry.exists(RulableEntity::Scope, PluginType::Action, "DELETE_WORKFLOW"));
    assert!(!registry.exists(RulableEntity::Workflow, PluginType::Action, "REMOVE"));
    assert!(registry.static_exists("LOG"));
}

#[test]
fn unknown_plugin_names_kind_type_and_id() {
    let registry = registry();

    let error = registry
        .action(RulableEntity::Form, "ARCHIVE")
        .err()
        .unwrap_or_else(|| unreachable!());

    assert!(matches!(&error, AppError::UnknownPlugin(label) if label == "FORM/ACTION/ARCHIVE"));
    assert!(!error.is_fatal());
    assert!(matches!(
        registry.static_action("MAIL"),
        Err(AppError::UnknownPlugin(_))
    ));
}

#[test]
fn duplicate_registration_is_a_conflict() {
    let mut registry = registry();

    assert!(matches!(
        registry.register_static_action(Arc::new(Noop)),
        Err(AppError::Conflict(_))
    ));
}

#[test]
fn attributes_read_current_object_state() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let registry = registry();
    let read = |entity: RulableEntity, id: &str, pk: i64| {
        registry
            .attribute(entity, id)
            .and_then(|attribute| attribute.value(&fixture.services, Evaluable::new(entity, pk)))
            .unwrap_or_else(|_| unreachable!())
    };

    assert_eq!(
        read(RulableEntity::Form, "STATUS", fixture.form),
        OperandValue::String("SUBMITTED".to_owned())
    );
    assert_eq!(
        read(RulableEntity::Field, "VALUE_NUMBER", fixture.weight),
        OperandValue::Number(72.0)
    );
    assert_eq!(
        read(RulableEntity::Scope, "SCOPE_NUMBER_IN_PARENT", fixture.second_center),
        OperandValue::Number(2.0)
    );
    assert_eq!(
        read(RulableEntity::Event, "CONTAINS_DATA", fixture.baseline),
        OperandValue::Boolean(false)
    );
    assert_eq!(
        read(RulableEntity::Workflow, "CREATION_ACTION", fixture.review),
        OperandValue::String("CREATE".to_owned())
    );
    assert_eq!(
        read(
            RulableEntity::Workflow,
            "DATE_OF_FIRST_STATUS_AFTER_INITIALIZATION",
            fixture.review
        ),
        OperandValue::Null
    );
    assert_eq!(
        registry
            .attribute(RulableEntity::Event, "DATE_OR_EXPECTED_DATE")
            .map(|attribute| attribute.operand_type())
            .ok(),
        Some(OperandType::Date)
    );
}

#[test]
fn attribute_rejects_an_evaluable_of_another_kind() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let registry = registry();

    let result = registry
        .attribute(RulableEntity::Form, "STATUS")
        .and_then(|attribute| {
            attribute.value(
                &fixture.services,
                Evaluable::new(RulableEntity::Field, fixture.weight),
            )
        });

    assert!(matches!(result, Err(AppError::Unsupported(_))));
}

#[test]
fn relations_navigate_the_study_graph() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let registry = registry();
    let related = |entity: RulableEntity, id: &str, pk: i64| {
        registry
            .relation(entity, id)
            .and_then(|relation| {
                relation.related(&fixture.services, Evaluable::new(entity, pk))
            })
            .unwrap_or_else(|_| unreachable!())
    };

    assert_eq!(
        related(RulableEntity::Form, "WORKFLOW", fixture.form),
        vec![Evaluable::new(RulableEntity::Workflow, fixture.review)]
    );
    assert_eq!(
        related(RulableEntity::Workflow, "EVENT", fixture.review),
        vec![Evaluable::new(RulableEntity::Event, fixture.screening)]
    );
    assert!(related(RulableEntity::Workflow, "FIELD", fixture.review).is_empty());
    assert_eq!(
        related(RulableEntity::Scope, "ANCESTOR", fixture.patient),
        vec![
            Evaluable::new(RulableEntity::Scope, fixture.center),
            Evaluable::new(RulableEntity::Scope, fixture.study),
        ]
    );
    assert_eq!(
        related(RulableEntity::Event, "NEXT", fixture.screening),
        vec![Evaluable::new(RulableEntity::Event, fixture.baseline)]
    );
    assert_eq!(related(RulableEntity::Form, "FIELD", fixture.form).len(), 2);
}

#[test]
fn workflow_change_status_action_records_the_transition() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let registry = registry();
    let mut parameters = ActionParameters::new();
    parameters.insert(
        "STATUS",
        ParameterValue::Value(OperandValue::String("CLOSED".to_owned())),
    );
    let data = Map::new();
    let context = context_at(5);
    let invocation = ActionInvocation {
        services: &fixture.services,
        parameters: &parameters,
        context: &context,
        message: Some("review done"),
        data: &data,
    };

    let result = registry
        .action(RulableEntity::Workflow, "CHANGE_STATUS")
        .and_then(|action| {
            action.execute(
                &invocation,
                Evaluable::new(RulableEntity::Workflow, fixture.review),
            )
        });

    assert!(result.is_ok());
    let status = fixture
        .services
        .workflows()
        .get(fixture.review)
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(status.state_id().as_str(), "CLOSED");
    assert_eq!(
        registry
            .attribute(RulableEntity::Workflow, "COMMENT_ON_LAST_AUDIT_TRAIL")
            .and_then(|attribute| attribute.value(
                &fixture.services,
                Evaluable::new(RulableEntity::Workflow, fixture.review)
            ))
            .ok(),
        Some(OperandValue::String("review done".to_owned()))
    );
}

#[test]
fn calculate_without_a_value_leaves_the_field_untouched() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let registry = registry();
    let writes = fixture.store.write_count();
    let parameters = ActionParameters::new();
    let data = Map::new();
    let context = context_at(5);
    let invocation = ActionInvocation {
        services: &fixture.services,
        parameters: &parameters,
        context: &context,
        message: None,
        data: &data,
    };

    let result = registry
        .action(RulableEntity::Field, "CALCULATE")
        .and_then(|action| {
            action.execute(
                &invocation,
                Evaluable::new(RulableEntity::Field, fixture.weight),
            )
        });

    assert!(result.is_ok());
    assert_eq!(fixture.store.write_count(), writes);
}

#[test]
fn set_blocking_defaults_to_blocked() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let registry = registry();
    let parameters = ActionParameters::new();
    let data = Map::new();
    let context = context_at(5);
    let invocation = ActionInvocation {
        services: &fixture.services,
        parameters: &parameters,
        context: &context,
        message: None,
        data: &data,
    };

    assert!(
        registry
            .action(RulableEntity::Event, "SET_BLOCKING")
            .and_then(|action| action.execute(
                &invocation,
                Evaluable::new(RulableEntity::Event, fixture.baseline)
            ))
            .is_ok()
    );
    assert_eq!(
        fixture
            .services
            .events()
            .get(fixture.baseline)
            .map(|event| event.is_blocked())
            .ok(),
        Some(true)
    );
}
