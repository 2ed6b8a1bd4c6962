use trialdesk_core::AppError;
use trialdesk_domain::{Evaluable, Persistable, RulableEntity};

use crate::test_support::{context_at, review_catalog, study_fixture};

#[test]
fn scope_hierarchy_is_navigable_both_ways() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let scopes = fixture.services.scopes();

    let ancestors = scopes
        .ancestors(fixture.patient)
        .unwrap_or_else(|_| unreachable!());
    let ancestor_pks: Vec<_> = ancestors.iter().filter_map(Persistable::pk).collect();
    assert_eq!(ancestor_pks, vec![fixture.center, fixture.study]);

    let descendants = scopes
        .descendants(fixture.study)
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(descendants.len(), 3);

    assert_eq!(
        scopes.number_in_parent(fixture.second_center).ok(),
        Some(Some(2))
    );
    assert_eq!(scopes.number_in_parent(fixture.study).ok(), Some(None));
}

#[test]
fn removed_scopes_leave_the_hierarchy_until_restored() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let scopes = fixture.services.scopes();

    assert!(
        scopes
            .remove(fixture.center, &context_at(5), Some("closed site"))
            .unwrap_or_else(|_| unreachable!())
    );
    assert_eq!(
        scopes.children(fixture.study).map(|children| children.len()).ok(),
        Some(1)
    );

    assert!(
        scopes
            .restore(fixture.center, &context_at(6), None)
            .unwrap_or_else(|_| unreachable!())
    );
    assert_eq!(
        scopes.children(fixture.study).map(|children| children.len()).ok(),
        Some(2)
    );
}

#[test]
fn event_timeline_orders_by_actual_or_expected_date() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let events = fixture.services.events();

    let next = events
        .next(fixture.screening)
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(next.and_then(|event| event.pk()), Some(fixture.baseline));

    let previous = events
        .previous(fixture.screening)
        .unwrap_or_else(|_| unreachable!());
    assert!(previous.is_none());
}

#[test]
fn form_data_state_contains_its_owners() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let form = Evaluable::new(RulableEntity::Form, fixture.form);

    let state = fixture
        .services
        .data_state_for(form)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(state.reference(), RulableEntity::Form);
    assert_eq!(
        state.evaluables(RulableEntity::Event),
        vec![Evaluable::new(RulableEntity::Event, fixture.screening)]
    );
    assert_eq!(
        state.evaluables(RulableEntity::Scope),
        vec![Evaluable::new(RulableEntity::Scope, fixture.patient)]
    );
    assert!(state.evaluables(RulableEntity::Workflow).is_empty());
}

#[test]
fn initializing_a_running_workflow_returns_the_existing_status() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let writes = fixture.store.write_count();

    let status = fixture
        .services
        .initialize_workflow(
            Evaluable::new(RulableEntity::Form, fixture.form),
            "REVIEW",
            None,
            &context_at(5),
            None,
        )
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(status.pk(), fixture.review);
    assert_eq!(fixture.store.write_count(), writes);
}

#[test]
fn status_changes_are_limited_to_declared_states() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let workflows = fixture.services.workflows();

    let result = workflows.change_status(
        fixture.review,
        "ARCHIVED",
        None,
        None,
        &context_at(5),
        None,
    );
    assert!(matches!(result, Err(AppError::Validation(_))));

    assert!(
        workflows
            .change_status(
                fixture.review,
                "CLOSED",
                Some("CLOSE".to_owned()),
                Some("monitor".to_owned()),
                &context_at(5),
                Some("verified"),
            )
            .unwrap_or_else(|_| unreachable!())
    );
    let status = workflows
        .get(fixture.review)
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(status.state_id().as_str(), "CLOSED");
    assert_eq!(status.validator_id(), Some("monitor"));
    assert_eq!(
        workflows
            .audit_trails(fixture.review)
            .map(|trails| trails.len())
            .ok(),
        Some(2)
    );
}

#[test]
fn deleting_workflows_removes_only_the_requested_model() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let owner = Evaluable::new(RulableEntity::Form, fixture.form);
    assert!(
        fixture
            .services
            .initialize_workflow(owner, "QUERY", None, &context_at(5), None)
            .is_ok()
    );

    let removed = fixture
        .services
        .workflows()
        .delete_for_owner(owner, Some("QUERY"))
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(removed, 1);
    assert_eq!(
        fixture
            .services
            .workflows()
            .for_owner(owner)
            .map(|statuses| statuses.len())
            .ok(),
        Some(1)
    );
}

#[test]
fn field_values_report_contained_data() {
    let fixture = study_fixture(review_catalog(Vec::new()));
    let fields = fixture.services.fields();

    assert_eq!(fields.event_contains_data(fixture.screening).ok(), Some(true));
    assert_eq!(fields.event_contains_data(fixture.baseline).ok(), Some(false));

    assert!(
        fields
            .set_value(fixture.weight, None, &context_at(5), None)
            .unwrap_or_else(|_| unreachable!())
    );
    assert_eq!(
        fields
            .get(fixture.weight)
            .map(|field| field.value().map(str::to_owned))
            .ok(),
        Some(None)
    );
}
