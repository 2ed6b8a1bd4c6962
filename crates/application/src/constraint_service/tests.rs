use trialdesk_core::{AppError, NonEmptyString};
use trialdesk_domain::{
    BreakType, DataEvaluation, DataState, Evaluable, EvaluationMode, Operator, RulableEntity,
    RuleCondition, RuleConstraint,
};

use crate::plugin_registry::EntityPluginRegistry;
use crate::test_support::{StudyFixture, base_time, review_catalog, study_fixture};

use super::ConstraintEvaluator;

fn condition(id: &str, property: &str, operator: Operator, values: &[&str]) -> RuleCondition {
    RuleCondition::attribute(
        id,
        property,
        operator,
        values.iter().map(|value| (*value).to_owned()).collect(),
    )
    .unwrap_or_else(|_| unreachable!())
}

fn relation(id: &str, relation: &str) -> RuleCondition {
    RuleCondition::relation(id, relation).unwrap_or_else(|_| unreachable!())
}

fn form_state(fixture: &StudyFixture) -> DataState {
    fixture
        .services
        .data_state_for(Evaluable::new(RulableEntity::Form, fixture.form))
        .unwrap_or_else(|_| unreachable!())
}

fn fields_below(children: Vec<RuleCondition>) -> RuleCondition {
    relation("FIELDS", "FIELD").with_children(EvaluationMode::And, children)
}

struct Harness {
    fixture: StudyFixture,
    registry: EntityPluginRegistry,
}

impl Harness {
    fn new() -> Self {
        Self {
            fixture: study_fixture(review_catalog(Vec::new())),
            registry: EntityPluginRegistry::with_defaults().unwrap_or_else(|_| unreachable!()),
        }
    }

    fn evaluator(&self) -> ConstraintEvaluator<'_> {
        ConstraintEvaluator::new(&self.registry, &self.fixture.services, base_time())
    }

    fn evaluate_form(&self, constraint: &RuleConstraint) -> DataEvaluation {
        self.evaluator()
            .evaluate(&form_state(&self.fixture), Some(constraint))
            .unwrap_or_else(|_| unreachable!())
    }
}

#[test]
fn missing_constraint_is_valid() {
    let harness = Harness::new();

    let evaluation = harness
        .evaluator()
        .evaluate(&form_state(&harness.fixture), None)
        .unwrap_or_else(|_| unreachable!());

    assert!(evaluation.is_valid());
    assert!(evaluation.states().is_empty());
}

#[test]
fn submitted_form_leads_to_its_workflow() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![
            condition("C0", "STATUS", Operator::Equals, &["SUBMITTED"])
                .with_children(EvaluationMode::And, vec![relation("C1", "WORKFLOW")]),
        ],
    );
    let writes = harness.fixture.store.write_count();

    let evaluation = harness.evaluate_form(&constraint);

    assert!(evaluation.is_valid());
    let workflow_state = evaluation.state("C1").unwrap_or_else(|| unreachable!());
    assert_eq!(workflow_state.reference(), RulableEntity::Workflow);
    assert_eq!(
        workflow_state.first_reference_evaluable(),
        Some(Evaluable::new(RulableEntity::Workflow, harness.fixture.review))
    );
    assert_eq!(harness.fixture.store.write_count(), writes);
}

#[test]
fn failing_condition_still_records_its_state_and_children() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![
            condition("C0", "STATUS", Operator::Equals, &["DRAFT"])
                .with_children(EvaluationMode::And, vec![relation("C1", "WORKFLOW")]),
        ],
    );

    let evaluation = harness.evaluate_form(&constraint);

    assert!(!evaluation.is_valid());
    assert!(evaluation.state("C0").is_some_and(|state| !state.is_valid()));
    assert!(evaluation.state("C1").is_some_and(|state| !state.is_valid()));
}

#[test]
fn inverse_condition_passes_on_an_empty_result() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![condition("C0", "STATUS", Operator::Equals, &["DRAFT"]).inverted()],
    );

    assert!(harness.evaluate_form(&constraint).is_valid());
}

#[test]
fn deny_break_stops_evaluation_as_invalid() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new()
        .with_list(
            RulableEntity::Scope,
            EvaluationMode::Or,
            vec![
                condition("S0", "CODE", Operator::Equals, &["CH-02"])
                    .with_break_type(BreakType::Deny),
                condition("S1", "CODE", Operator::Equals, &["CH-01-001"]),
            ],
        )
        .with_list(
            RulableEntity::Form,
            EvaluationMode::And,
            vec![condition("C0", "STATUS", Operator::Equals, &["SUBMITTED"])],
        );

    let evaluation = harness.evaluate_form(&constraint);

    assert!(!evaluation.is_valid());
    assert!(evaluation.state("S0").is_some());
    assert!(evaluation.state("S1").is_none());
    assert!(evaluation.state("C0").is_none());
}

#[test]
fn allow_break_validates_despite_later_failures() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new()
        .with_list(
            RulableEntity::Scope,
            EvaluationMode::And,
            vec![condition("S0", "CODE", Operator::Equals, &["CH-02"])
                .with_break_type(BreakType::Allow)],
        )
        .with_list(
            RulableEntity::Form,
            EvaluationMode::And,
            vec![condition("C0", "STATUS", Operator::Equals, &["DRAFT"])],
        );

    assert!(harness.evaluate_form(&constraint).is_valid());
}

#[test]
fn or_mode_needs_one_passing_condition() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::Or,
        vec![
            condition("C0", "STATUS", Operator::Equals, &["DRAFT"]),
            condition("C1", "STATUS", Operator::Equals, &["LOCKED", "SUBMITTED"]),
        ],
    );

    let evaluation = harness.evaluate_form(&constraint);

    assert!(evaluation.is_valid());
    assert_eq!(evaluation.states().len(), 2);
}

#[test]
fn attribute_filters_the_reference_set() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![fields_below(vec![condition(
            "LIGHT",
            "VALUE_NUMBER",
            Operator::Lower,
            &["100"],
        )])],
    );

    let evaluation = harness.evaluate_form(&constraint);

    assert!(evaluation.is_valid());
    assert_eq!(
        evaluation
            .state("LIGHT")
            .map(DataState::reference_evaluables)
            .map(|evaluables| evaluables.into_iter().collect::<Vec<_>>()),
        Some(vec![Evaluable::new(RulableEntity::Field, harness.fixture.weight)])
    );
    assert_eq!(
        evaluation
            .state("FIELDS")
            .map(|state| state.reference_evaluables().len()),
        Some(2)
    );
}

#[test]
fn formula_values_are_resolved_and_failures_dropped() {
    let harness = Harness::new();
    let resolved = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![fields_below(vec![condition(
            "HEAVY",
            "VALUE_NUMBER",
            Operator::Equals,
            &["=SUM(70, 2)"],
        )])],
    );
    assert!(harness.evaluate_form(&resolved).is_valid());

    let dropped = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![fields_below(vec![condition(
            "HEAVY",
            "VALUE_NUMBER",
            Operator::Equals,
            &["=DIVIDE(1, 0)"],
        )])],
    );
    let evaluation = harness
        .evaluator()
        .evaluate(&form_state(&harness.fixture), Some(&dropped));
    assert!(evaluation.is_ok_and(|evaluation| !evaluation.is_valid()));
}

#[test]
fn condition_match_compares_recorded_reference_sets() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![
            condition("C0", "STATUS", Operator::NotNull, &[]),
            RuleCondition::matches("C1", "C0").unwrap_or_else(|_| unreachable!()),
        ],
    );

    let evaluation = harness.evaluate_form(&constraint);

    assert!(evaluation.is_valid());
    assert!(evaluation.state("C1").is_some_and(DataState::is_valid));
}

#[test]
fn condition_match_before_evaluation_is_an_error() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![RuleCondition::matches("C1", "LATER").unwrap_or_else(|_| unreachable!())],
    );

    let result = harness
        .evaluator()
        .evaluate(&form_state(&harness.fixture), Some(&constraint));

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn dependencies_collect_reference_evaluables() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new()
        .with_list(
            RulableEntity::Form,
            EvaluationMode::And,
            vec![fields_below(Vec::new())],
        )
        .with_dependencies(vec![
            NonEmptyString::new("FIELDS").unwrap_or_else(|_| unreachable!()),
        ]);

    let evaluation = harness.evaluate_form(&constraint);

    assert!(
        evaluation
            .dependencies()
            .contains(&Evaluable::new(RulableEntity::Field, harness.fixture.height))
    );
    assert_eq!(evaluation.dependencies().len(), 2);
}

#[test]
fn unknown_attribute_is_reported() {
    let harness = Harness::new();
    let constraint = RuleConstraint::new().with_list(
        RulableEntity::Form,
        EvaluationMode::And,
        vec![condition("C0", "COLOR", Operator::NotNull, &[])],
    );

    let result = harness
        .evaluator()
        .evaluate(&form_state(&harness.fixture), Some(&constraint));

    assert!(matches!(result, Err(AppError::UnknownPlugin(_))));
}
