use std::collections::BTreeMap;

use trialdesk_application::DomainServices;
use trialdesk_core::{AppError, AppResult, DatabaseActionContext, NonEmptyString};
use trialdesk_domain::{
    EvaluationMode, Evaluable, Event, Field, Form, LocalizedText, Operator, Persistable,
    RulableEntity, Rule, RuleAction, RuleActionParameter, RuleActionTarget, RuleCatalog,
    RuleCondition, RuleConstraint, Scope, WorkflowActionModel, WorkflowModel,
};

pub const REVIEW_WORKFLOW: &str = "REVIEW";
pub const SUBMIT_ACTION: &str = "SUBMIT";

/// Keys of the seeded objects the runner triggers rules on.
pub struct DemoStudy {
    pub form: i64,
    pub review: i64,
}

pub fn catalog() -> AppResult<RuleCatalog> {
    RuleCatalog::new(vec![WorkflowModel::new(
        REVIEW_WORKFLOW,
        vec!["OPEN".to_owned(), "CLOSED".to_owned()],
        vec![WorkflowActionModel::new(SUBMIT_ACTION, submit_rules()?)?],
    )?])
}

/// Seeds one patient with a submitted vitals form under review.
pub fn seed(services: &DomainServices, context: &DatabaseActionContext) -> AppResult<DemoStudy> {
    let study = saved_pk(services.scopes().create(Scope::new("DEMO", "STUDY", None)?, context)?)?;
    let center = saved_pk(
        services
            .scopes()
            .create(Scope::new("CH-01", "CENTER", Some(study))?, context)?,
    )?;
    let patient = saved_pk(
        services
            .scopes()
            .create(Scope::new("CH-01-001", "PATIENT", Some(center))?, context)?,
    )?;

    let mut screening = Event::new(patient, "SCREENING")?;
    screening.set_date(Some(context.operation_time()));
    let screening = saved_pk(services.events().create(screening, context)?)?;

    let form = saved_pk(services.forms().create(
        Form::new(patient, Some(screening), "VITALS", "SUBMITTED")?,
        context,
    )?)?;
    for (model, value) in [("WEIGHT", Some("72")), ("HEIGHT", Some("180")), ("BMI", None)] {
        let mut field = Field::new(patient, Some(screening), Some(form), model)?;
        field.set_value(value.map(str::to_owned));
        services.fields().create(field, context)?;
    }

    let review = services
        .initialize_workflow(
            Evaluable::new(RulableEntity::Form, form),
            REVIEW_WORKFLOW,
            Some("CREATE".to_owned()),
            context,
            None,
        )?
        .pk();

    Ok(DemoStudy { form, review })
}

fn saved_pk<T: Persistable>(object: T) -> AppResult<i64> {
    object
        .pk()
        .ok_or_else(|| AppError::Internal(format!("saved {} has no key", T::TABLE)))
}

fn english(text: &str) -> LocalizedText {
    BTreeMap::from([("en".to_owned(), text.to_owned())])
}

fn name(value: &str) -> AppResult<NonEmptyString> {
    NonEmptyString::new(value)
}

fn submit_rules() -> AppResult<Vec<Rule>> {
    let fields = RuleCondition::relation("FIELDS", "FIELD")?.with_children(
        EvaluationMode::And,
        vec![
            RuleCondition::attribute("FILLED", "VALUE", Operator::NotBlank, Vec::new())?
                .with_children(
                    EvaluationMode::And,
                    vec![RuleCondition::attribute(
                        "WEIGHT_VALUE",
                        "VALUE_NUMBER",
                        Operator::Equals,
                        vec!["72".to_owned()],
                    )?],
                ),
            RuleCondition::attribute(
                "HEIGHT",
                "VALUE_NUMBER",
                Operator::GreaterEquals,
                vec!["100".to_owned()],
            )?,
            RuleCondition::attribute("BMI", "VALUE", Operator::Blank, Vec::new())?,
        ],
    );
    let calculate_bmi = Rule::new("calculate bmi from weight and height")
        .with_constraint(RuleConstraint::new().with_list(
            RulableEntity::Form,
            EvaluationMode::And,
            vec![fields],
        ))
        .with_action(
            RuleAction::new(RuleActionTarget::Condition {
                condition_id: name("BMI")?,
                action_id: name("CALCULATE")?,
            })
            .with_parameter(RuleActionParameter::from_value(
                "VALUE",
                "=ROUND(BMI(WEIGHT_VALUE:VALUE_NUMBER, HEIGHT:VALUE_NUMBER), 1)",
            )?),
        )
        .with_message(english("BMI calculated"));

    let close_review = Rule::new("close review of submitted vitals")
        .with_constraint(RuleConstraint::new().with_list(
            RulableEntity::Form,
            EvaluationMode::And,
            vec![
                RuleCondition::attribute(
                    "SUBMITTED",
                    "STATUS",
                    Operator::Equals,
                    vec!["SUBMITTED".to_owned()],
                )?
                .with_children(
                    EvaluationMode::And,
                    vec![RuleCondition::relation("REVIEW", "WORKFLOW")?],
                ),
            ],
        ))
        .with_action(
            RuleAction::new(RuleActionTarget::Condition {
                condition_id: name("REVIEW")?,
                action_id: name("CHANGE_STATUS")?,
            })
            .with_parameter(RuleActionParameter::from_value("STATUS", "CLOSED")?)
            .with_parameter(RuleActionParameter::from_value("ACTION", SUBMIT_ACTION)?),
        )
        .with_action(
            RuleAction::new(RuleActionTarget::Static {
                action_id: name("LOG")?,
            })
            .with_parameter(RuleActionParameter::from_value(
                "MESSAGE",
                "vitals review closed",
            )?)
            .optional(),
        )
        .with_message(english("Review closed"));

    Ok(vec![calculate_bmi, close_review])
}
