use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trialdesk_core::{AppError, AppResult, NonEmptyString};

use crate::{Operator, RulableEntity};

/// Localized text keyed by language code.
pub type LocalizedText = BTreeMap<String, String>;

/// How sibling conditions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationMode {
    /// Every condition must be valid.
    #[default]
    And,
    /// At least one condition must be valid.
    Or,
}

impl EvaluationMode {
    /// Combines already evaluated validity flags.
    ///
    /// An empty list is valid in both modes.
    #[must_use]
    pub fn combine(&self, results: &[bool]) -> bool {
        if results.is_empty() {
            return true;
        }

        match self {
            Self::And => results.iter().all(|valid| *valid),
            Self::Or => results.iter().any(|valid| *valid),
        }
    }
}

/// Short-circuit behavior of a condition that evaluates invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakType {
    /// Keep evaluating.
    #[default]
    None,
    /// Stop and accept the whole constraint.
    Allow,
    /// Stop and reject the whole constraint.
    Deny,
}

/// What a condition tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCriterion {
    /// Compares an attribute of the reference evaluables.
    Attribute {
        /// Attribute plugin id.
        property: NonEmptyString,
        /// Comparison operator.
        operator: Operator,
        /// Literal values or `=` formulas; ignored by value-less operators.
        #[serde(default)]
        values: Vec<String>,
    },
    /// Matches when the reference set equals the one recorded by another condition.
    MatchesCondition {
        /// Referenced condition id.
        condition_id: NonEmptyString,
    },
    /// Follows a relation plugin from every reference evaluable.
    Relation {
        /// Relation plugin id.
        relation: NonEmptyString,
    },
}

/// One named node of a constraint tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    id: NonEmptyString,
    criterion: RuleCriterion,
    #[serde(default)]
    inverse: bool,
    #[serde(default)]
    break_type: BreakType,
    #[serde(default)]
    mode: EvaluationMode,
    #[serde(default)]
    conditions: Vec<RuleCondition>,
}

impl RuleCondition {
    /// Creates a validated condition without children.
    pub fn new(id: impl Into<String>, criterion: RuleCriterion) -> AppResult<Self> {
        if let RuleCriterion::Attribute {
            property,
            operator,
            values,
        } = &criterion
            && operator.has_value()
            && values.is_empty()
        {
            return Err(AppError::Validation(format!(
                "attribute criterion '{property}' with operator {operator:?} requires at least one value"
            )));
        }

        Ok(Self {
            id: NonEmptyString::new(id)?,
            criterion,
            inverse: false,
            break_type: BreakType::None,
            mode: EvaluationMode::And,
            conditions: Vec::new(),
        })
    }

    /// Convenience constructor for an attribute comparison.
    pub fn attribute(
        id: impl Into<String>,
        property: impl Into<String>,
        operator: Operator,
        values: Vec<String>,
    ) -> AppResult<Self> {
        Self::new(
            id,
            RuleCriterion::Attribute {
                property: NonEmptyString::new(property)?,
                operator,
                values,
            },
        )
    }

    /// Convenience constructor for a relation traversal.
    pub fn relation(id: impl Into<String>, relation: impl Into<String>) -> AppResult<Self> {
        Self::new(
            id,
            RuleCriterion::Relation {
                relation: NonEmptyString::new(relation)?,
            },
        )
    }

    /// Convenience constructor for a condition match.
    pub fn matches(id: impl Into<String>, condition_id: impl Into<String>) -> AppResult<Self> {
        Self::new(
            id,
            RuleCriterion::MatchesCondition {
                condition_id: NonEmptyString::new(condition_id)?,
            },
        )
    }

    /// Inverts the validity of the criterion.
    #[must_use]
    pub fn inverted(mut self) -> Self {
        self.inverse = !self.inverse;
        self
    }

    /// Sets the break type.
    #[must_use]
    pub fn with_break_type(mut self, break_type: BreakType) -> Self {
        self.break_type = break_type;
        self
    }

    /// Sets children evaluated against this condition's result state.
    #[must_use]
    pub fn with_children(mut self, mode: EvaluationMode, conditions: Vec<RuleCondition>) -> Self {
        self.mode = mode;
        self.conditions = conditions;
        self
    }

    /// Returns the condition id.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the criterion.
    #[must_use]
    pub fn criterion(&self) -> &RuleCriterion {
        &self.criterion
    }

    /// Returns whether validity is inverted.
    #[must_use]
    pub fn inverse(&self) -> bool {
        self.inverse
    }

    /// Returns the break type.
    #[must_use]
    pub fn break_type(&self) -> BreakType {
        self.break_type
    }

    /// Returns the mode combining the children.
    #[must_use]
    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    /// Returns the child conditions.
    #[must_use]
    pub fn conditions(&self) -> &[RuleCondition] {
        &self.conditions
    }
}

/// Conditions evaluated against one rulable entity kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleConditionList {
    /// Combination mode of the top-level conditions.
    #[serde(default)]
    pub mode: EvaluationMode,
    /// Top-level conditions.
    pub conditions: Vec<RuleCondition>,
}

/// Predicate tree of a rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleConstraint {
    #[serde(default)]
    conditions: BTreeMap<RulableEntity, RuleConditionList>,
    #[serde(default)]
    dependencies: Vec<NonEmptyString>,
}

impl RuleConstraint {
    /// Creates an empty constraint, which is always valid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the condition list for one kind.
    #[must_use]
    pub fn with_list(
        mut self,
        entity: RulableEntity,
        mode: EvaluationMode,
        conditions: Vec<RuleCondition>,
    ) -> Self {
        self.conditions
            .insert(entity, RuleConditionList { mode, conditions });
        self
    }

    /// Declares condition ids whose reference evaluables the rule depends on.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<NonEmptyString>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Returns condition lists in evaluation order.
    pub fn lists(&self) -> impl Iterator<Item = (RulableEntity, &RuleConditionList)> {
        self.conditions.iter().map(|(entity, list)| (*entity, list))
    }

    /// Returns declared dependency condition ids.
    #[must_use]
    pub fn dependencies(&self) -> &[NonEmptyString] {
        &self.dependencies
    }
}

/// Where a rule action applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleActionTarget {
    /// Runs the rules of another workflow action.
    Configuration {
        /// Workflow model id.
        workflow_id: NonEmptyString,
        /// Workflow action id.
        action_id: NonEmptyString,
    },
    /// Runs a static action that is not bound to an entity kind.
    Static {
        /// Static action id.
        action_id: NonEmptyString,
    },
    /// Runs an entity action on every evaluable of a kind in the data state.
    Entity {
        /// Target kind.
        entity: RulableEntity,
        /// Action plugin id.
        action_id: NonEmptyString,
    },
    /// Runs an entity action on the evaluables a condition resolved to.
    Condition {
        /// Condition id recorded during constraint evaluation.
        condition_id: NonEmptyString,
        /// Action plugin id.
        action_id: NonEmptyString,
    },
}

impl RuleActionTarget {
    /// Returns the id of the invoked action.
    #[must_use]
    pub fn action_id(&self) -> &NonEmptyString {
        match self {
            Self::Configuration { action_id, .. }
            | Self::Static { action_id }
            | Self::Entity { action_id, .. }
            | Self::Condition { action_id, .. } => action_id,
        }
    }
}

/// Where an action parameter value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterSource {
    /// Literal text passed through as is.
    Literal(String),
    /// Expression starting with `=`.
    Formula(String),
    /// Evaluables recorded for a condition id.
    Condition(NonEmptyString),
    /// Evaluables of one kind in the current data state.
    Entity(RulableEntity),
}

/// Named parameter of a rule action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActionParameter {
    id: NonEmptyString,
    source: ParameterSource,
}

impl RuleActionParameter {
    /// Creates a parameter with an explicit source.
    pub fn new(id: impl Into<String>, source: ParameterSource) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            source,
        })
    }

    /// Creates a parameter from a configured value, detecting formulas by their `=` prefix.
    pub fn from_value(id: impl Into<String>, value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let source = if value.starts_with('=') {
            ParameterSource::Formula(value)
        } else {
            ParameterSource::Literal(value)
        };
        Self::new(id, source)
    }

    /// Returns the parameter id.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the parameter source.
    #[must_use]
    pub fn source(&self) -> &ParameterSource {
        &self.source
    }
}

/// One action of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    id: NonEmptyString,
    target: RuleActionTarget,
    #[serde(default)]
    parameters: Vec<RuleActionParameter>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    label: Option<LocalizedText>,
}

impl RuleAction {
    /// Creates an action identified by its target action id.
    #[must_use]
    pub fn new(target: RuleActionTarget) -> Self {
        Self {
            id: target.action_id().clone(),
            target,
            parameters: Vec::new(),
            optional: false,
            label: None,
        }
    }

    /// Overrides the id used for blocking.
    pub fn with_id(mut self, id: impl Into<String>) -> AppResult<Self> {
        self.id = NonEmptyString::new(id)?;
        Ok(self)
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: RuleActionParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Marks the action optional: its failure does not abandon the rule.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets the localized label.
    #[must_use]
    pub fn with_label(mut self, label: LocalizedText) -> Self {
        self.label = Some(label);
        self
    }

    /// Returns the id used for blocking.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the action target.
    #[must_use]
    pub fn target(&self) -> &RuleActionTarget {
        &self.target
    }

    /// Returns the ordered parameters.
    #[must_use]
    pub fn parameters(&self) -> &[RuleActionParameter] {
        &self.parameters
    }

    /// Returns whether the action is optional.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns the localized label.
    #[must_use]
    pub fn label(&self) -> Option<&LocalizedText> {
        self.label.as_ref()
    }
}

/// Declarative rule: constraint, ordered actions and optional message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    description: String,
    #[serde(default)]
    constraint: Option<RuleConstraint>,
    #[serde(default)]
    actions: Vec<RuleAction>,
    #[serde(default)]
    message: Option<LocalizedText>,
}

impl Rule {
    /// Creates a rule without constraint, which is always valid.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            constraint: None,
            actions: Vec::new(),
            message: None,
        }
    }

    /// Sets the constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: RuleConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Appends an action.
    #[must_use]
    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Sets the message returned when the rule is valid.
    #[must_use]
    pub fn with_message(mut self, message: LocalizedText) -> Self {
        self.message = Some(message);
        self
    }

    /// Returns the description used in logs.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the constraint.
    #[must_use]
    pub fn constraint(&self) -> Option<&RuleConstraint> {
        self.constraint.as_ref()
    }

    /// Returns the ordered actions.
    #[must_use]
    pub fn actions(&self) -> &[RuleAction] {
        &self.actions
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> Option<&LocalizedText> {
        self.message.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EvaluationMode, ParameterSource, Rule, RuleAction, RuleActionParameter, RuleActionTarget,
        RuleCondition,
    };
    use crate::{Operator, RulableEntity};
    use trialdesk_core::NonEmptyString;

    #[test]
    fn comparison_without_values_is_rejected() {
        let result = RuleCondition::attribute("C1", "STATUS", Operator::Equals, Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn value_less_operator_accepts_empty_values() {
        let result = RuleCondition::attribute("C1", "VALUE", Operator::Blank, Vec::new());
        assert!(result.is_ok());
    }

    #[test]
    fn parameters_detect_formulas_by_prefix() {
        let formula = RuleActionParameter::from_value("VALUE", "=SUM(1, 2)")
            .unwrap_or_else(|_| unreachable!());
        let literal =
            RuleActionParameter::from_value("VALUE", "CLOSED").unwrap_or_else(|_| unreachable!());

        assert!(matches!(formula.source(), ParameterSource::Formula(_)));
        assert!(matches!(literal.source(), ParameterSource::Literal(_)));
    }

    #[test]
    fn action_id_defaults_to_target_action() {
        let action = RuleAction::new(RuleActionTarget::Entity {
            entity: RulableEntity::Form,
            action_id: NonEmptyString::new("REMOVE").unwrap_or_else(|_| unreachable!()),
        });
        assert_eq!(action.id().as_str(), "REMOVE");
    }

    #[test]
    fn empty_lists_combine_to_valid() {
        assert!(EvaluationMode::And.combine(&[]));
        assert!(EvaluationMode::Or.combine(&[]));
        assert!(!EvaluationMode::Or.combine(&[false, false]));
        assert!(EvaluationMode::Or.combine(&[false, true]));
    }

    #[test]
    fn rules_deserialize_from_configuration_json() {
        let rule: Rule = serde_json::from_value(serde_json::json!({
            "description": "close submitted forms",
            "constraint": {
                "conditions": {
                    "FORM": {
                        "conditions": [{
                            "id": "C0",
                            "criterion": {
                                "type": "attribute",
                                "property": "STATUS",
                                "operator": "EQUALS",
                                "values": ["SUBMITTED"]
                            }
                        }]
                    }
                }
            },
            "actions": [{
                "id": "CLOSE",
                "target": {"type": "entity", "entity": "FORM", "action_id": "CHANGE_STATUS"},
                "parameters": [{"id": "STATUS", "source": {"type": "literal", "value": "CLOSED"}}]
            }],
            "message": {"en": "Form closed"}
        }))
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(rule.actions().len(), 1);
        assert_eq!(rule.actions()[0].id().as_str(), "CLOSE");
        assert_eq!(
            rule.constraint().map(|constraint| constraint.lists().count()),
            Some(1)
        );
    }
}
