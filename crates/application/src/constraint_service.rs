use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use trialdesk_core::{AppError, AppResult};
use trialdesk_domain::{
    BreakType, DataEvaluation, DataState, EvaluationMode, OperandType, OperandValue, Operator,
    RuleCondition, RuleConstraint, RuleCriterion,
};

use crate::domain_services::DomainServices;
use crate::formula_service::{FormulaEvaluator, StateAttributeReader};
use crate::plugin_registry::EntityPluginRegistry;

/// Validity of a condition subtree, or a break that decides the whole constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Evaluated(bool),
    Break(bool),
}

/// Evaluates rule constraints against a data state without side effects.
pub struct ConstraintEvaluator<'a> {
    registry: &'a EntityPluginRegistry,
    services: &'a DomainServices,
    today: DateTime<Utc>,
}

impl<'a> ConstraintEvaluator<'a> {
    /// Creates an evaluator; `today` is the value formulas see for `TODAY()`.
    #[must_use]
    pub fn new(
        registry: &'a EntityPluginRegistry,
        services: &'a DomainServices,
        today: DateTime<Utc>,
    ) -> Self {
        Self {
            registry,
            services,
            today,
        }
    }

    /// Evaluates a constraint; a missing constraint is always valid.
    ///
    /// Every evaluated condition records its resulting sub-state, whether
    /// it passed or not, so actions and formulas can address it by id.
    pub fn evaluate(
        &self,
        initial: &DataState,
        constraint: Option<&RuleConstraint>,
    ) -> AppResult<DataEvaluation> {
        let mut evaluation = DataEvaluation::new(true);
        let Some(constraint) = constraint else {
            return Ok(evaluation);
        };

        let mut valid = true;
        for (entity, list) in constraint.lists() {
            let state = initial.with_reference(entity);
            match self.evaluate_conditions(&state, list.mode, &list.conditions, &mut evaluation)? {
                Outcome::Evaluated(list_valid) => valid &= list_valid,
                Outcome::Break(decided) => {
                    debug!(entity = %entity, valid = decided, "constraint evaluation stopped by a break");
                    valid = decided;
                    break;
                }
            }
        }

        evaluation.set_valid(valid);
        for dependency in constraint.dependencies() {
            evaluation.add_dependency(dependency.as_str());
        }
        Ok(evaluation)
    }

    fn evaluate_conditions(
        &self,
        state: &DataState,
        mode: EvaluationMode,
        conditions: &[RuleCondition],
        evaluation: &mut DataEvaluation,
    ) -> AppResult<Outcome> {
        let mut results = Vec::with_capacity(conditions.len());
        for condition in conditions {
            match self.evaluate_condition(state, condition, evaluation)? {
                Outcome::Evaluated(valid) => results.push(valid),
                decided @ Outcome::Break(_) => return Ok(decided),
            }
        }
        Ok(Outcome::Evaluated(mode.combine(&results)))
    }

    fn evaluate_condition(
        &self,
        state: &DataState,
        condition: &RuleCondition,
        evaluation: &mut DataEvaluation,
    ) -> AppResult<Outcome> {
        let result = self.apply_criterion(state, condition.criterion(), evaluation)?;
        let valid = condition.inverse() ^ result.is_valid();
        evaluation.record(condition.id().as_str(), result.clone());
        debug!(
            condition = condition.id().as_str(),
            inverse = condition.inverse(),
            valid,
            "condition evaluated"
        );

        if !valid {
            match condition.break_type() {
                BreakType::None => {}
                BreakType::Allow => return Ok(Outcome::Break(true)),
                BreakType::Deny => return Ok(Outcome::Break(false)),
            }
        }

        if condition.conditions().is_empty() {
            return Ok(Outcome::Evaluated(valid));
        }
        match self.evaluate_conditions(&result, condition.mode(), condition.conditions(), evaluation)? {
            Outcome::Evaluated(children_valid) => Ok(Outcome::Evaluated(valid && children_valid)),
            decided @ Outcome::Break(_) => Ok(decided),
        }
    }

    fn apply_criterion(
        &self,
        state: &DataState,
        criterion: &RuleCriterion,
        evaluation: &DataEvaluation,
    ) -> AppResult<DataState> {
        let reference = state.reference();
        match criterion {
            RuleCriterion::Attribute {
                property,
                operator,
                values,
            } => {
                let attribute = self.registry.attribute(reference, property.as_str())?;
                let operand_type = attribute.operand_type();
                let expected = if operator.has_value() {
                    self.expected_values(operand_type, values, evaluation)?
                } else {
                    Vec::new()
                };

                let mut matching = Vec::new();
                for evaluable in state.reference_evaluables() {
                    let actual = attribute.value(self.services, evaluable)?;
                    if matches_any(*operator, operand_type, &actual, &expected)? {
                        matching.push(evaluable);
                    }
                }
                Ok(state.with_evaluables(reference, matching))
            }
            RuleCriterion::MatchesCondition { condition_id } => {
                let recorded = evaluation.state(condition_id.as_str()).ok_or_else(|| {
                    AppError::Validation(format!(
                        "condition '{condition_id}' is referenced before it was evaluated"
                    ))
                })?;
                let current = state.reference_evaluables();
                let matching = if recorded.reference_evaluables() == current {
                    current
                } else {
                    Default::default()
                };
                Ok(state.with_evaluables(reference, matching))
            }
            RuleCriterion::Relation { relation } => {
                let relation = self.registry.relation(reference, relation.as_str())?;
                let mut related = Vec::new();
                for evaluable in state.reference_evaluables() {
                    related.extend(relation.related(self.services, evaluable)?);
                }
                Ok(state.with_evaluables(relation.target(), related))
            }
        }
    }

    /// Parses literals and resolves formulas; unresolvable formulas are dropped.
    fn expected_values(
        &self,
        operand_type: OperandType,
        values: &[String],
        evaluation: &DataEvaluation,
    ) -> AppResult<Vec<OperandValue>> {
        let reader = StateAttributeReader::new(self.registry, self.services, evaluation.states());
        let formulas = FormulaEvaluator::new(&reader, self.today);

        let mut expected = Vec::with_capacity(values.len());
        for value in values {
            if value.starts_with('=') {
                match formulas.evaluate(value) {
                    Ok(resolved) => expected.push(resolved),
                    Err(error) => warn!(formula = %value, error = %error, "formula value dropped"),
                }
            } else {
                expected.push(OperandValue::parse_literal(operand_type, value)?);
            }
        }
        Ok(expected)
    }
}

fn matches_any(
    operator: Operator,
    operand_type: OperandType,
    actual: &OperandValue,
    expected: &[OperandValue],
) -> AppResult<bool> {
    if !operator.has_value() {
        return operator.test_value(operand_type, actual);
    }
    for value in expected {
        if operator.test_pair(operand_type, actual, value)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests;
