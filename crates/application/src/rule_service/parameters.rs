use tracing::warn;
use trialdesk_core::{AppError, AppResult, DatabaseActionContext};
use trialdesk_domain::{DataEvaluation, DataState, OperandValue, ParameterSource, RuleAction};

use super::RuleEngine;
use crate::formula_service::{FormulaEvaluator, StateAttributeReader};
use crate::plugin_registry::{ActionParameters, ParameterValue};

/// Resolves the parameters of one action.
///
/// Formulas that cannot be computed are logged and left out, so the action
/// sees the parameter as absent.
pub(super) fn resolve_parameters(
    engine: &RuleEngine,
    state: &DataState,
    evaluation: &DataEvaluation,
    action: &RuleAction,
    context: &DatabaseActionContext,
) -> AppResult<ActionParameters> {
    let reader =
        StateAttributeReader::new(&engine.registry, &engine.services, evaluation.states());
    let formulas = FormulaEvaluator::new(&reader, context.operation_time());

    let mut parameters = ActionParameters::new();
    for parameter in action.parameters() {
        let id = parameter.id().as_str();
        let value = match parameter.source() {
            ParameterSource::Literal(text) => {
                ParameterValue::Value(OperandValue::String(text.clone()))
            }
            ParameterSource::Formula(formula) => match formulas.evaluate(formula) {
                Ok(value) => ParameterValue::Value(value),
                Err(error) => {
                    warn!(
                        action = action.id().as_str(),
                        parameter = id,
                        formula = %formula,
                        error = %error,
                        "formula parameter omitted"
                    );
                    continue;
                }
            },
            ParameterSource::Condition(condition_id) => {
                let recorded = evaluation.state(condition_id.as_str()).ok_or_else(|| {
                    AppError::Validation(format!(
                        "parameter '{id}' references unknown condition '{condition_id}'"
                    ))
                })?;
                ParameterValue::Evaluables(recorded.reference_evaluables().into_iter().collect())
            }
            ParameterSource::Entity(entity) => ParameterValue::Evaluables(state.evaluables(*entity)),
        };
        parameters.insert(id, value);
    }
    Ok(parameters)
}
