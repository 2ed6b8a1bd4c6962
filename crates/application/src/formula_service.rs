use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use trialdesk_core::AppError;
use trialdesk_domain::{DataState, OperandValue};

use crate::domain_services::DomainServices;
use crate::plugin_registry::EntityPluginRegistry;

mod functions;
mod parser;

pub use functions::is_known_function;
pub use parser::{FormulaExpr, parse_formula};

/// Recoverable failure while parsing or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula text does not follow the grammar.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Function name is not part of the library.
    #[error("unknown function {0}")]
    UnknownFunction(String),
    /// Function called with the wrong number of arguments.
    #[error("{function} expects {expected} arguments, got {actual}")]
    Arity {
        /// Function name.
        function: &'static str,
        /// Human readable expectation, for example `2` or `at least 2`.
        expected: String,
        /// Number of arguments given.
        actual: usize,
    },
    /// Argument of the wrong type.
    #[error("{function} argument {position} must be a {expected}, got {actual}")]
    Type {
        /// Function name.
        function: &'static str,
        /// Zero-based argument position.
        position: usize,
        /// Expected operand type.
        expected: &'static str,
        /// Actual operand type.
        actual: &'static str,
    },
    /// Null argument where a value is required.
    #[error("{function} argument {position} is null")]
    Null {
        /// Function name.
        function: &'static str,
        /// Zero-based argument position.
        position: usize,
    },
    /// Computation without a defined result.
    #[error("{function}: {reason}")]
    Arithmetic {
        /// Function name.
        function: &'static str,
        /// What went wrong.
        reason: String,
    },
    /// A `condition:ATTRIBUTE` operand could not be read.
    #[error("cannot resolve {operand}: {reason}")]
    Resolution {
        /// The operand as written.
        operand: String,
        /// What went wrong.
        reason: String,
    },
}

impl From<FormulaError> for AppError {
    fn from(error: FormulaError) -> Self {
        AppError::Formula(error.to_string())
    }
}

/// Source of `condition:ATTRIBUTE` operand values.
pub trait AttributeReader {
    /// Reads one attribute of the first reference evaluable of a condition.
    fn read(&self, condition_id: &str, attribute: &str) -> Result<OperandValue, FormulaError>;
}

/// Reads operands from the sub-states recorded during constraint evaluation.
pub struct StateAttributeReader<'a> {
    registry: &'a EntityPluginRegistry,
    services: &'a DomainServices,
    states: &'a BTreeMap<String, DataState>,
}

impl<'a> StateAttributeReader<'a> {
    /// Creates a reader over recorded condition states.
    #[must_use]
    pub fn new(
        registry: &'a EntityPluginRegistry,
        services: &'a DomainServices,
        states: &'a BTreeMap<String, DataState>,
    ) -> Self {
        Self {
            registry,
            services,
            states,
        }
    }
}

impl AttributeReader for StateAttributeReader<'_> {
    fn read(&self, condition_id: &str, attribute: &str) -> Result<OperandValue, FormulaError> {
        let resolution = |reason: String| FormulaError::Resolution {
            operand: format!("{condition_id}:{attribute}"),
            reason,
        };

        let state = self
            .states
            .get(condition_id)
            .ok_or_else(|| resolution("no condition with this id was evaluated".to_owned()))?;
        let Some(evaluable) = state.first_reference_evaluable() else {
            return Ok(OperandValue::Null);
        };

        self.registry
            .attribute(state.reference(), attribute)
            .and_then(|plugin| plugin.value(self.services, evaluable))
            .map_err(|error| resolution(error.to_string()))
    }
}

/// Evaluates `=` formulas against an attribute source.
pub struct FormulaEvaluator<'a> {
    reader: &'a dyn AttributeReader,
    today: DateTime<Utc>,
}

impl<'a> FormulaEvaluator<'a> {
    /// Creates an evaluator; `today` is the value of `TODAY()`.
    #[must_use]
    pub fn new(reader: &'a dyn AttributeReader, today: DateTime<Utc>) -> Self {
        Self { reader, today }
    }

    /// Parses and evaluates one formula.
    pub fn evaluate(&self, formula: &str) -> Result<OperandValue, FormulaError> {
        let expression = parse_formula(formula)?;
        let value = self.evaluate_expression(&expression)?;
        debug!(formula, value = %value, "formula evaluated");
        Ok(value)
    }

    fn evaluate_expression(&self, expression: &FormulaExpr) -> Result<OperandValue, FormulaError> {
        match expression {
            FormulaExpr::Number(number) => Ok(OperandValue::Number(*number)),
            FormulaExpr::Text(text) => Ok(OperandValue::String(text.clone())),
            FormulaExpr::Attribute {
                condition_id,
                attribute,
            } => self.reader.read(condition_id, attribute),
            FormulaExpr::Call { function, arguments } => {
                let values = arguments
                    .iter()
                    .map(|argument| self.evaluate_expression(argument))
                    .collect::<Result<Vec<_>, _>>()?;
                functions::call(function, &values, self.today)
            }
        }
    }
}
