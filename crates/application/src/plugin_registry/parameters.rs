use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use trialdesk_core::{AppError, AppResult, DatabaseActionContext};
use trialdesk_domain::{Evaluable, OperandType, OperandValue};

use crate::domain_services::DomainServices;

/// Resolved value of one action parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Literal text or formula result.
    Value(OperandValue),
    /// Evaluables of a condition or of a kind.
    Evaluables(Vec<Evaluable>),
}

/// Resolved parameters of one action invocation keyed by parameter id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionParameters {
    values: BTreeMap<String, ParameterValue>,
}

impl ActionParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one parameter.
    pub fn insert(&mut self, id: impl Into<String>, value: ParameterValue) {
        self.values.insert(id.into(), value);
    }

    /// Returns one raw parameter.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ParameterValue> {
        self.values.get(id)
    }

    /// Returns whether a parameter was resolved.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Returns the number of resolved parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether no parameter was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a scalar parameter rendered as text.
    pub fn text(&self, id: &str) -> AppResult<Option<String>> {
        match self.values.get(id) {
            None | Some(ParameterValue::Value(OperandValue::Null)) => Ok(None),
            Some(ParameterValue::Value(value)) => Ok(Some(value.to_string())),
            Some(ParameterValue::Evaluables(_)) => Err(expected_scalar(id)),
        }
    }

    /// Returns a scalar parameter rendered as text, failing when absent.
    pub fn required_text(&self, id: &str) -> AppResult<String> {
        self.text(id)?
            .ok_or_else(|| AppError::Validation(format!("parameter '{id}' is required")))
    }

    /// Returns a date parameter; text is parsed as a `dd.MM.yyyy` literal.
    pub fn date(&self, id: &str) -> AppResult<Option<DateTime<Utc>>> {
        match self.values.get(id) {
            None | Some(ParameterValue::Value(OperandValue::Null)) => Ok(None),
            Some(ParameterValue::Value(OperandValue::Date(date))) => Ok(Some(*date)),
            Some(ParameterValue::Value(OperandValue::String(text))) => {
                Ok(OperandValue::parse_literal(OperandType::Date, text)?.as_date())
            }
            Some(_) => Err(AppError::Validation(format!(
                "parameter '{id}' must be a date"
            ))),
        }
    }

    /// Returns a flag parameter or `default` when absent.
    pub fn flag(&self, id: &str, default: bool) -> AppResult<bool> {
        match self.values.get(id) {
            None | Some(ParameterValue::Value(OperandValue::Null)) => Ok(default),
            Some(ParameterValue::Value(OperandValue::Boolean(flag))) => Ok(*flag),
            Some(ParameterValue::Value(OperandValue::String(text))) => {
                Ok(text.trim().eq_ignore_ascii_case("true"))
            }
            Some(_) => Err(AppError::Validation(format!(
                "parameter '{id}' must be a flag"
            ))),
        }
    }

    /// Returns an evaluable-set parameter.
    pub fn evaluables(&self, id: &str) -> AppResult<Vec<Evaluable>> {
        match self.values.get(id) {
            None => Ok(Vec::new()),
            Some(ParameterValue::Evaluables(evaluables)) => Ok(evaluables.clone()),
            Some(ParameterValue::Value(_)) => Err(AppError::Validation(format!(
                "parameter '{id}' must reference a condition or an entity kind"
            ))),
        }
    }

    /// Returns every parameter as a JSON object for logging.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(id, value)| {
                    let value = match value {
                        ParameterValue::Value(value) => Value::String(value.to_string()),
                        ParameterValue::Evaluables(evaluables) => Value::Array(
                            evaluables
                                .iter()
                                .map(|evaluable| Value::String(evaluable.to_string()))
                                .collect(),
                        ),
                    };
                    (id.clone(), value)
                })
                .collect(),
        )
    }
}

fn expected_scalar(id: &str) -> AppError {
    AppError::Validation(format!("parameter '{id}' must be a value"))
}

/// Everything an action receives besides its target.
pub struct ActionInvocation<'a> {
    /// Domain services performing the mutation.
    pub services: &'a DomainServices,
    /// Resolved parameters.
    pub parameters: &'a ActionParameters,
    /// Caller envelope used for auditing.
    pub context: &'a DatabaseActionContext,
    /// Free-text message from the caller, recorded as audit rationale.
    pub message: Option<&'a str>,
    /// Free-form data from the caller.
    pub data: &'a Map<String, Value>,
}
