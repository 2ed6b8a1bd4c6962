use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trialdesk_core::{AppError, AppResult};

use crate::{OperandType, OperandValue};

/// Comparison operator applied by attribute criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    /// Equality comparison.
    Equals,
    /// Inequality comparison.
    NotEquals,
    /// Substring match.
    Contains,
    /// Negated substring match.
    NotContains,
    /// Strictly greater comparison.
    Greater,
    /// Greater-or-equal comparison.
    GreaterEquals,
    /// Strictly lower comparison.
    Lower,
    /// Lower-or-equal comparison.
    LowerEquals,
    /// Value is absent.
    Null,
    /// Value is present.
    NotNull,
    /// Text value is absent or whitespace.
    Blank,
    /// Value is present and not whitespace.
    NotBlank,
}

impl Operator {
    /// Returns whether the operator compares against configured values.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !matches!(
            self,
            Self::Null | Self::NotNull | Self::Blank | Self::NotBlank
        )
    }

    /// Returns whether the operator is a negation of another operator.
    #[must_use]
    pub fn is_negate(&self) -> bool {
        matches!(self, Self::NotEquals | Self::NotContains)
    }

    /// Tests a value-less operator against one attribute value.
    pub fn test_value(&self, operand_type: OperandType, value: &OperandValue) -> AppResult<bool> {
        match self {
            Self::Null => {
                check_type(operand_type, value)?;
                Ok(value.is_null())
            }
            Self::NotNull => {
                check_type(operand_type, value)?;
                Ok(!value.is_null())
            }
            Self::Blank => match operand_type {
                OperandType::String => {
                    Ok(text(value)?.is_none_or(|content| content.trim().is_empty()))
                }
                _ => Err(self.unsupported(operand_type)),
            },
            Self::NotBlank => match operand_type {
                OperandType::String => {
                    Ok(text(value)?.is_some_and(|content| !content.trim().is_empty()))
                }
                _ => {
                    check_type(operand_type, value)?;
                    Ok(!value.is_null())
                }
            },
            _ => Err(AppError::Unsupported(format!(
                "operator {self:?} requires a value to compare with"
            ))),
        }
    }

    /// Tests a comparison operator between an attribute value and a configured value.
    pub fn test_pair(
        &self,
        operand_type: OperandType,
        left: &OperandValue,
        right: &OperandValue,
    ) -> AppResult<bool> {
        check_type(operand_type, left)?;
        check_type(operand_type, right)?;

        match self {
            Self::Equals => Ok(match operand_type {
                OperandType::Number => match (left.as_f64(), right.as_f64()) {
                    (None, None) => true,
                    (Some(left), Some(right)) => left == right,
                    _ => false,
                },
                _ => !left.is_null() && left == right,
            }),
            Self::NotEquals => Ok(match operand_type {
                OperandType::Number => match (left.as_f64(), right.as_f64()) {
                    (None, None) => false,
                    (Some(left), Some(right)) => left != right,
                    _ => true,
                },
                _ => (left.is_null() && right.is_null()) || (!left.is_null() && left != right),
            }),
            Self::Contains | Self::NotContains => {
                if operand_type != OperandType::String {
                    return Err(self.unsupported(operand_type));
                }
                let needle = text(right)?.unwrap_or_default();
                let contains = text(left)?.is_some_and(|haystack| haystack.contains(needle));
                Ok(if *self == Self::Contains {
                    contains
                } else {
                    !contains
                })
            }
            Self::Greater | Self::GreaterEquals | Self::Lower | Self::LowerEquals => {
                let ordering = match operand_type {
                    OperandType::Number => match (left.as_f64(), right.as_f64()) {
                        (Some(left), Some(right)) => left.partial_cmp(&right),
                        _ => None,
                    },
                    OperandType::Date => match (date(left), date(right)) {
                        (Some(left), Some(right)) => Some(left.cmp(&right)),
                        _ => None,
                    },
                    _ => return Err(self.unsupported(operand_type)),
                };
                Ok(ordering.is_some_and(|ordering| match self {
                    Self::Greater => ordering.is_gt(),
                    Self::GreaterEquals => ordering.is_ge(),
                    Self::Lower => ordering.is_lt(),
                    _ => ordering.is_le(),
                }))
            }
            _ => Err(AppError::Unsupported(format!(
                "operator {self:?} does not compare two values"
            ))),
        }
    }

    fn unsupported(&self, operand_type: OperandType) -> AppError {
        AppError::Unsupported(format!(
            "operator {self:?} is not supported for {} operands",
            operand_type.as_str()
        ))
    }
}

fn check_type(operand_type: OperandType, value: &OperandValue) -> AppResult<()> {
    let matches = match value {
        OperandValue::Null => true,
        OperandValue::String(_) => operand_type == OperandType::String,
        OperandValue::Number(_) => operand_type == OperandType::Number,
        OperandValue::Date(_) => operand_type == OperandType::Date,
        OperandValue::Boolean(_) => operand_type == OperandType::Boolean,
    };

    if matches {
        return Ok(());
    }

    Err(AppError::Unsupported(format!(
        "{} value cannot be compared as {}",
        value.type_name(),
        operand_type.as_str()
    )))
}

fn text(value: &OperandValue) -> AppResult<Option<&str>> {
    match value {
        OperandValue::Null => Ok(None),
        OperandValue::String(content) => Ok(Some(content.as_str())),
        other => Err(AppError::Unsupported(format!(
            "{} value is not text",
            other.type_name()
        ))),
    }
}

fn date(value: &OperandValue) -> Option<DateTime<Utc>> {
    value.as_date()
}
