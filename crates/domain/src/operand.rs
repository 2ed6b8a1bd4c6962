use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use trialdesk_core::{AppError, AppResult};

/// Date format used by literal date operands in rule configuration.
pub const LITERAL_DATE_FORMAT: &str = "%d.%m.%Y";

/// Value type exposed by an attribute plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperandType {
    /// Free text.
    String,
    /// Floating-point number.
    Number,
    /// Point in time.
    Date,
    /// Flag.
    Boolean,
}

impl OperandType {
    /// Returns stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Date => "DATE",
            Self::Boolean => "BOOLEAN",
        }
    }
}

/// Typed scalar read from an attribute or computed by a formula.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OperandValue {
    /// Absent value.
    #[default]
    Null,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Date value.
    Date(DateTime<Utc>),
    /// Boolean value.
    Boolean(bool),
}

impl OperandValue {
    /// Parses a configured literal for the given operand type.
    pub fn parse_literal(operand_type: OperandType, literal: &str) -> AppResult<Self> {
        match operand_type {
            OperandType::String => Ok(Self::String(literal.to_owned())),
            OperandType::Number => literal.trim().parse::<f64>().map(Self::Number).map_err(|_| {
                AppError::Validation(format!("'{literal}' is not a valid number literal"))
            }),
            OperandType::Boolean => Ok(Self::Boolean(literal.trim().eq_ignore_ascii_case("true"))),
            OperandType::Date => NaiveDate::parse_from_str(literal.trim(), LITERAL_DATE_FORMAT)
                .map(|date| Self::Date(date.and_time(chrono::NaiveTime::MIN).and_utc()))
                .map_err(|_| {
                    AppError::Validation(format!(
                        "'{literal}' is not a valid date literal, expected dd.MM.yyyy"
                    ))
                }),
        }
    }

    /// Builds a text value from an optional string.
    #[must_use]
    pub fn from_optional_str(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |text| Self::String(text.to_owned()))
    }

    /// Builds a date value from an optional date.
    #[must_use]
    pub fn from_optional_date(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(Self::Null, Self::Date)
    }

    /// Returns whether the value is absent.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the numeric payload.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the date payload.
    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns a short label for the value type, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::Boolean(_) => "boolean",
        }
    }
}

impl Display for OperandValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => formatter.write_str(""),
            Self::String(value) => formatter.write_str(value),
            Self::Number(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(formatter, "{}", *value as i64)
                } else {
                    write!(formatter, "{value}")
                }
            }
            Self::Date(value) => write!(formatter, "{}", value.format(LITERAL_DATE_FORMAT)),
            Self::Boolean(value) => write!(formatter, "{value}"),
        }
    }
}
