//! Shared primitives for all Rust crates in Trialdesk.

#![forbid(unsafe_code)]

/// Actor and audit-action envelope threaded through every mutation.
pub mod context;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use context::{Actor, AuditActionRef, DatabaseActionContext};

/// Result type used across Trialdesk crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated configuration constraint.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A rule references an attribute, relation or action that is not registered.
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    /// A formula could not be calculated.
    #[error("formula error: {0}")]
    Formula(String),

    /// A persistence invariant was violated; the write was rejected.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Operation is not supported for the given value or object.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the error must abort the enclosing transaction.
    ///
    /// Rule execution isolates every other failure at the rule boundary.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::Internal(_))
    }
}
