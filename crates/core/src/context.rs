use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Principal responsible for a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    /// Human user acting through the application.
    User {
        /// User primary key.
        pk: i64,
        /// Display name recorded in audit trails.
        name: String,
    },
    /// Scheduled task or integration account.
    Robot {
        /// Robot primary key.
        pk: i64,
        /// Display name recorded in audit trails.
        name: String,
    },
}

impl Actor {
    /// Returns the actor primary key.
    #[must_use]
    pub fn pk(&self) -> i64 {
        match self {
            Self::User { pk, .. } | Self::Robot { pk, .. } => *pk,
        }
    }

    /// Returns the actor display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User { name, .. } | Self::Robot { name, .. } => name.as_str(),
        }
    }
}

/// Persisted audit action that groups every write of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActionRef {
    /// Audit action primary key.
    pub pk: i64,
    /// Operation time applied to every write of the action.
    pub date: DateTime<Utc>,
}

/// Envelope supplied by the caller for every persistence call and rule action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseActionContext {
    actor: Option<Actor>,
    audit_action: AuditActionRef,
    is_system_action: bool,
}

impl DatabaseActionContext {
    /// Creates a context for an actor-driven operation.
    #[must_use]
    pub fn new(actor: Option<Actor>, audit_action: AuditActionRef) -> Self {
        Self {
            actor,
            audit_action,
            is_system_action: false,
        }
    }

    /// Creates a context for an operation initiated by the platform itself.
    #[must_use]
    pub fn system(audit_action: AuditActionRef) -> Self {
        Self {
            actor: None,
            audit_action,
            is_system_action: true,
        }
    }

    /// Returns the acting principal, if any.
    #[must_use]
    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Returns the audit action the context writes under.
    #[must_use]
    pub fn audit_action(&self) -> AuditActionRef {
        self.audit_action
    }

    /// Returns the operation time.
    #[must_use]
    pub fn operation_time(&self) -> DateTime<Utc> {
        self.audit_action.date
    }

    /// Returns whether the platform initiated the operation.
    #[must_use]
    pub fn is_system_action(&self) -> bool {
        self.is_system_action
    }

    /// Returns the name recorded in audit trails.
    #[must_use]
    pub fn actor_name(&self) -> &str {
        match &self.actor {
            Some(actor) => actor.name(),
            None if self.is_system_action => "SYSTEM",
            None => "UNKNOWN",
        }
    }
}
