use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trialdesk_core::{Actor, DatabaseActionContext};

/// Append-only snapshot of an auditable object after one write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pk: Option<i64>,
    table: String,
    object_pk: i64,
    snapshot: Value,
    actor_name: String,
    actor_user_fk: Option<i64>,
    actor_robot_fk: Option<i64>,
    audit_action_fk: i64,
    datetime: DateTime<Utc>,
    rationale: Option<String>,
}

impl AuditTrail {
    /// Builds an unsaved audit row attributed to the context.
    #[must_use]
    pub fn record(
        table: impl Into<String>,
        object_pk: i64,
        snapshot: Value,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> Self {
        let (actor_user_fk, actor_robot_fk) = match context.actor() {
            Some(Actor::User { pk, .. }) => (Some(*pk), None),
            Some(Actor::Robot { pk, .. }) => (None, Some(*pk)),
            None => (None, None),
        };

        Self {
            pk: None,
            table: table.into(),
            object_pk,
            snapshot,
            actor_name: context.actor_name().to_owned(),
            actor_user_fk,
            actor_robot_fk,
            audit_action_fk: context.audit_action().pk,
            datetime: context.operation_time(),
            rationale: rationale
                .map(str::trim)
                .filter(|rationale| !rationale.is_empty())
                .map(str::to_owned),
        }
    }

    /// Returns a copy carrying the primary key allocated by the store.
    #[must_use]
    pub fn with_pk(mut self, pk: i64) -> Self {
        self.pk = Some(pk);
        self
    }

    /// Returns the primary key.
    #[must_use]
    pub fn pk(&self) -> Option<i64> {
        self.pk
    }

    /// Returns the audited table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the audited object key.
    #[must_use]
    pub fn object_pk(&self) -> i64 {
        self.object_pk
    }

    /// Returns the persisted fields at write time.
    #[must_use]
    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }

    /// Returns one property of the snapshot.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.snapshot.get(name)
    }

    /// Returns the recorded actor name.
    #[must_use]
    pub fn actor_name(&self) -> &str {
        self.actor_name.as_str()
    }

    /// Returns the acting user key.
    #[must_use]
    pub fn actor_user_fk(&self) -> Option<i64> {
        self.actor_user_fk
    }

    /// Returns the acting robot key.
    #[must_use]
    pub fn actor_robot_fk(&self) -> Option<i64> {
        self.actor_robot_fk
    }

    /// Returns the audit action key.
    #[must_use]
    pub fn audit_action_fk(&self) -> i64 {
        self.audit_action_fk
    }

    /// Returns the write time.
    #[must_use]
    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    /// Returns the non-blank rationale.
    #[must_use]
    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }
}

/// Inclusive time window for audit trail queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timeframe {
    /// Lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl Timeframe {
    /// Returns whether the instant falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| from <= instant) && self.to.is_none_or(|to| instant <= to)
    }
}
