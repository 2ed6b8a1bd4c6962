use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use trialdesk_core::AppError;

/// Closed set of domain kinds the rule engine can reason about.
///
/// Declaration order is the order in which constraint condition lists are
/// evaluated, so a condition may reference any condition of an earlier kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulableEntity {
    /// Study scope (study, country, center, patient).
    Scope,
    /// Visit or other timeline event of a scope.
    Event,
    /// Data-entry form.
    Form,
    /// Single captured value.
    Field,
    /// Workflow status attached to a scope, event, form or field.
    Workflow,
}

impl RulableEntity {
    /// All kinds in evaluation order.
    pub const ALL: [Self; 5] = [
        Self::Scope,
        Self::Event,
        Self::Form,
        Self::Field,
        Self::Workflow,
    ];

    /// Returns stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scope => "SCOPE",
            Self::Event => "EVENT",
            Self::Form => "FORM",
            Self::Field => "FIELD",
            Self::Workflow => "WORKFLOW",
        }
    }
}

impl Display for RulableEntity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for RulableEntity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|entity| entity.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown rulable entity '{value}'")))
    }
}

/// Plugin namespaces registered per rulable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginType {
    /// Reads a typed scalar off an evaluable.
    Attribute,
    /// Navigates from one evaluable to evaluables of another kind.
    Relation,
    /// Performs a parameterized mutation on an evaluable.
    Action,
}

impl PluginType {
    /// Returns stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attribute => "ATTRIBUTE",
            Self::Relation => "RELATION",
            Self::Action => "ACTION",
        }
    }
}

impl Display for PluginType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identity of one domain object taking part in rule evaluation.
///
/// Evaluables carry identity only; plugins resolve the current object state
/// through the owning domain service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Evaluable {
    entity: RulableEntity,
    pk: i64,
}

impl Evaluable {
    /// Creates an evaluable identity.
    #[must_use]
    pub fn new(entity: RulableEntity, pk: i64) -> Self {
        Self { entity, pk }
    }

    /// Returns the evaluable kind.
    #[must_use]
    pub fn entity(&self) -> RulableEntity {
        self.entity
    }

    /// Returns the persisted primary key.
    #[must_use]
    pub fn pk(&self) -> i64 {
        self.pk
    }
}

impl Display for Evaluable {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}#{}", self.entity, self.pk)
    }
}

#[cfg(test)]
mod tests {
    use super::{Evaluable, RulableEntity};

    #[test]
    fn rulable_entities_round_trip_through_configuration_values() {
        for entity in RulableEntity::ALL {
            let parsed = entity.as_str().parse::<RulableEntity>();
            assert_eq!(parsed.ok(), Some(entity));
        }
        assert!("DATASET".parse::<RulableEntity>().is_err());
    }

    #[test]
    fn evaluation_order_follows_declaration_order() {
        let mut shuffled = vec![
            RulableEntity::Workflow,
            RulableEntity::Scope,
            RulableEntity::Field,
            RulableEntity::Event,
            RulableEntity::Form,
        ];
        shuffled.sort();
        assert_eq!(shuffled, RulableEntity::ALL.to_vec());
    }

    #[test]
    fn evaluable_displays_kind_and_key() {
        let evaluable = Evaluable::new(RulableEntity::Form, 12);
        assert_eq!(evaluable.to_string(), "FORM#12");
    }
}
