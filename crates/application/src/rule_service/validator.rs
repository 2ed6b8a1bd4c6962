use std::collections::BTreeMap;

use serde::Serialize;
use trialdesk_domain::{
    ParameterSource, PluginType, RulableEntity, Rule, RuleAction, RuleActionTarget, RuleCatalog,
    RuleCondition, RuleCriterion,
};

use crate::formula_service::parse_formula;
use crate::plugin_registry::EntityPluginRegistry;

/// Problem found in a rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleValidationIssue {
    /// Where the rule lives, for example `REVIEW/CLOSE`.
    pub location: String,
    /// Rule description.
    pub rule: String,
    /// What is wrong.
    pub problem: String,
}

/// Checks rule configuration against the registry and the catalog up front.
///
/// Execution resolves every reference lazily regardless; this pass only
/// reports problems early.
pub struct RuleValidator<'a> {
    registry: &'a EntityPluginRegistry,
    catalog: &'a RuleCatalog,
}

impl<'a> RuleValidator<'a> {
    /// Creates a validator.
    #[must_use]
    pub fn new(registry: &'a EntityPluginRegistry, catalog: &'a RuleCatalog) -> Self {
        Self { registry, catalog }
    }

    /// Validates the rules of every workflow action in the catalog.
    #[must_use]
    pub fn validate_catalog(&self) -> Vec<RuleValidationIssue> {
        let mut issues = Vec::new();
        for workflow in self.catalog.workflows() {
            for action in workflow.actions() {
                let location = format!("{}/{}", workflow.id(), action.id());
                issues.extend(self.validate_rules(&location, action.rules()));
            }
        }
        issues
    }

    /// Validates a list of rules.
    #[must_use]
    pub fn validate_rules(&self, location: &str, rules: &[Rule]) -> Vec<RuleValidationIssue> {
        let mut issues = Vec::new();
        for rule in rules {
            let mut report = |problem: String| {
                issues.push(RuleValidationIssue {
                    location: location.to_owned(),
                    rule: rule.description().to_owned(),
                    problem,
                });
            };

            let mut conditions = BTreeMap::new();
            if let Some(constraint) = rule.constraint() {
                for (entity, list) in constraint.lists() {
                    for condition in &list.conditions {
                        self.check_condition(entity, condition, &mut conditions, &mut report);
                    }
                }
                for dependency in constraint.dependencies() {
                    if !conditions.contains_key(dependency.as_str()) {
                        report(format!("dependency on unknown condition '{dependency}'"));
                    }
                }
            }
            for action in rule.actions() {
                self.check_action(action, &conditions, &mut report);
            }
        }
        issues
    }

    /// Walks a condition tree, recording the kind every condition resolves to.
    fn check_condition(
        &self,
        entity: RulableEntity,
        condition: &RuleCondition,
        conditions: &mut BTreeMap<String, RulableEntity>,
        report: &mut impl FnMut(String),
    ) {
        let id = condition.id().as_str();
        let mut resolved = entity;
        match condition.criterion() {
            RuleCriterion::Attribute {
                property, values, ..
            } => {
                if !self.registry.exists(entity, PluginType::Attribute, property.as_str()) {
                    report(format!("condition '{id}': unknown attribute {entity}/{property}"));
                }
                for formula in values.iter().filter(|value| value.starts_with('=')) {
                    if let Err(error) = parse_formula(formula) {
                        report(format!("condition '{id}': invalid formula {formula}: {error}"));
                    }
                }
            }
            RuleCriterion::MatchesCondition { condition_id } => {
                if !conditions.contains_key(condition_id.as_str()) {
                    report(format!(
                        "condition '{id}' matches '{condition_id}', which is not evaluated before it"
                    ));
                }
            }
            RuleCriterion::Relation { relation } => {
                match self.registry.relation(entity, relation.as_str()) {
                    Ok(plugin) => resolved = plugin.target(),
                    Err(_) => {
                        report(format!("condition '{id}': unknown relation {entity}/{relation}"));
                    }
                }
            }
        }

        if conditions.insert(id.to_owned(), resolved).is_some() {
            report(format!("condition id '{id}' is used more than once"));
        }
        for child in condition.conditions() {
            self.check_condition(resolved, child, conditions, report);
        }
    }

    fn check_action(
        &self,
        action: &RuleAction,
        conditions: &BTreeMap<String, RulableEntity>,
        report: &mut impl FnMut(String),
    ) {
        let id = action.id();
        match action.target() {
            RuleActionTarget::Configuration {
                workflow_id,
                action_id,
            } => {
                if self
                    .catalog
                    .action_rules(workflow_id.as_str(), action_id.as_str())
                    .is_err()
                {
                    report(format!(
                        "action '{id}': unknown workflow action {workflow_id}/{action_id}"
                    ));
                }
            }
            RuleActionTarget::Static { action_id } => {
                if !self.registry.static_exists(action_id.as_str()) {
                    report(format!("action '{id}': unknown static action {action_id}"));
                }
            }
            RuleActionTarget::Entity { entity, action_id } => {
                if !self.registry.exists(*entity, PluginType::Action, action_id.as_str()) {
                    report(format!("action '{id}': unknown action {entity}/{action_id}"));
                }
            }
            RuleActionTarget::Condition {
                condition_id,
                action_id,
            } => match conditions.get(condition_id.as_str()) {
                Some(entity) => {
                    if !self.registry.exists(*entity, PluginType::Action, action_id.as_str()) {
                        report(format!("action '{id}': unknown action {entity}/{action_id}"));
                    }
                }
                None => report(format!(
                    "action '{id}' targets unknown condition '{condition_id}'"
                )),
            },
        }

        for parameter in action.parameters() {
            match parameter.source() {
                ParameterSource::Formula(formula) => {
                    if let Err(error) = parse_formula(formula) {
                        report(format!(
                            "action '{id}' parameter '{}': invalid formula {formula}: {error}",
                            parameter.id()
                        ));
                    }
                }
                ParameterSource::Condition(condition_id) => {
                    if !conditions.contains_key(condition_id.as_str()) {
                        report(format!(
                            "action '{id}' parameter '{}' references unknown condition \
                             '{condition_id}'",
                            parameter.id()
                        ));
                    }
                }
                ParameterSource::Literal(_) | ParameterSource::Entity(_) => {}
            }
        }
    }
}
