use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use trialdesk_core::{AppResult, DatabaseActionContext};
use trialdesk_domain::{DataState, LocalizedText, Rule, RuleCatalog};

use crate::domain_services::DomainServices;
use crate::plugin_registry::EntityPluginRegistry;

mod execution;
mod parameters;
mod validator;

pub use validator::{RuleValidationIssue, RuleValidator};

/// Default limit of nested configuration actions.
pub const DEFAULT_MAX_CONFIGURATION_DEPTH: usize = 8;

/// Tunables of the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleEngineSettings {
    /// How deep configuration actions may nest before the rule fails.
    pub max_configuration_depth: usize,
}

impl Default for RuleEngineSettings {
    fn default() -> Self {
        Self {
            max_configuration_depth: DEFAULT_MAX_CONFIGURATION_DEPTH,
        }
    }
}

/// Caller-supplied inputs of one execution besides the data state.
///
/// Rules reached through nested configuration actions do not inherit them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOptions {
    /// Free-text message, recorded as rationale of every audited write.
    pub message: Option<String>,
    /// Free-form data handed to actions.
    pub data: Map<String, Value>,
    /// Action ids that must not run.
    pub blocked_action_ids: BTreeSet<String>,
}

impl ExecutionOptions {
    /// Sets the caller message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds one data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Blocks one action id.
    #[must_use]
    pub fn block_action(mut self, action_id: impl Into<String>) -> Self {
        self.blocked_action_ids.insert(action_id.into());
        self
    }
}

/// How a single rule ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Constraint was not satisfied.
    Skipped,
    /// Constraint held and every non-blocked action ran.
    Executed,
    /// Constraint evaluation or an action failed.
    Failed,
}

/// Trace entry of one rule, nested rules included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    /// Rule description.
    pub description: String,
    /// Nesting depth, zero for the rules passed to the engine.
    pub depth: usize,
    /// Final status.
    pub status: RuleStatus,
    /// Error message when the rule failed.
    pub error: Option<String>,
}

/// Messages and per-rule trace of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleExecutionReport {
    /// Messages of the valid rules in execution order.
    pub messages: Vec<LocalizedText>,
    /// One entry per evaluated rule, nested rules before the rule that ran them.
    pub outcomes: Vec<RuleOutcome>,
}

impl RuleExecutionReport {
    /// Returns how many rules ended with `status`.
    #[must_use]
    pub fn count(&self, status: RuleStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }
}

/// Evaluates rules against a data state and applies their actions.
///
/// Runs inside the caller's transaction and never opens or closes one.
/// Failures of one rule are logged and do not stop its siblings; only
/// fatal errors such as persistence invariant violations abort the run.
pub struct RuleEngine {
    registry: Arc<EntityPluginRegistry>,
    services: Arc<DomainServices>,
    catalog: Arc<RuleCatalog>,
    settings: RuleEngineSettings,
}

impl RuleEngine {
    /// Creates a rule engine.
    #[must_use]
    pub fn new(
        registry: Arc<EntityPluginRegistry>,
        services: Arc<DomainServices>,
        catalog: Arc<RuleCatalog>,
        settings: RuleEngineSettings,
    ) -> Self {
        Self {
            registry,
            services,
            catalog,
            settings,
        }
    }

    /// Returns the plugin registry.
    #[must_use]
    pub fn registry(&self) -> &EntityPluginRegistry {
        &self.registry
    }

    /// Returns the domain services.
    #[must_use]
    pub fn services(&self) -> &DomainServices {
        &self.services
    }

    /// Returns the workflow catalog.
    #[must_use]
    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Executes rules and returns the messages of the valid ones.
    pub fn execute(
        &self,
        state: &DataState,
        rules: &[Rule],
        context: &DatabaseActionContext,
        options: &ExecutionOptions,
    ) -> AppResult<Vec<LocalizedText>> {
        self.report(state, rules, context, options)
            .map(|report| report.messages)
    }

    /// Executes rules and returns messages together with the per-rule trace.
    pub fn report(
        &self,
        state: &DataState,
        rules: &[Rule],
        context: &DatabaseActionContext,
        options: &ExecutionOptions,
    ) -> AppResult<RuleExecutionReport> {
        execution::RuleRun::new(self, state, context, options).run(rules)
    }

    /// Executes the rules attached to one workflow action.
    pub fn execute_workflow_action(
        &self,
        state: &DataState,
        workflow_id: &str,
        action_id: &str,
        context: &DatabaseActionContext,
        options: &ExecutionOptions,
    ) -> AppResult<Vec<LocalizedText>> {
        execution::RuleRun::new(self, state, context, options)
            .run_workflow_action(workflow_id, action_id)
            .map(|report| report.messages)
    }
}
