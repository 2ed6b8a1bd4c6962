use tracing::{debug, info, warn};
use trialdesk_core::{AppError, AppResult, DatabaseActionContext};
use trialdesk_domain::{DataEvaluation, DataState, Evaluable, Rule, RuleAction, RuleActionTarget};

use super::parameters::resolve_parameters;
use super::{ExecutionOptions, RuleEngine, RuleExecutionReport, RuleOutcome, RuleStatus};
use crate::constraint_service::ConstraintEvaluator;
use crate::plugin_registry::{ActionInvocation, ActionParameters, EntityAction};

/// State of one engine invocation: the trace so far and the configuration stack.
///
/// Rules reached through a nested configuration action run with empty options
/// and their messages are dropped.
pub(super) struct RuleRun<'a> {
    engine: &'a RuleEngine,
    state: &'a DataState,
    context: &'a DatabaseActionContext,
    options: &'a ExecutionOptions,
    nested_options: ExecutionOptions,
    top_depth: usize,
    stack: Vec<(String, String)>,
    report: RuleExecutionReport,
}

impl<'a> RuleRun<'a> {
    pub(super) fn new(
        engine: &'a RuleEngine,
        state: &'a DataState,
        context: &'a DatabaseActionContext,
        options: &'a ExecutionOptions,
    ) -> Self {
        Self {
            engine,
            state,
            context,
            options,
            nested_options: ExecutionOptions::default(),
            top_depth: 0,
            stack: Vec::new(),
            report: RuleExecutionReport::default(),
        }
    }

    pub(super) fn run(mut self, rules: &[Rule]) -> AppResult<RuleExecutionReport> {
        self.execute_rules(rules)?;
        Ok(self.finish())
    }

    pub(super) fn run_workflow_action(
        mut self,
        workflow_id: &str,
        action_id: &str,
    ) -> AppResult<RuleExecutionReport> {
        // The requested action's own rules are top level for this caller.
        self.top_depth = 1;
        self.execute_configuration(workflow_id, action_id)?;
        Ok(self.finish())
    }

    fn finish(self) -> RuleExecutionReport {
        info!(
            reference = %self.state.reference(),
            executed = self.report.count(RuleStatus::Executed),
            skipped = self.report.count(RuleStatus::Skipped),
            failed = self.report.count(RuleStatus::Failed),
            messages = self.report.messages.len(),
            "rules executed"
        );
        self.report
    }

    fn execute_rules(&mut self, rules: &[Rule]) -> AppResult<()> {
        for rule in rules {
            let status = match self.execute_rule(rule) {
                Ok(status) => status,
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(rule = rule.description(), error = %error, "rule failed");
                    self.trace(rule, RuleStatus::Failed, Some(error.to_string()));
                    continue;
                }
            };
            self.trace(rule, status, None);
        }
        Ok(())
    }

    fn execute_rule(&mut self, rule: &Rule) -> AppResult<RuleStatus> {
        let evaluator = ConstraintEvaluator::new(
            &self.engine.registry,
            &self.engine.services,
            self.context.operation_time(),
        );
        let evaluation = evaluator.evaluate(self.state, rule.constraint())?;
        if !evaluation.is_valid() {
            debug!(rule = rule.description(), "rule constraint not satisfied");
            return Ok(RuleStatus::Skipped);
        }

        let result = self.execute_actions(rule, &evaluation);
        if let Some(message) = rule.message() {
            if self.is_nested() {
                debug!(rule = rule.description(), "nested rule message dropped");
            } else {
                self.report.messages.push(message.clone());
            }
        }
        result.map(|()| RuleStatus::Executed)
    }

    fn execute_actions(&mut self, rule: &Rule, evaluation: &DataEvaluation) -> AppResult<()> {
        for action in rule.actions() {
            if self
                .options()
                .blocked_action_ids
                .contains(action.id().as_str())
            {
                debug!(
                    rule = rule.description(),
                    action = action.id().as_str(),
                    "action blocked"
                );
                continue;
            }

            match self.execute_action(action, evaluation) {
                Err(error) if action.is_optional() && !error.is_fatal() => warn!(
                    rule = rule.description(),
                    action = action.id().as_str(),
                    error = %error,
                    "optional action failed"
                ),
                result => result?,
            }
        }
        Ok(())
    }

    fn execute_action(
        &mut self,
        action: &RuleAction,
        evaluation: &DataEvaluation,
    ) -> AppResult<()> {
        let engine = self.engine;
        let registry = &engine.registry;
        match action.target() {
            RuleActionTarget::Configuration {
                workflow_id,
                action_id,
            } => self.execute_configuration(workflow_id.as_str(), action_id.as_str()),
            RuleActionTarget::Static { action_id } => {
                let plugin = registry.static_action(action_id.as_str())?;
                let parameters =
                    resolve_parameters(engine, self.state, evaluation, action, self.context)?;
                plugin.execute(&self.invocation(&parameters))
            }
            RuleActionTarget::Entity { entity, action_id } => {
                let plugin = registry.action(*entity, action_id.as_str())?;
                let targets = self.state.evaluables(*entity);
                self.execute_entity_action(action, evaluation, plugin, targets)
            }
            RuleActionTarget::Condition {
                condition_id,
                action_id,
            } => {
                let recorded = evaluation.state(condition_id.as_str()).ok_or_else(|| {
                    AppError::Validation(format!(
                        "action '{action_id}' targets unknown condition '{condition_id}'"
                    ))
                })?;
                let plugin = registry.action(recorded.reference(), action_id.as_str())?;
                let targets = recorded.reference_evaluables().into_iter().collect();
                self.execute_entity_action(action, evaluation, plugin, targets)
            }
        }
    }

    fn execute_entity_action(
        &self,
        action: &RuleAction,
        evaluation: &DataEvaluation,
        plugin: &dyn EntityAction,
        targets: Vec<Evaluable>,
    ) -> AppResult<()> {
        let parameters =
            resolve_parameters(self.engine, self.state, evaluation, action, self.context)?;
        let invocation = self.invocation(&parameters);
        for target in targets {
            plugin.execute(&invocation, target)?;
            debug!(action = action.id().as_str(), target = %target, "action executed");
        }
        Ok(())
    }

    fn execute_configuration(&mut self, workflow_id: &str, action_id: &str) -> AppResult<()> {
        let key = (workflow_id.to_owned(), action_id.to_owned());
        let limit = self.engine.settings.max_configuration_depth;
        if self.stack.len() >= limit {
            return Err(AppError::Validation(format!(
                "configuration action {workflow_id}/{action_id} exceeds the nesting limit of {limit}"
            )));
        }
        if self.stack.contains(&key) {
            return Err(AppError::Validation(format!(
                "configuration action {workflow_id}/{action_id} calls itself"
            )));
        }

        let rules = self.engine.catalog.action_rules(workflow_id, action_id)?;
        debug!(
            workflow = workflow_id,
            action = action_id,
            depth = self.stack.len() + 1,
            "running configuration action"
        );
        self.stack.push(key);
        let result = self.execute_rules(rules);
        self.stack.pop();
        result
    }

    fn is_nested(&self) -> bool {
        self.stack.len() > self.top_depth
    }

    fn options(&self) -> &ExecutionOptions {
        if self.is_nested() {
            &self.nested_options
        } else {
            self.options
        }
    }

    fn invocation<'p>(&'p self, parameters: &'p ActionParameters) -> ActionInvocation<'p> {
        let options = self.options();
        ActionInvocation {
            services: &self.engine.services,
            parameters,
            context: self.context,
            message: options.message.as_deref(),
            data: &options.data,
        }
    }

    fn trace(&mut self, rule: &Rule, status: RuleStatus, error: Option<String>) {
        self.report.outcomes.push(RuleOutcome {
            description: rule.description().to_owned(),
            depth: self.stack.len(),
            status,
            error,
        });
    }
}
