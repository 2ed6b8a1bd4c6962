use std::sync::Arc;

use tracing::debug;
use trialdesk_core::AppResult;
use trialdesk_domain::{Evaluable, RulableEntity};

use super::{ActionInvocation, EntityAction, EntityPluginRegistry};

pub(super) const ACTION: &str = "ACTION";
pub(super) const CODE: &str = "CODE";
pub(super) const DATE: &str = "DATE";
pub(super) const BLOCKING: &str = "BLOCKING";
pub(super) const MESSAGE: &str = "MESSAGE";
pub(super) const SHORTNAME: &str = "SHORTNAME";
pub(super) const STATUS: &str = "STATUS";
pub(super) const VALIDATOR: &str = "VALIDATOR";
pub(super) const VALUE: &str = "VALUE";
pub(super) const WORKFLOW: &str = "WORKFLOW";

/// Starts the workflow named by `WORKFLOW` on the target.
struct InitializeWorkflow;

impl EntityAction for InitializeWorkflow {
    fn id(&self) -> &'static str {
        "INITIALIZE_WORKFLOW"
    }

    fn execute(&self, invocation: &ActionInvocation<'_>, target: Evaluable) -> AppResult<()> {
        let workflow_id = invocation.parameters.required_text(WORKFLOW)?;
        let action_id = invocation.parameters.text(ACTION)?;
        invocation.services.initialize_workflow(
            target,
            &workflow_id,
            action_id,
            invocation.context,
            invocation.message,
        )?;
        Ok(())
    }
}

/// Removes the target's workflow statuses, all of them unless `WORKFLOW` is given.
struct DeleteWorkflow;

impl EntityAction for DeleteWorkflow {
    fn id(&self) -> &'static str {
        "DELETE_WORKFLOW"
    }

    fn execute(&self, invocation: &ActionInvocation<'_>, target: Evaluable) -> AppResult<()> {
        let workflow_id = invocation.parameters.text(WORKFLOW)?;
        let removed = invocation
            .services
            .workflows()
            .delete_for_owner(target, workflow_id.as_deref())?;
        debug!(target = %target, removed, "workflow statuses deleted");
        Ok(())
    }
}

pub(super) fn register_initialize_workflow(
    registry: &mut EntityPluginRegistry,
    entity: RulableEntity,
) -> AppResult<()> {
    registry.register_action(entity, Arc::new(InitializeWorkflow))
}

pub(super) fn register_delete_workflow(
    registry: &mut EntityPluginRegistry,
    entity: RulableEntity,
) -> AppResult<()> {
    registry.register_action(entity, Arc::new(DeleteWorkflow))
}
