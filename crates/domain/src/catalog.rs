use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trialdesk_core::{AppError, AppResult, NonEmptyString};

use crate::{LocalizedText, Rule};

/// Workflow action together with the rules it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowActionModel {
    id: NonEmptyString,
    #[serde(default)]
    label: Option<LocalizedText>,
    #[serde(default)]
    rules: Vec<Rule>,
}

impl WorkflowActionModel {
    /// Creates a workflow action.
    pub fn new(id: impl Into<String>, rules: Vec<Rule>) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            label: None,
            rules,
        })
    }

    /// Returns the action id.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the localized label.
    #[must_use]
    pub fn label(&self) -> Option<&LocalizedText> {
        self.label.as_ref()
    }

    /// Returns the rules run by this action.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Workflow model: allowed states and actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowModel {
    id: NonEmptyString,
    state_ids: Vec<NonEmptyString>,
    #[serde(default)]
    actions: Vec<WorkflowActionModel>,
}

impl WorkflowModel {
    /// Creates a validated workflow model.
    ///
    /// The first state is the state new workflow statuses start in.
    pub fn new(
        id: impl Into<String>,
        state_ids: Vec<String>,
        actions: Vec<WorkflowActionModel>,
    ) -> AppResult<Self> {
        let id = NonEmptyString::new(id)?;
        if state_ids.is_empty() {
            return Err(AppError::Validation(format!(
                "workflow '{id}' must declare at least one state"
            )));
        }

        let state_ids = state_ids
            .into_iter()
            .map(NonEmptyString::new)
            .collect::<AppResult<Vec<_>>>()?;

        for (index, action) in actions.iter().enumerate() {
            if actions[..index]
                .iter()
                .any(|previous| previous.id == action.id)
            {
                return Err(AppError::Validation(format!(
                    "workflow '{id}' declares action '{}' more than once",
                    action.id
                )));
            }
        }

        Ok(Self {
            id,
            state_ids,
            actions,
        })
    }

    /// Returns the workflow id.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the state new statuses start in.
    #[must_use]
    pub fn initial_state(&self) -> Option<&NonEmptyString> {
        self.state_ids.first()
    }

    /// Returns whether the workflow declares the state.
    #[must_use]
    pub fn has_state(&self, state_id: &str) -> bool {
        self.state_ids.iter().any(|state| state.as_str() == state_id)
    }

    /// Returns the declared actions.
    #[must_use]
    pub fn actions(&self) -> &[WorkflowActionModel] {
        &self.actions
    }

    /// Returns one action by id.
    #[must_use]
    pub fn action(&self, action_id: &str) -> Option<&WorkflowActionModel> {
        self.actions
            .iter()
            .find(|action| action.id.as_str() == action_id)
    }
}

/// Loaded workflow models keyed by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleCatalog {
    workflows: BTreeMap<String, WorkflowModel>,
}

impl RuleCatalog {
    /// Creates a catalog, rejecting duplicate workflow ids.
    pub fn new(workflows: Vec<WorkflowModel>) -> AppResult<Self> {
        let mut by_id = BTreeMap::new();
        for workflow in workflows {
            let id = workflow.id.as_str().to_owned();
            if by_id.insert(id.clone(), workflow).is_some() {
                return Err(AppError::Validation(format!(
                    "workflow '{id}' is declared more than once"
                )));
            }
        }

        Ok(Self { workflows: by_id })
    }

    /// Returns one workflow model.
    pub fn workflow(&self, workflow_id: &str) -> AppResult<&WorkflowModel> {
        self.workflows
            .get(workflow_id)
            .ok_or_else(|| AppError::NotFound(format!("workflow '{workflow_id}'")))
    }

    /// Returns the rules of one workflow action.
    pub fn action_rules(&self, workflow_id: &str, action_id: &str) -> AppResult<&[Rule]> {
        self.workflow(workflow_id)?
            .action(action_id)
            .map(WorkflowActionModel::rules)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "action '{action_id}' of workflow '{workflow_id}'"
                ))
            })
    }

    /// Returns every workflow model in id order.
    pub fn workflows(&self) -> impl Iterator<Item = &WorkflowModel> {
        self.workflows.values()
    }
}

#[cfg(test)]
mod tests {
    use super::{RuleCatalog, WorkflowActionModel, WorkflowModel};
    use crate::Rule;

    fn review_workflow() -> WorkflowModel {
        WorkflowModel::new(
            "REVIEW",
            vec!["OPEN".to_owned(), "CLOSED".to_owned()],
            vec![
                WorkflowActionModel::new("CLOSE", vec![Rule::new("close")])
                    .unwrap_or_else(|_| unreachable!()),
            ],
        )
        .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn first_state_is_initial() {
        let workflow = review_workflow();
        assert_eq!(
            workflow.initial_state().map(|state| state.as_str()),
            Some("OPEN")
        );
        assert!(workflow.has_state("CLOSED"));
        assert!(!workflow.has_state("ARCHIVED"));
    }

    #[test]
    fn catalog_resolves_action_rules() {
        let catalog =
            RuleCatalog::new(vec![review_workflow()]).unwrap_or_else(|_| unreachable!());
        assert_eq!(catalog.action_rules("REVIEW", "CLOSE").map(<[Rule]>::len).ok(), Some(1));
        assert!(catalog.action_rules("REVIEW", "REOPEN").is_err());
        assert!(catalog.action_rules("QUERY", "CLOSE").is_err());
    }

    #[test]
    fn duplicate_workflows_are_rejected() {
        assert!(RuleCatalog::new(vec![review_workflow(), review_workflow()]).is_err());
    }

    #[test]
    fn workflows_need_states() {
        assert!(WorkflowModel::new("EMPTY", Vec::new(), Vec::new()).is_err());
    }
}
