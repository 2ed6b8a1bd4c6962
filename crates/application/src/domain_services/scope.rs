use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use trialdesk_core::{AppResult, DatabaseActionContext};
use trialdesk_domain::{Persistable, Scope, SoftDeletable};

use super::modify;
use crate::persistence_service::AuditedPersistence;

/// Scope lookups, hierarchy traversal and mutations.
#[derive(Clone)]
pub struct ScopeService {
    persistence: Arc<AuditedPersistence>,
}

impl ScopeService {
    /// Creates the service.
    #[must_use]
    pub fn new(persistence: Arc<AuditedPersistence>) -> Self {
        Self { persistence }
    }

    /// Returns one scope.
    pub fn get(&self, pk: i64) -> AppResult<Scope> {
        self.persistence.get::<Scope>(pk)
    }

    /// Saves a new scope.
    pub fn create(&self, mut scope: Scope, context: &DatabaseActionContext) -> AppResult<Scope> {
        self.persistence.save(&mut scope, context, None)?;
        Ok(scope)
    }

    /// Returns the non-removed direct children ordered by key.
    pub fn children(&self, pk: i64) -> AppResult<Vec<Scope>> {
        Ok(self
            .persistence
            .find_by::<Scope>("parent_pk", Value::from(pk))?
            .into_iter()
            .filter(|scope| !scope.is_deleted())
            .collect())
    }

    /// Returns the parent chain, nearest first.
    pub fn ancestors(&self, pk: i64) -> AppResult<Vec<Scope>> {
        let mut ancestors = Vec::new();
        let mut visited = BTreeSet::from([pk]);
        let mut parent_pk = self.get(pk)?.parent_pk();

        while let Some(current) = parent_pk {
            if !visited.insert(current) {
                break;
            }
            let parent = self.get(current)?;
            parent_pk = parent.parent_pk();
            ancestors.push(parent);
        }

        Ok(ancestors)
    }

    /// Returns every non-removed scope below `pk`, breadth first.
    pub fn descendants(&self, pk: i64) -> AppResult<Vec<Scope>> {
        let mut descendants = Vec::new();
        let mut visited = BTreeSet::from([pk]);
        let mut queue = VecDeque::from([pk]);

        while let Some(current) = queue.pop_front() {
            for child in self.children(current)? {
                let Some(child_pk) = child.pk() else {
                    continue;
                };
                if visited.insert(child_pk) {
                    queue.push_back(child_pk);
                    descendants.push(child);
                }
            }
        }

        Ok(descendants)
    }

    /// Returns the 1-based position of a scope among its parent's children.
    pub fn number_in_parent(&self, pk: i64) -> AppResult<Option<usize>> {
        let Some(parent_pk) = self.get(pk)?.parent_pk() else {
            return Ok(None);
        };

        Ok(self
            .children(parent_pk)?
            .iter()
            .position(|sibling| sibling.pk() == Some(pk))
            .map(|index| index + 1))
    }

    /// Replaces the code of a scope.
    pub fn change_code(
        &self,
        pk: i64,
        code: &str,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        modify::<Scope>(&self.persistence, pk, context, rationale, |scope| {
            scope.set_code(code)
        })
    }

    /// Replaces the short name of a scope.
    pub fn change_shortname(
        &self,
        pk: i64,
        shortname: Option<String>,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        modify::<Scope>(&self.persistence, pk, context, rationale, |scope| {
            scope.set_shortname(shortname);
            Ok(())
        })
    }

    /// Soft-deletes a scope.
    pub fn remove(
        &self,
        pk: i64,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        let mut scope = self.get(pk)?;
        self.persistence.delete(&mut scope, context, rationale)
    }

    /// Restores a soft-deleted scope.
    pub fn restore(
        &self,
        pk: i64,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        let mut scope = self.get(pk)?;
        self.persistence.restore(&mut scope, context, rationale)
    }
}
