use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Evaluable, RulableEntity};

/// Evaluables relevant to one evaluation pass, grouped by kind and anchored at a reference kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataState {
    reference: RulableEntity,
    evaluables: BTreeMap<RulableEntity, BTreeSet<Evaluable>>,
}

impl DataState {
    /// Creates a state anchored at one evaluable.
    #[must_use]
    pub fn new(reference: Evaluable) -> Self {
        let mut evaluables = BTreeMap::new();
        evaluables.insert(reference.entity(), BTreeSet::from([reference]));
        Self {
            reference: reference.entity(),
            evaluables,
        }
    }

    /// Adds an evaluable under its own kind without moving the reference.
    pub fn insert(&mut self, evaluable: Evaluable) {
        self.evaluables
            .entry(evaluable.entity())
            .or_default()
            .insert(evaluable);
    }

    /// Returns the reference kind.
    #[must_use]
    pub fn reference(&self) -> RulableEntity {
        self.reference
    }

    /// Returns the evaluables of one kind in identity order.
    #[must_use]
    pub fn evaluables(&self, entity: RulableEntity) -> Vec<Evaluable> {
        self.evaluables
            .get(&entity)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the evaluables of the reference kind.
    #[must_use]
    pub fn reference_evaluables(&self) -> BTreeSet<Evaluable> {
        self.evaluables
            .get(&self.reference)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the first reference evaluable in identity order.
    #[must_use]
    pub fn first_reference_evaluable(&self) -> Option<Evaluable> {
        self.evaluables
            .get(&self.reference)
            .and_then(|set| set.first().copied())
    }

    /// Returns a copy anchored at another kind.
    #[must_use]
    pub fn with_reference(&self, reference: RulableEntity) -> Self {
        Self {
            reference,
            evaluables: self.evaluables.clone(),
        }
    }

    /// Returns a copy whose evaluables of `entity` are replaced and which is anchored there.
    ///
    /// Evaluables of a different kind in `evaluables` are ignored.
    #[must_use]
    pub fn with_evaluables(
        &self,
        entity: RulableEntity,
        evaluables: impl IntoIterator<Item = Evaluable>,
    ) -> Self {
        let mut copy = self.with_reference(entity);
        copy.evaluables.insert(
            entity,
            evaluables
                .into_iter()
                .filter(|evaluable| evaluable.entity() == entity)
                .collect(),
        );
        copy
    }

    /// Returns whether the reference set is non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.evaluables
            .get(&self.reference)
            .is_some_and(|set| !set.is_empty())
    }
}

/// Result of evaluating one rule constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataEvaluation {
    valid: bool,
    states: BTreeMap<String, DataState>,
    dependencies: BTreeSet<Evaluable>,
}

impl DataEvaluation {
    /// Creates an evaluation with the given validity and no recorded states.
    #[must_use]
    pub fn new(valid: bool) -> Self {
        Self {
            valid,
            ..Self::default()
        }
    }

    /// Records the sub-state a condition resolved to.
    pub fn record(&mut self, condition_id: impl Into<String>, state: DataState) {
        self.states.insert(condition_id.into(), state);
    }

    /// Sets the validity flag.
    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Adds the reference evaluables of a recorded condition to the dependencies.
    ///
    /// Unknown condition ids are ignored.
    pub fn add_dependency(&mut self, condition_id: &str) {
        if let Some(state) = self.states.get(condition_id) {
            self.dependencies.extend(state.reference_evaluables());
        }
    }

    /// Returns whether the constraint is satisfied.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the state recorded for a condition id.
    #[must_use]
    pub fn state(&self, condition_id: &str) -> Option<&DataState> {
        self.states.get(condition_id)
    }

    /// Returns all recorded states.
    #[must_use]
    pub fn states(&self) -> &BTreeMap<String, DataState> {
        &self.states
    }

    /// Returns evaluables of the declared dependency conditions.
    #[must_use]
    pub fn dependencies(&self) -> &BTreeSet<Evaluable> {
        &self.dependencies
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{DataEvaluation, DataState};
    use crate::{Evaluable, RulableEntity};

    fn form(pk: i64) -> Evaluable {
        Evaluable::new(RulableEntity::Form, pk)
    }

    #[test]
    fn new_state_is_anchored_at_its_reference() {
        let state = DataState::new(form(4));
        assert_eq!(state.reference(), RulableEntity::Form);
        assert!(state.is_valid());
        assert_eq!(state.first_reference_evaluable(), Some(form(4)));
    }

    #[test]
    fn re_anchoring_at_an_absent_kind_is_invalid() {
        let state = DataState::new(form(4)).with_reference(RulableEntity::Workflow);
        assert!(!state.is_valid());
        assert_eq!(state.evaluables(RulableEntity::Form), vec![form(4)]);
    }

    #[test]
    fn replaced_evaluables_drop_other_kinds() {
        let state = DataState::new(form(4)).with_evaluables(
            RulableEntity::Workflow,
            [
                Evaluable::new(RulableEntity::Workflow, 9),
                Evaluable::new(RulableEntity::Field, 2),
            ],
        );
        assert_eq!(state.reference(), RulableEntity::Workflow);
        assert_eq!(
            state.evaluables(RulableEntity::Workflow),
            vec![Evaluable::new(RulableEntity::Workflow, 9)]
        );
        assert!(state.evaluables(RulableEntity::Field).is_empty());
    }

    #[test]
    fn dependencies_collect_recorded_reference_evaluables() {
        let mut evaluation = DataEvaluation::new(true);
        evaluation.record("C1", DataState::new(form(4)));
        evaluation.add_dependency("C1");
        evaluation.add_dependency("missing");
        assert_eq!(evaluation.dependencies().len(), 1);
    }

    proptest! {
        #[test]
        fn with_evaluables_never_mutates_the_source(pks in proptest::collection::vec(1i64..1000, 0..20)) {
            let source = DataState::new(form(1));
            let derived = source.with_evaluables(RulableEntity::Form, pks.iter().map(|pk| form(*pk)));
            prop_assert_eq!(source.evaluables(RulableEntity::Form), vec![form(1)]);
            prop_assert_eq!(derived.is_valid(), !pks.is_empty());
        }
    }
}
