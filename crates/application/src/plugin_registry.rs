use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use trialdesk_core::{AppError, AppResult};
use trialdesk_domain::{Evaluable, OperandType, OperandValue, PluginType, RulableEntity};

use crate::domain_services::DomainServices;

mod event_plugins;
mod field_plugins;
mod form_plugins;
mod parameters;
mod scope_plugins;
mod shared_actions;
mod static_plugins;
mod workflow_plugins;

pub use parameters::{ActionInvocation, ActionParameters, ParameterValue};

/// Reads a typed scalar off an evaluable.
pub trait EntityAttribute: Send + Sync {
    /// Plugin id referenced by rule configuration.
    fn id(&self) -> &'static str;

    /// Type of the values returned by [`EntityAttribute::value`].
    fn operand_type(&self) -> OperandType;

    /// Reads the current value.
    fn value(&self, services: &DomainServices, evaluable: Evaluable) -> AppResult<OperandValue>;
}

/// Navigates from one evaluable to evaluables of another kind.
pub trait EntityRelation: Send + Sync {
    /// Plugin id referenced by rule configuration.
    fn id(&self) -> &'static str;

    /// Kind of the related evaluables.
    fn target(&self) -> RulableEntity;

    /// Returns the related evaluables.
    fn related(&self, services: &DomainServices, evaluable: Evaluable)
    -> AppResult<Vec<Evaluable>>;
}

/// Performs a parameterized mutation on one evaluable.
pub trait EntityAction: Send + Sync {
    /// Plugin id referenced by rule configuration.
    fn id(&self) -> &'static str;

    /// Applies the action to one target.
    fn execute(&self, invocation: &ActionInvocation<'_>, target: Evaluable) -> AppResult<()>;
}

/// Action not bound to any entity kind.
pub trait StaticAction: Send + Sync {
    /// Plugin id referenced by rule configuration.
    fn id(&self) -> &'static str;

    /// Runs the action.
    fn execute(&self, invocation: &ActionInvocation<'_>) -> AppResult<()>;
}

type PluginKey = (RulableEntity, String);

/// Attribute, relation and action plugins keyed by kind and id.
///
/// Filled once at startup; lookups are pure reads.
#[derive(Default)]
pub struct EntityPluginRegistry {
    attributes: HashMap<PluginKey, Arc<dyn EntityAttribute>>,
    relations: HashMap<PluginKey, Arc<dyn EntityRelation>>,
    actions: HashMap<PluginKey, Arc<dyn EntityAction>>,
    static_actions: HashMap<&'static str, Arc<dyn StaticAction>>,
}

impl EntityPluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in plugin.
    pub fn with_defaults() -> AppResult<Self> {
        let mut registry = Self::new();
        scope_plugins::register(&mut registry)?;
        event_plugins::register(&mut registry)?;
        form_plugins::register(&mut registry)?;
        field_plugins::register(&mut registry)?;
        workflow_plugins::register(&mut registry)?;
        static_plugins::register(&mut registry)?;

        debug!(
            attributes = registry.attributes.len(),
            relations = registry.relations.len(),
            actions = registry.actions.len(),
            static_actions = registry.static_actions.len(),
            "entity plugins registered"
        );
        Ok(registry)
    }

    /// Registers an attribute plugin.
    pub fn register_attribute(
        &mut self,
        entity: RulableEntity,
        plugin: Arc<dyn EntityAttribute>,
    ) -> AppResult<()> {
        insert_unique(
            &mut self.attributes,
            (entity, plugin.id().to_owned()),
            plugin,
            PluginType::Attribute,
        )
    }

    /// Registers a relation plugin.
    pub fn register_relation(
        &mut self,
        entity: RulableEntity,
        plugin: Arc<dyn EntityRelation>,
    ) -> AppResult<()> {
        insert_unique(
            &mut self.relations,
            (entity, plugin.id().to_owned()),
            plugin,
            PluginType::Relation,
        )
    }

    /// Registers an action plugin.
    pub fn register_action(
        &mut self,
        entity: RulableEntity,
        plugin: Arc<dyn EntityAction>,
    ) -> AppResult<()> {
        insert_unique(
            &mut self.actions,
            (entity, plugin.id().to_owned()),
            plugin,
            PluginType::Action,
        )
    }

    /// Registers a static action.
    pub fn register_static_action(&mut self, plugin: Arc<dyn StaticAction>) -> AppResult<()> {
        let id = plugin.id();
        if self.static_actions.insert(id, plugin).is_some() {
            return Err(AppError::Conflict(format!(
                "static action '{id}' is already registered"
            )));
        }
        Ok(())
    }

    /// Returns one attribute plugin.
    pub fn attribute(&self, entity: RulableEntity, id: &str) -> AppResult<&dyn EntityAttribute> {
        lookup(&self.attributes, entity, PluginType::Attribute, id)
    }

    /// Returns one relation plugin.
    pub fn relation(&self, entity: RulableEntity, id: &str) -> AppResult<&dyn EntityRelation> {
        lookup(&self.relations, entity, PluginType::Relation, id)
    }

    /// Returns one action plugin.
    pub fn action(&self, entity: RulableEntity, id: &str) -> AppResult<&dyn EntityAction> {
        lookup(&self.actions, entity, PluginType::Action, id)
    }

    /// Returns one static action.
    pub fn static_action(&self, id: &str) -> AppResult<&dyn StaticAction> {
        self.static_actions
            .get(id)
            .map(|plugin| plugin.as_ref())
            .ok_or_else(|| AppError::UnknownPlugin(format!("static action '{id}'")))
    }

    /// Returns whether a plugin is registered.
    #[must_use]
    pub fn exists(&self, entity: RulableEntity, plugin_type: PluginType, id: &str) -> bool {
        match plugin_type {
            PluginType::Attribute => self.attribute(entity, id).is_ok(),
            PluginType::Relation => self.relation(entity, id).is_ok(),
            PluginType::Action => self.action(entity, id).is_ok(),
        }
    }

    /// Returns whether a static action is registered.
    #[must_use]
    pub fn static_exists(&self, id: &str) -> bool {
        self.static_actions.contains_key(id)
    }
}

fn insert_unique<T: ?Sized>(
    plugins: &mut HashMap<PluginKey, Arc<T>>,
    key: PluginKey,
    plugin: Arc<T>,
    plugin_type: PluginType,
) -> AppResult<()> {
    let label = format!("{}/{plugin_type}/{}", key.0, key.1);
    if plugins.insert(key, plugin).is_some() {
        return Err(AppError::Conflict(format!("{label} is already registered")));
    }
    Ok(())
}

fn lookup<'a, T: ?Sized>(
    plugins: &'a HashMap<PluginKey, Arc<T>>,
    entity: RulableEntity,
    plugin_type: PluginType,
    id: &str,
) -> AppResult<&'a T> {
    plugins
        .get(&(entity, id.to_owned()))
        .map(|plugin| plugin.as_ref())
        .ok_or_else(|| AppError::UnknownPlugin(format!("{entity}/{plugin_type}/{id}")))
}

/// Returns the key of an evaluable, rejecting evaluables of another kind.
pub(crate) fn expect_kind(evaluable: Evaluable, entity: RulableEntity) -> AppResult<i64> {
    if evaluable.entity() != entity {
        return Err(AppError::Unsupported(format!(
            "{entity} plugin cannot handle {evaluable}"
        )));
    }
    Ok(evaluable.pk())
}

/// Maps saved objects to their evaluables.
pub(crate) fn evaluables_of<T>(
    objects: impl IntoIterator<Item = T>,
    evaluable: impl Fn(&T) -> Option<Evaluable>,
) -> Vec<Evaluable> {
    objects
        .into_iter()
        .filter_map(|object| evaluable(&object))
        .collect()
}

#[cfg(test)]
mod tests;
