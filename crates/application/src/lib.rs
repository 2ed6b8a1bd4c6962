//! Application services and ports.

#![forbid(unsafe_code)]

mod constraint_service;
mod domain_services;
mod formula_service;
mod persistence_ports;
mod persistence_service;
mod plugin_registry;
mod rule_service;

#[cfg(test)]
mod test_support;

pub use constraint_service::ConstraintEvaluator;
pub use domain_services::{
    DomainServices, EventService, FieldService, FormService, ScopeService, WorkflowStatusService,
};
pub use formula_service::{
    AttributeReader, FormulaError, FormulaEvaluator, FormulaExpr, StateAttributeReader,
    is_known_function, parse_formula,
};
pub use persistence_ports::RecordStore;
pub use persistence_service::{AuditedPersistence, TransactionCache};
pub use plugin_registry::{
    ActionInvocation, ActionParameters, EntityAction, EntityAttribute, EntityPluginRegistry,
    EntityRelation, ParameterValue, StaticAction,
};
pub use rule_service::{
    DEFAULT_MAX_CONFIGURATION_DEPTH, ExecutionOptions, RuleEngine, RuleEngineSettings,
    RuleExecutionReport, RuleOutcome, RuleStatus, RuleValidationIssue, RuleValidator,
};
