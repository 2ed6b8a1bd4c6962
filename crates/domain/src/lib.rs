//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod catalog;
mod event;
mod field;
mod form;
mod operand;
mod operator;
mod persistence;
mod rulable;
mod rule;
mod scope;
mod state;
mod workflow;

pub use audit::{AuditTrail, Timeframe};
pub use catalog::{RuleCatalog, WorkflowActionModel, WorkflowModel};
pub use event::Event;
pub use field::Field;
pub use form::Form;
pub use operand::{LITERAL_DATE_FORMAT, OperandType, OperandValue};
pub use operator::Operator;
pub use persistence::{
    Auditable, HardDeletable, Persistable, SoftDeletable, Timestampable, Timestamps,
};
pub use rulable::{Evaluable, PluginType, RulableEntity};
pub use rule::{
    BreakType, EvaluationMode, LocalizedText, ParameterSource, Rule, RuleAction,
    RuleActionParameter, RuleActionTarget, RuleCondition, RuleConditionList, RuleConstraint,
    RuleCriterion,
};
pub use scope::Scope;
pub use state::{DataEvaluation, DataState};
pub use workflow::{WorkflowAnchor, WorkflowStatus};
