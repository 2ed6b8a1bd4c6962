//! Trialdesk rule runner: seeds a demonstration study and executes its rules.

#![forbid(unsafe_code)]

mod demo_study;
mod runner_config;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;
use trialdesk_application::{
    AuditedPersistence, DomainServices, EntityPluginRegistry, ExecutionOptions, RuleEngine,
    RuleEngineSettings, RuleValidator,
};
use trialdesk_core::{Actor, AppError, AppResult, AuditActionRef, DatabaseActionContext};
use trialdesk_domain::{Evaluable, Form, Persistable, RulableEntity, WorkflowStatus};
use trialdesk_infrastructure::InMemoryRecordStore;
use uuid::Uuid;

use crate::demo_study::{REVIEW_WORKFLOW, SUBMIT_ACTION};
use crate::runner_config::RunnerConfig;

fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = RunnerConfig::load()?;
    let run_id = Uuid::new_v4();
    let span = info_span!("rule_run", %run_id);
    let _entered = span.enter();

    info!(
        actor = %config.actor_name,
        max_configuration_depth = config.max_configuration_depth,
        validate_rules = config.validate_rules,
        "trialdesk-runner started"
    );
    run(&config)
}

fn run(config: &RunnerConfig) -> AppResult<()> {
    let store = Arc::new(InMemoryRecordStore::new());
    let catalog = Arc::new(demo_study::catalog()?);
    let services = Arc::new(DomainServices::new(
        Arc::new(AuditedPersistence::new(store.clone())),
        catalog.clone(),
    ));
    let registry = Arc::new(EntityPluginRegistry::with_defaults()?);

    if config.validate_rules {
        let issues = RuleValidator::new(&registry, &catalog).validate_catalog();
        for issue in &issues {
            warn!(
                location = %issue.location,
                rule = %issue.rule,
                problem = %issue.problem,
                "invalid rule"
            );
        }
        if !issues.is_empty() {
            return Err(AppError::Validation(format!(
                "{} rule configuration problems found",
                issues.len()
            )));
        }
    }

    let started = Utc::now();
    let seed_context = context(config, 1, started);
    let study = demo_study::seed(&services, &seed_context)?;
    services.persistence().clear_cache()?;
    info!(
        form = study.form,
        review = study.review,
        audit_rows = store.audit_trail_count()?,
        "demonstration study seeded"
    );

    let engine = RuleEngine::new(
        registry,
        services.clone(),
        catalog.clone(),
        RuleEngineSettings {
            max_configuration_depth: config.max_configuration_depth,
        },
    );
    let state = services.data_state_for(Evaluable::new(RulableEntity::Form, study.form))?;
    let options = ExecutionOptions::default()
        .with_message("vitals submitted")
        .with_data("source", serde_json::Value::String("trialdesk-runner".to_owned()));
    let report = engine.report(
        &state,
        catalog.action_rules(REVIEW_WORKFLOW, SUBMIT_ACTION)?,
        &context(config, 2, started + Duration::seconds(1)),
        &options,
    )?;
    services.persistence().clear_cache()?;

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|error| AppError::Internal(format!("failed to render report: {error}")))?;
    println!("{rendered}");
    for message in &report.messages {
        if let Some(text) = message.get("en") {
            println!("message: {text}");
        }
    }
    println!(
        "audit rows: {} (forms: {}, workflow statuses: {})",
        store.audit_trail_count()?,
        store.record_count(Form::TABLE)?,
        store.record_count(WorkflowStatus::TABLE)?
    );
    Ok(())
}

fn context(
    config: &RunnerConfig,
    audit_action_pk: i64,
    date: DateTime<Utc>,
) -> DatabaseActionContext {
    DatabaseActionContext::new(
        Some(Actor::Robot {
            pk: 1,
            name: config.actor_name.clone(),
        }),
        AuditActionRef {
            pk: audit_action_pk,
            date,
        },
    )
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
