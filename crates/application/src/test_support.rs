use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use trialdesk_core::{Actor, AppError, AppResult, AuditActionRef, DatabaseActionContext};
use trialdesk_domain::{
    AuditTrail, Evaluable, Event, Field, Form, Persistable, RulableEntity, Rule, RuleCatalog, Scope,
    WorkflowActionModel, WorkflowModel,
};

use crate::domain_services::DomainServices;
use crate::persistence_ports::RecordStore;
use crate::persistence_service::AuditedPersistence;

/// Record store fake counting every write.
#[derive(Default)]
pub struct FakeRecordStore {
    records: Mutex<BTreeMap<(String, i64), Value>>,
    sequences: Mutex<BTreeMap<String, i64>>,
    audit_trails: Mutex<Vec<AuditTrail>>,
    writes: Mutex<usize>,
}

impl FakeRecordStore {
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|_| unreachable!())
    }

    pub fn audit_trail_count(&self) -> usize {
        self.audit_trails
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .len()
    }

    pub fn record(&self, table: &str, pk: i64) -> Option<Value> {
        self.records
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .get(&(table.to_owned(), pk))
            .cloned()
    }

    fn count_write(&self) {
        *self.writes.lock().unwrap_or_else(|_| unreachable!()) += 1;
    }
}

impl RecordStore for FakeRecordStore {
    fn next_pk(&self, table: &str) -> AppResult<i64> {
        let mut sequences = self.sequences.lock().unwrap_or_else(|_| unreachable!());
        let next = sequences.entry(table.to_owned()).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    fn insert(&self, table: &str, pk: i64, record: &Value) -> AppResult<()> {
        self.count_write();
        let previous = self
            .records
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .insert((table.to_owned(), pk), record.clone());
        match previous {
            Some(_) => Err(AppError::Conflict(format!("{table} #{pk} exists"))),
            None => Ok(()),
        }
    }

    fn update(&self, table: &str, pk: i64, record: &Value) -> AppResult<()> {
        self.count_write();
        self.records
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .insert((table.to_owned(), pk), record.clone());
        Ok(())
    }

    fn fetch(&self, table: &str, pk: i64) -> AppResult<Option<Value>> {
        Ok(self.record(table, pk))
    }

    fn find_by(&self, table: &str, property: &str, value: &Value) -> AppResult<Vec<Value>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .iter()
            .filter(|((record_table, _), record)| {
                record_table == table && record.get(property) == Some(value)
            })
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn delete(&self, table: &str, pk: i64) -> AppResult<bool> {
        self.count_write();
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .remove(&(table.to_owned(), pk))
            .is_some())
    }

    fn append_audit_trail(&self, trail: AuditTrail) -> AppResult<AuditTrail> {
        let mut trails = self.audit_trails.lock().unwrap_or_else(|_| unreachable!());
        let trail = trail.with_pk(i64::try_from(trails.len()).unwrap_or_default() + 1);
        trails.push(trail.clone());
        Ok(trail)
    }

    fn list_audit_trails(&self, table: &str, object_pk: i64) -> AppResult<Vec<AuditTrail>> {
        Ok(self
            .audit_trails
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .iter()
            .filter(|trail| trail.table() == table && trail.object_pk() == object_pk)
            .cloned()
            .collect())
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

/// Context of an investigator acting `minutes` after the base time.
pub fn context_at(minutes: i64) -> DatabaseActionContext {
    DatabaseActionContext::new(
        Some(Actor::User {
            pk: 42,
            name: "investigator".to_owned(),
        }),
        AuditActionRef {
            pk: 100 + minutes,
            date: base_time() + Duration::minutes(minutes),
        },
    )
}

/// Review workflow with one action per given rule list.
pub fn review_catalog(actions: Vec<(&str, Vec<Rule>)>) -> RuleCatalog {
    let actions = actions
        .into_iter()
        .map(|(id, rules)| WorkflowActionModel::new(id, rules).unwrap_or_else(|_| unreachable!()))
        .collect();
    RuleCatalog::new(vec![
        WorkflowModel::new(
            "REVIEW",
            vec!["OPEN".to_owned(), "CLOSED".to_owned()],
            actions,
        )
        .unwrap_or_else(|_| unreachable!()),
        WorkflowModel::new("QUERY", vec!["RAISED".to_owned(), "ANSWERED".to_owned()], Vec::new())
            .unwrap_or_else(|_| unreachable!()),
    ])
    .unwrap_or_else(|_| unreachable!())
}

/// One study with a center, a patient, two visits and a submitted vitals form.
pub struct StudyFixture {
    pub store: Arc<FakeRecordStore>,
    pub services: Arc<DomainServices>,
    pub study: i64,
    pub center: i64,
    pub second_center: i64,
    pub patient: i64,
    pub screening: i64,
    pub baseline: i64,
    pub form: i64,
    pub weight: i64,
    pub height: i64,
    pub review: i64,
}

pub fn study_fixture(catalog: RuleCatalog) -> StudyFixture {
    let store = Arc::new(FakeRecordStore::default());
    let persistence = Arc::new(AuditedPersistence::new(store.clone()));
    let services = Arc::new(DomainServices::new(persistence, Arc::new(catalog)));
    let context = context_at(0);

    let scope = |code: &str, model: &str, parent: Option<i64>| {
        services
            .scopes()
            .create(
                Scope::new(code, model, parent).unwrap_or_else(|_| unreachable!()),
                &context,
            )
            .ok()
            .and_then(|scope| scope.pk())
            .unwrap_or_else(|| unreachable!())
    };
    let study = scope("STUDY", "STUDY", None);
    let center = scope("CH-01", "CENTER", Some(study));
    let second_center = scope("CH-02", "CENTER", Some(study));
    let patient = scope("CH-01-001", "PATIENT", Some(center));

    let event = |model: &str, date: Option<DateTime<Utc>>, expected: Option<DateTime<Utc>>| {
        let mut event = Event::new(patient, model).unwrap_or_else(|_| unreachable!());
        event.set_date(date);
        event.set_expected_date(expected);
        services
            .events()
            .create(event, &context)
            .ok()
            .and_then(|event| event.pk())
            .unwrap_or_else(|| unreachable!())
    };
    let screening = event("SCREENING", Some(base_time() - Duration::days(30)), None);
    let baseline = event("BASELINE", None, Some(base_time() + Duration::days(7)));

    let form = services
        .forms()
        .create(
            Form::new(patient, Some(screening), "VITALS", "SUBMITTED")
                .unwrap_or_else(|_| unreachable!()),
            &context,
        )
        .ok()
        .and_then(|form| form.pk())
        .unwrap_or_else(|| unreachable!());

    let field = |model: &str, value: &str| {
        let mut field = Field::new(patient, Some(screening), Some(form), model)
            .unwrap_or_else(|_| unreachable!());
        field.set_value(Some(value.to_owned()));
        services
            .fields()
            .create(field, &context)
            .ok()
            .and_then(|field| field.pk())
            .unwrap_or_else(|| unreachable!())
    };
    let weight = field("WEIGHT", "72");
    let height = field("HEIGHT", "180");

    let review = services
        .initialize_workflow(
            Evaluable::new(RulableEntity::Form, form),
            "REVIEW",
            Some("CREATE".to_owned()),
            &context,
            None,
        )
        .map(|evaluable| evaluable.pk())
        .unwrap_or_else(|_| unreachable!());

    StudyFixture {
        store,
        services,
        study,
        center,
        second_center,
        patient,
        screening,
        baseline,
        form,
        weight,
        height,
        review,
    }
}
