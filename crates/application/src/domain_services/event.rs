use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use trialdesk_core::{AppResult, DatabaseActionContext};
use trialdesk_domain::{Event, Persistable, SoftDeletable};

use super::modify;
use crate::persistence_service::AuditedPersistence;

/// Event lookups, timeline navigation and mutations.
#[derive(Clone)]
pub struct EventService {
    persistence: Arc<AuditedPersistence>,
}

impl EventService {
    /// Creates the service.
    #[must_use]
    pub fn new(persistence: Arc<AuditedPersistence>) -> Self {
        Self { persistence }
    }

    /// Returns one event.
    pub fn get(&self, pk: i64) -> AppResult<Event> {
        self.persistence.get::<Event>(pk)
    }

    /// Saves a new event.
    pub fn create(&self, mut event: Event, context: &DatabaseActionContext) -> AppResult<Event> {
        self.persistence.save(&mut event, context, None)?;
        Ok(event)
    }

    /// Returns the timeline of a scope.
    ///
    /// Non-removed events are ordered by actual or expected date, undated
    /// events last, then by key.
    pub fn for_scope(&self, scope_pk: i64) -> AppResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .persistence
            .find_by::<Event>("scope_pk", Value::from(scope_pk))?
            .into_iter()
            .filter(|event| !event.is_deleted())
            .collect();
        events.sort_by_key(|event| {
            (
                event.date_or_expected_date().is_none(),
                event.date_or_expected_date(),
                event.pk(),
            )
        });
        Ok(events)
    }

    /// Returns the event preceding `pk` on its scope timeline.
    pub fn previous(&self, pk: i64) -> AppResult<Option<Event>> {
        let (timeline, index) = self.position(pk)?;
        Ok(index
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| timeline.get(index).cloned()))
    }

    /// Returns the event following `pk` on its scope timeline.
    pub fn next(&self, pk: i64) -> AppResult<Option<Event>> {
        let (timeline, index) = self.position(pk)?;
        Ok(index.and_then(|index| timeline.get(index + 1).cloned()))
    }

    /// Sets the blocking flag.
    pub fn set_blocking(
        &self,
        pk: i64,
        blocked: bool,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        modify::<Event>(&self.persistence, pk, context, rationale, |event| {
            event.set_blocked(blocked);
            Ok(())
        })
    }

    /// Sets or clears the actual date.
    pub fn set_date(
        &self,
        pk: i64,
        date: Option<DateTime<Utc>>,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        modify::<Event>(&self.persistence, pk, context, rationale, |event| {
            event.set_date(date);
            Ok(())
        })
    }

    /// Sets or clears the planned date.
    pub fn set_expected_date(
        &self,
        pk: i64,
        expected_date: Option<DateTime<Utc>>,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        modify::<Event>(&self.persistence, pk, context, rationale, |event| {
            event.set_expected_date(expected_date);
            Ok(())
        })
    }

    /// Sets the not-done flag.
    pub fn set_not_done(
        &self,
        pk: i64,
        not_done: bool,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        modify::<Event>(&self.persistence, pk, context, rationale, |event| {
            event.set_not_done(not_done);
            Ok(())
        })
    }

    /// Soft-deletes an event.
    pub fn remove(
        &self,
        pk: i64,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        let mut event = self.get(pk)?;
        self.persistence.delete(&mut event, context, rationale)
    }

    /// Restores a soft-deleted event.
    pub fn restore(
        &self,
        pk: i64,
        context: &DatabaseActionContext,
        rationale: Option<&str>,
    ) -> AppResult<bool> {
        let mut event = self.get(pk)?;
        self.persistence.restore(&mut event, context, rationale)
    }

    fn position(&self, pk: i64) -> AppResult<(Vec<Event>, Option<usize>)> {
        let event = self.get(pk)?;
        let timeline = self.for_scope(event.scope_pk())?;
        let index = timeline.iter().position(|other| other.pk() == Some(pk));
        Ok((timeline, index))
    }
}
