use trialdesk_core::AppResult;
use trialdesk_domain::{AuditTrail, Persistable, Timeframe};

use super::AuditedPersistence;

impl AuditedPersistence {
    /// Lists the audit rows of an object ordered by datetime then key.
    ///
    /// Rows are optionally restricted to a time window and to one actor name.
    pub fn audit_trails<T: Persistable>(
        &self,
        object: &T,
        timeframe: Option<&Timeframe>,
        actor_name: Option<&str>,
    ) -> AppResult<Vec<AuditTrail>> {
        Ok(self
            .ordered_audit_trails::<T>(object.pk())?
            .into_iter()
            .filter(|trail| timeframe.is_none_or(|frame| frame.contains(trail.datetime())))
            .filter(|trail| actor_name.is_none_or(|name| trail.actor_name() == name))
            .collect())
    }

    /// Lists the audit rows in which at least one of `properties` changed.
    ///
    /// The first row of an object always counts as a change. Changes are detected
    /// over the full history before the time window is applied.
    pub fn audit_trails_for_properties<T: Persistable>(
        &self,
        object: &T,
        timeframe: Option<&Timeframe>,
        properties: &[&str],
    ) -> AppResult<Vec<AuditTrail>> {
        let mut previous: Option<AuditTrail> = None;
        let mut changed = Vec::new();

        for trail in self.ordered_audit_trails::<T>(object.pk())? {
            let is_change = previous.as_ref().is_none_or(|previous| {
                properties
                    .iter()
                    .any(|property| previous.property(property) != trail.property(property))
            });
            if is_change {
                changed.push(trail.clone());
            }
            previous = Some(trail);
        }

        Ok(changed
            .into_iter()
            .filter(|trail| timeframe.is_none_or(|frame| frame.contains(trail.datetime())))
            .collect())
    }

    fn ordered_audit_trails<T: Persistable>(&self, pk: Option<i64>) -> AppResult<Vec<AuditTrail>> {
        let Some(pk) = pk else {
            return Ok(Vec::new());
        };

        let mut trails = self.store.list_audit_trails(T::TABLE, pk)?;
        trails.sort_by_key(|trail| (trail.datetime(), trail.pk()));
        Ok(trails)
    }
}
