use serde::{Deserialize, Serialize};
use trialdesk_core::{AppResult, NonEmptyString};

use crate::{
    Auditable, Evaluable, Persistable, RulableEntity, SoftDeletable, Timestampable, Timestamps,
};

/// Study scope: study, country, center or patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pk: Option<i64>,
    code: NonEmptyString,
    shortname: Option<String>,
    model_id: NonEmptyString,
    parent_pk: Option<i64>,
    deleted: bool,
    #[serde(flatten)]
    timestamps: Timestamps,
}

impl Scope {
    /// Creates an unsaved scope.
    pub fn new(
        code: impl Into<String>,
        model_id: impl Into<String>,
        parent_pk: Option<i64>,
    ) -> AppResult<Self> {
        Ok(Self {
            pk: None,
            code: NonEmptyString::new(code)?,
            shortname: None,
            model_id: NonEmptyString::new(model_id)?,
            parent_pk,
            deleted: false,
            timestamps: Timestamps::default(),
        })
    }

    /// Returns the scope code.
    #[must_use]
    pub fn code(&self) -> &NonEmptyString {
        &self.code
    }

    /// Replaces the scope code.
    pub fn set_code(&mut self, code: impl Into<String>) -> AppResult<()> {
        self.code = NonEmptyString::new(code)?;
        Ok(())
    }

    /// Returns the short display name.
    #[must_use]
    pub fn shortname(&self) -> Option<&str> {
        self.shortname.as_deref()
    }

    /// Replaces the short display name.
    pub fn set_shortname(&mut self, shortname: Option<String>) {
        self.shortname = shortname;
    }

    /// Returns the scope model id.
    #[must_use]
    pub fn model_id(&self) -> &NonEmptyString {
        &self.model_id
    }

    /// Returns the parent scope key.
    #[must_use]
    pub fn parent_pk(&self) -> Option<i64> {
        self.parent_pk
    }

    /// Returns the rule evaluation identity once saved.
    #[must_use]
    pub fn evaluable(&self) -> Option<Evaluable> {
        self.pk.map(|pk| Evaluable::new(RulableEntity::Scope, pk))
    }
}

impl Persistable for Scope {
    const TABLE: &'static str = "scope";

    fn pk(&self) -> Option<i64> {
        self.pk
    }

    fn assign_pk(&mut self, pk: i64) {
        self.pk = Some(pk);
    }

    fn before_save(&mut self) -> AppResult<()> {
        self.shortname = self
            .shortname
            .take()
            .map(|shortname| shortname.trim().to_owned())
            .filter(|shortname| !shortname.is_empty());
        Ok(())
    }

    fn as_timestampable_mut(&mut self) -> Option<&mut dyn Timestampable> {
        Some(self)
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        Some(self)
    }
}

impl Timestampable for Scope {
    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }
}

impl Auditable for Scope {}

impl SoftDeletable for Scope {
    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}
