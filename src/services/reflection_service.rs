//! Reflection service - the ReflectionStore
//!
//! Ownership is derived from the parent goal. A reflection whose goal is
//! soft-deleted is treated as absent by every operation.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tracing::info;

use crate::auth::{assert_owned, Caller};
use crate::db::models::{required_id, truncate_to_day};
use crate::db::{goals, reflections, JournalDb, ReflectionContent, ReflectionRow, UpsertOutcome};
use crate::error::JournalError;

use super::events::{EventBus, InvalidationEvent, MutationKind};

/// Reflection service scoped through goal ownership
pub struct ReflectionService {
    db: Arc<JournalDb>,
    events: Arc<EventBus>,
}

impl ReflectionService {
    pub fn new(db: Arc<JournalDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// All live reflections of an owned live goal, most recent day first
    pub fn list(&self, caller: &Caller, goal_id: &str) -> Result<Vec<ReflectionRow>, JournalError> {
        let session = caller.require()?;
        let goal_id = required_id("goalId", goal_id)?;

        self.db.with_conn(|conn| {
            let goal = assert_owned(session, goals::find_live_goal(conn, goal_id)?)?;
            reflections::list_live_for_goal(conn, &goal.id, None)
        })
    }

    /// Create or overwrite the goal's reflection for the day of `date`.
    ///
    /// `date` is truncated to its calendar day; `None` means today (UTC).
    pub fn record_daily(
        &self,
        caller: &Caller,
        goal_id: &str,
        date: Option<NaiveDateTime>,
        content: ReflectionContentInput,
    ) -> Result<(ReflectionRow, UpsertOutcome), JournalError> {
        let session = caller.require()?;
        let content = content.validate()?;
        let goal_id = required_id("goalId", goal_id)?;
        let day = date.map(truncate_to_day).unwrap_or_else(|| Utc::now().date_naive());

        let (row, outcome) = self.db.with_conn(|conn| {
            let goal = assert_owned(session, goals::find_live_goal(conn, goal_id)?)?;
            reflections::record_daily(conn, &goal.id, day, &content)
        })?;

        info!(
            user_id = %session.user_id,
            goal_id = %row.goal_id,
            reflection_id = %row.id,
            %day,
            outcome = ?outcome,
            "Reflection recorded"
        );
        self.emit(&session.user_id, MutationKind::ReflectionRecorded);
        Ok((row, outcome))
    }

    /// Overwrite the content of an owned reflection. The date never changes.
    pub fn update(
        &self,
        caller: &Caller,
        reflection_id: &str,
        content: ReflectionContentInput,
    ) -> Result<ReflectionRow, JournalError> {
        let session = caller.require()?;
        let content = content.validate()?;
        let reflection_id = required_id("id", reflection_id)?;

        let row = self.db.with_conn(|conn| {
            let owned = assert_owned(session, reflections::find_owned_reflection(conn, reflection_id)?)?;
            reflections::update_content(conn, &owned.reflection.id, &content)?
                .ok_or_else(|| JournalError::NotFound("Reflection not found".into()))
        })?;

        info!(user_id = %session.user_id, reflection_id = %row.id, "Reflection updated");
        self.emit(&session.user_id, MutationKind::ReflectionUpdated);
        Ok(row)
    }

    /// Soft-delete an owned reflection
    pub fn delete(&self, caller: &Caller, reflection_id: &str) -> Result<(), JournalError> {
        let session = caller.require()?;
        let reflection_id = required_id("id", reflection_id)?;

        self.db.with_conn(|conn| {
            let owned = assert_owned(session, reflections::find_owned_reflection(conn, reflection_id)?)?;
            if reflections::soft_delete_reflection(conn, &owned.reflection.id, Utc::now())? {
                Ok(())
            } else {
                Err(JournalError::NotFound("Reflection not found".into()))
            }
        })?;

        info!(user_id = %session.user_id, reflection_id = %reflection_id, "Reflection deleted");
        self.emit(&session.user_id, MutationKind::ReflectionDeleted);
        Ok(())
    }

    fn emit(&self, user_id: &str, kind: MutationKind) {
        self.events.emit(InvalidationEvent::dashboard(user_id, kind));
    }
}

/// Submitted reflection fields, before validation
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionContentInput {
    #[serde(default)]
    pub good: String,
    pub bad: Option<String>,
    pub analysis: Option<String>,
    pub next_action: Option<String>,
}

impl ReflectionContentInput {
    pub fn good(good: impl Into<String>) -> Self {
        Self {
            good: good.into(),
            ..Default::default()
        }
    }

    pub fn validate(self) -> Result<ReflectionContent, JournalError> {
        ReflectionContent::new(&self.good, self.bad, self.analysis, self.next_action)
    }
}
