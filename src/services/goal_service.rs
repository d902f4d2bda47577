//! Goal service - the GoalStore
//!
//! Every operation takes the caller explicitly, requires a session, and
//! resolves the target through `assert_owned` before writing.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::auth::{assert_owned, Caller};
use crate::db::{goals, reflections, users, GoalDraft, GoalRow, GoalStatus, GoalWithReflections, JournalDb};
use crate::db::models::required_id;
use crate::error::JournalError;

use super::events::{EventBus, InvalidationEvent, MutationKind};

/// Number of recent reflections embedded in each listed goal
pub const RECENT_REFLECTIONS: u32 = 5;

/// Goal service for the owning user's goals
pub struct GoalService {
    db: Arc<JournalDb>,
    events: Arc<EventBus>,
}

impl GoalService {
    pub fn new(db: Arc<JournalDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Live goals of the caller, newest first, each with its recent reflections
    pub fn list(&self, caller: &Caller) -> Result<Vec<GoalWithReflections>, JournalError> {
        let session = caller.require()?;

        let listed = self.db.with_conn(|conn| {
            goals::list_live_goals(conn, &session.user_id)?
                .into_iter()
                .map(|goal| {
                    let recent =
                        reflections::list_live_for_goal(conn, &goal.id, Some(RECENT_REFLECTIONS))?;
                    Ok(GoalWithReflections {
                        goal,
                        reflections: recent,
                    })
                })
                .collect::<Result<Vec<_>, JournalError>>()
        })?;

        debug!(user_id = %session.user_id, count = listed.len(), "Listed goals");
        Ok(listed)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create an active goal, bootstrapping the user row on first use
    pub fn create(
        &self,
        caller: &Caller,
        title: &str,
        description: Option<String>,
    ) -> Result<GoalRow, JournalError> {
        let session = caller.require()?;
        let draft = GoalDraft::new(title, description)?;

        let goal = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if users::ensure_user(&tx, session)? {
                info!(user_id = %session.user_id, "Created user record");
            }
            let goal = goals::insert_goal(&tx, &session.user_id, &draft, Utc::now())?;
            tx.commit()?;
            Ok(goal)
        })?;

        info!(user_id = %session.user_id, goal_id = %goal.id, "Goal created");
        self.emit(&goal.user_id, MutationKind::GoalCreated);
        Ok(goal)
    }

    /// Replace title and description. Status and owner are unchanged.
    pub fn update(
        &self,
        caller: &Caller,
        goal_id: &str,
        title: &str,
        description: Option<String>,
    ) -> Result<GoalRow, JournalError> {
        let session = caller.require()?;
        let goal_id = required_id("id", goal_id)?;
        let draft = GoalDraft::new(title, description)?;

        let goal = self.db.with_conn(|conn| {
            let owned = assert_owned(session, goals::find_live_goal(conn, goal_id)?)?;
            let updated = goals::update_goal_content(conn, &owned.id, &draft)?;
            assert_owned(session, updated)
        })?;

        info!(user_id = %session.user_id, goal_id = %goal.id, "Goal updated");
        self.emit(&goal.user_id, MutationKind::GoalUpdated);
        Ok(goal)
    }

    /// Mark a goal archived. Archiving twice is not an error.
    pub fn archive(&self, caller: &Caller, goal_id: &str) -> Result<GoalRow, JournalError> {
        let session = caller.require()?;
        let goal_id = required_id("id", goal_id)?;

        let goal = self.db.with_conn(|conn| {
            let owned = assert_owned(session, goals::find_live_goal(conn, goal_id)?)?;
            let updated = goals::set_goal_status(conn, &owned.id, GoalStatus::Archived)?;
            assert_owned(session, updated)
        })?;

        info!(user_id = %session.user_id, goal_id = %goal.id, "Goal archived");
        self.emit(&goal.user_id, MutationKind::GoalArchived);
        Ok(goal)
    }

    /// Soft-delete a goal. Its reflections stay stored but become unreachable.
    pub fn delete(&self, caller: &Caller, goal_id: &str) -> Result<(), JournalError> {
        let session = caller.require()?;
        let goal_id = required_id("id", goal_id)?;

        self.db.with_conn(|conn| {
            let owned = assert_owned(session, goals::find_live_goal(conn, goal_id)?)?;
            if goals::soft_delete_goal(conn, &owned.id, Utc::now())? {
                Ok(())
            } else {
                Err(JournalError::NotFound("Goal not found".into()))
            }
        })?;

        info!(user_id = %session.user_id, goal_id = %goal_id, "Goal deleted");
        self.emit(&session.user_id, MutationKind::GoalDeleted);
        Ok(())
    }

    fn emit(&self, user_id: &str, kind: MutationKind) {
        self.events.emit(InvalidationEvent::dashboard(user_id, kind));
    }
}
