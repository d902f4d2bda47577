//! Goals CRUD operations
//!
//! Reads use `live_goals`. Writes target `goals` guarded by the same
//! liveness predicate, so a soft-deleted goal is never modified again.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::JournalError;

use super::models::{GoalDraft, GoalRow, GoalStatus, Lifecycle};

const GOAL_COLUMNS: &str = "id, user_id, title, description, status, created_at, deleted_at";

fn map_goal(row: &Row<'_>) -> rusqlite::Result<GoalRow> {
    Ok(GoalRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        lifecycle: Lifecycle::from_deleted_at(row.get(6)?),
    })
}

/// Get a live goal by ID (any owner)
pub fn find_live_goal(conn: &Connection, id: &str) -> Result<Option<GoalRow>, JournalError> {
    let sql = format!("SELECT {} FROM live_goals WHERE id = ?", GOAL_COLUMNS);

    conn.query_row(&sql, params![id], map_goal)
        .optional()
        .map_err(|e| JournalError::Database(format!("Failed to get goal: {}", e)))
}

/// List a user's live goals, newest first
pub fn list_live_goals(conn: &Connection, user_id: &str) -> Result<Vec<GoalRow>, JournalError> {
    let sql = format!(
        "SELECT {} FROM live_goals WHERE user_id = ? ORDER BY created_at DESC, seq DESC",
        GOAL_COLUMNS
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| JournalError::Database(format!("Failed to prepare statement: {}", e)))?;

    let rows = stmt
        .query_map(params![user_id], map_goal)
        .map_err(|e| JournalError::Database(format!("Failed to query goals: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.map_err(|e| JournalError::Database(format!("Failed to read row: {}", e)))?);
    }

    Ok(results)
}

/// Insert a new active goal
pub fn insert_goal(
    conn: &Connection,
    user_id: &str,
    draft: &GoalDraft,
    created_at: DateTime<Utc>,
) -> Result<GoalRow, JournalError> {
    let id = Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO goals (id, user_id, title, description, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![id, user_id, draft.title, draft.description, GoalStatus::Active, created_at],
    )
    .map_err(|e| JournalError::Database(format!("Failed to create goal: {}", e)))?;

    find_live_goal(conn, &id)?
        .ok_or_else(|| JournalError::Internal("Failed to retrieve created goal".to_string()))
}

/// Replace title and description of a live goal
pub fn update_goal_content(
    conn: &Connection,
    id: &str,
    draft: &GoalDraft,
) -> Result<Option<GoalRow>, JournalError> {
    let changed = conn
        .execute(
            "UPDATE goals SET title = ?, description = ? WHERE id = ? AND deleted_at IS NULL",
            params![draft.title, draft.description, id],
        )
        .map_err(|e| JournalError::Database(format!("Failed to update goal: {}", e)))?;

    if changed == 0 {
        return Ok(None);
    }
    find_live_goal(conn, id)
}

/// Set the status of a live goal
pub fn set_goal_status(
    conn: &Connection,
    id: &str,
    status: GoalStatus,
) -> Result<Option<GoalRow>, JournalError> {
    let changed = conn
        .execute(
            "UPDATE goals SET status = ? WHERE id = ? AND deleted_at IS NULL",
            params![status, id],
        )
        .map_err(|e| JournalError::Database(format!("Failed to set goal status: {}", e)))?;

    if changed == 0 {
        return Ok(None);
    }
    find_live_goal(conn, id)
}

/// Soft-delete a live goal. Its reflections are left untouched.
pub fn soft_delete_goal(
    conn: &Connection,
    id: &str,
    at: DateTime<Utc>,
) -> Result<bool, JournalError> {
    let changed = conn
        .execute(
            "UPDATE goals SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
            params![at, id],
        )
        .map_err(|e| JournalError::Database(format!("Failed to delete goal: {}", e)))?;

    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionContext;
    use crate::db::{schema::init_schema, users::ensure_user};
    use chrono::Duration;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ensure_user(&conn, &SessionContext::new("u1")).unwrap();
        conn
    }

    fn draft(title: &str) -> GoalDraft {
        GoalDraft::new(title, None).unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let conn = setup();
        let goal = insert_goal(&conn, "u1", &draft("Read"), Utc::now()).unwrap();
        assert_eq!(goal.status, GoalStatus::Active);
        assert!(goal.lifecycle.is_active());
        assert_eq!(find_live_goal(&conn, &goal.id).unwrap().unwrap().title, "Read");
    }

    #[test]
    fn test_list_newest_first_with_tie_break() {
        let conn = setup();
        let t0 = Utc::now();
        let a = insert_goal(&conn, "u1", &draft("a"), t0).unwrap();
        let b = insert_goal(&conn, "u1", &draft("b"), t0 + Duration::seconds(1)).unwrap();
        let c = insert_goal(&conn, "u1", &draft("c"), t0 + Duration::seconds(1)).unwrap();

        let ids: Vec<_> = list_live_goals(&conn, "u1").unwrap().into_iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[test]
    fn test_soft_deleted_goal_hidden_but_kept() {
        let conn = setup();
        let goal = insert_goal(&conn, "u1", &draft("Gone"), Utc::now()).unwrap();
        assert!(soft_delete_goal(&conn, &goal.id, Utc::now()).unwrap());
        assert!(!soft_delete_goal(&conn, &goal.id, Utc::now()).unwrap());

        assert!(find_live_goal(&conn, &goal.id).unwrap().is_none());
        assert!(list_live_goals(&conn, "u1").unwrap().is_empty());
        assert!(update_goal_content(&conn, &goal.id, &draft("x")).unwrap().is_none());

        let stored: i64 = conn
            .query_row("SELECT COUNT(*) FROM goals WHERE id = ?", params![goal.id], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, 1);
    }

    #[test]
    fn test_set_status_keeps_content() {
        let conn = setup();
        let goal = insert_goal(
            &conn,
            "u1",
            &GoalDraft::new("Swim", Some("laps".into())).unwrap(),
            Utc::now(),
        )
        .unwrap();

        let archived = set_goal_status(&conn, &goal.id, GoalStatus::Archived).unwrap().unwrap();
        assert_eq!(archived.status, GoalStatus::Archived);
        assert_eq!(archived.title, goal.title);
        assert_eq!(archived.description, goal.description);
        assert_eq!(archived.created_at, goal.created_at);
    }
}
