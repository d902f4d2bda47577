//! Reflections CRUD operations and the daily upsert
//!
//! A goal has at most one live reflection per calendar day. The partial
//! unique index `idx_reflections_goal_day_live` enforces this; `record_daily`
//! turns the index violation raised by a concurrent writer into an update of
//! the row that won.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::JournalError;

use super::models::{Lifecycle, OwnedReflection, ReflectionContent, ReflectionRow, UpsertOutcome};

const REFLECTION_COLUMNS: &str =
    "id, goal_id, date, good, bad, analysis, next_action, deleted_at";

fn map_reflection(row: &Row<'_>) -> rusqlite::Result<ReflectionRow> {
    Ok(ReflectionRow {
        id: row.get(0)?,
        goal_id: row.get(1)?,
        date: row.get(2)?,
        good: row.get(3)?,
        bad: row.get(4)?,
        analysis: row.get(5)?,
        next_action: row.get(6)?,
        lifecycle: Lifecycle::from_deleted_at(row.get(7)?),
    })
}

/// Get a live reflection by ID
pub fn find_live_reflection(
    conn: &Connection,
    id: &str,
) -> Result<Option<ReflectionRow>, JournalError> {
    let sql = format!("SELECT {} FROM live_reflections WHERE id = ?", REFLECTION_COLUMNS);

    conn.query_row(&sql, params![id], map_reflection)
        .optional()
        .map_err(|e| JournalError::Database(format!("Failed to get reflection: {}", e)))
}

/// Resolve a live reflection together with the owner of its live goal.
///
/// Reflections under a soft-deleted goal resolve to `None`.
pub fn find_owned_reflection(
    conn: &Connection,
    id: &str,
) -> Result<Option<OwnedReflection>, JournalError> {
    conn.query_row(
        "SELECT r.id, r.goal_id, r.date, r.good, r.bad, r.analysis, r.next_action, r.deleted_at,
                g.user_id
         FROM live_reflections r
         JOIN live_goals g ON g.id = r.goal_id
         WHERE r.id = ?",
        params![id],
        |row| {
            Ok(OwnedReflection {
                reflection: map_reflection(row)?,
                owner_id: row.get(8)?,
            })
        },
    )
    .optional()
    .map_err(|e| JournalError::Database(format!("Failed to resolve reflection: {}", e)))
}

/// The live reflection of `goal_id` on `day`, if any
pub fn find_live_by_day(
    conn: &Connection,
    goal_id: &str,
    day: NaiveDate,
) -> Result<Option<ReflectionRow>, JournalError> {
    let sql = format!(
        "SELECT {} FROM live_reflections WHERE goal_id = ? AND date = ?",
        REFLECTION_COLUMNS
    );

    conn.query_row(&sql, params![goal_id, day], map_reflection)
        .optional()
        .map_err(|e| JournalError::Database(format!("Failed to get reflection for day: {}", e)))
}

/// List live reflections of a goal, most recent day first
pub fn list_live_for_goal(
    conn: &Connection,
    goal_id: &str,
    limit: Option<u32>,
) -> Result<Vec<ReflectionRow>, JournalError> {
    let mut sql = format!(
        "SELECT {} FROM live_reflections WHERE goal_id = ? ORDER BY date DESC, seq DESC",
        REFLECTION_COLUMNS
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| JournalError::Database(format!("Failed to prepare statement: {}", e)))?;

    let rows = stmt
        .query_map(params![goal_id], map_reflection)
        .map_err(|e| JournalError::Database(format!("Failed to query reflections: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.map_err(|e| JournalError::Database(format!("Failed to read row: {}", e)))?);
    }

    Ok(results)
}

/// Insert a reflection. A live row for the same goal and day yields `Conflict`.
pub fn insert_reflection(
    conn: &Connection,
    goal_id: &str,
    day: NaiveDate,
    content: &ReflectionContent,
) -> Result<ReflectionRow, JournalError> {
    let id = Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO reflections (id, goal_id, date, good, bad, analysis, next_action)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            goal_id,
            day,
            content.good,
            content.bad,
            content.analysis,
            content.next_action,
        ],
    )?;

    find_live_reflection(conn, &id)?
        .ok_or_else(|| JournalError::Internal("Failed to retrieve created reflection".to_string()))
}

/// Overwrite the four content fields of a live reflection. The date is kept.
pub fn update_content(
    conn: &Connection,
    id: &str,
    content: &ReflectionContent,
) -> Result<Option<ReflectionRow>, JournalError> {
    let changed = conn
        .execute(
            "UPDATE reflections SET good = ?, bad = ?, analysis = ?, next_action = ?
             WHERE id = ? AND deleted_at IS NULL",
            params![content.good, content.bad, content.analysis, content.next_action, id],
        )
        .map_err(|e| JournalError::Database(format!("Failed to update reflection: {}", e)))?;

    if changed == 0 {
        return Ok(None);
    }
    find_live_reflection(conn, id)
}

/// Soft-delete a live reflection, freeing its day for a new entry
pub fn soft_delete_reflection(
    conn: &Connection,
    id: &str,
    at: DateTime<Utc>,
) -> Result<bool, JournalError> {
    let changed = conn
        .execute(
            "UPDATE reflections SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
            params![at, id],
        )
        .map_err(|e| JournalError::Database(format!("Failed to delete reflection: {}", e)))?;

    Ok(changed > 0)
}

/// Create or overwrite the reflection of `goal_id` on `day`.
///
/// The caller has already verified that the goal is live and owned.
pub fn record_daily(
    conn: &Connection,
    goal_id: &str,
    day: NaiveDate,
    content: &ReflectionContent,
) -> Result<(ReflectionRow, UpsertOutcome), JournalError> {
    if let Some(existing) = find_live_by_day(conn, goal_id, day)? {
        debug!(goal_id = %goal_id, %day, "Overwriting reflection for day");
        return overwrite(conn, &existing.id, content);
    }

    insert_or_overwrite(conn, goal_id, day, content)
}

/// Insert, and when another writer already holds the day, update its row instead
pub fn insert_or_overwrite(
    conn: &Connection,
    goal_id: &str,
    day: NaiveDate,
    content: &ReflectionContent,
) -> Result<(ReflectionRow, UpsertOutcome), JournalError> {
    match insert_reflection(conn, goal_id, day, content) {
        Ok(row) => Ok((row, UpsertOutcome::Inserted)),
        Err(JournalError::Conflict(reason)) => {
            warn!(goal_id = %goal_id, %day, "Concurrent reflection insert lost: {}", reason);
            let winner = find_live_by_day(conn, goal_id, day)?.ok_or_else(|| {
                JournalError::Internal(format!(
                    "Reflection for {} on {} vanished after conflict",
                    goal_id, day
                ))
            })?;
            overwrite(conn, &winner.id, content)
        }
        Err(e) => Err(e),
    }
}

fn overwrite(
    conn: &Connection,
    id: &str,
    content: &ReflectionContent,
) -> Result<(ReflectionRow, UpsertOutcome), JournalError> {
    let row = update_content(conn, id, content)?.ok_or_else(|| {
        JournalError::Internal(format!("Reflection {} disappeared during overwrite", id))
    })?;
    Ok((row, UpsertOutcome::Updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionContext;
    use crate::db::goals::{insert_goal, soft_delete_goal};
    use crate::db::models::GoalDraft;
    use crate::db::{schema::init_schema, users::ensure_user};

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ensure_user(&conn, &SessionContext::new("u1")).unwrap();
        let goal = insert_goal(&conn, "u1", &GoalDraft::new("Run", None).unwrap(), Utc::now())
            .unwrap();
        (conn, goal.id)
    }

    fn content(good: &str) -> ReflectionContent {
        ReflectionContent::new(good, None, None, None).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_record_daily_inserts_then_updates() {
        let (conn, goal_id) = setup();

        let (first, outcome) = record_daily(&conn, &goal_id, day(1), &content("A")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let (second, outcome) = record_daily(&conn, &goal_id, day(1), &content("B")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(second.id, first.id);
        assert_eq!(second.good, "B");
        assert_eq!(second.date, day(1));

        assert_eq!(list_live_for_goal(&conn, &goal_id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_duplicate_day_is_conflict() {
        let (conn, goal_id) = setup();
        insert_reflection(&conn, &goal_id, day(2), &content("A")).unwrap();
        let err = insert_reflection(&conn, &goal_id, day(2), &content("B")).unwrap_err();
        assert!(matches!(err, JournalError::Conflict(_)));
    }

    #[test]
    fn test_insert_or_overwrite_absorbs_conflict() {
        let (conn, goal_id) = setup();
        let winner = insert_reflection(&conn, &goal_id, day(3), &content("first")).unwrap();

        let (row, outcome) = insert_or_overwrite(&conn, &goal_id, day(3), &content("second")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(row.id, winner.id);
        assert_eq!(row.good, "second");
    }

    #[test]
    fn test_deleted_reflection_frees_the_day() {
        let (conn, goal_id) = setup();
        let (old, _) = record_daily(&conn, &goal_id, day(4), &content("old")).unwrap();
        assert!(soft_delete_reflection(&conn, &old.id, Utc::now()).unwrap());

        let (fresh, outcome) = record_daily(&conn, &goal_id, day(4), &content("new")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_ne!(fresh.id, old.id);
        assert!(find_live_reflection(&conn, &old.id).unwrap().is_none());
    }

    #[test]
    fn test_list_orders_by_day_and_limits() {
        let (conn, goal_id) = setup();
        for d in [2, 7, 5, 1, 9, 3] {
            record_daily(&conn, &goal_id, day(d), &content("x")).unwrap();
        }

        let days: Vec<_> = list_live_for_goal(&conn, &goal_id, Some(5))
            .unwrap()
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(days, vec![day(9), day(7), day(5), day(3), day(2)]);
    }

    #[test]
    fn test_owned_reflection_hidden_under_deleted_goal() {
        let (conn, goal_id) = setup();
        let (row, _) = record_daily(&conn, &goal_id, day(6), &content("x")).unwrap();

        let owned = find_owned_reflection(&conn, &row.id).unwrap().unwrap();
        assert_eq!(owned.owner_id, "u1");

        soft_delete_goal(&conn, &goal_id, Utc::now()).unwrap();
        assert!(find_owned_reflection(&conn, &row.id).unwrap().is_none());
        assert!(find_live_reflection(&conn, &row.id).unwrap().is_some());
    }
}
