//! Activity queries

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use crate::error::JournalError;

/// One entry per live reflection under the user's live goals.
///
/// Days repeat when the user reflected on several goals that day.
pub fn live_reflection_days(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<NaiveDate>, JournalError> {
    let mut stmt = conn
        .prepare(
            "SELECT r.date
             FROM live_reflections r
             JOIN live_goals g ON g.id = r.goal_id
             WHERE g.user_id = ?",
        )
        .map_err(|e| JournalError::Database(format!("Failed to prepare statement: {}", e)))?;

    let rows = stmt
        .query_map(params![user_id], |row| row.get::<_, NaiveDate>(0))
        .map_err(|e| JournalError::Database(format!("Failed to query activity: {}", e)))?;

    let mut days = Vec::new();
    for row in rows {
        days.push(row.map_err(|e| JournalError::Database(format!("Failed to read row: {}", e)))?);
    }

    Ok(days)
}
