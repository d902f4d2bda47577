//! User bootstrap
//!
//! Users are never created or deleted explicitly. The first goal a session
//! creates inserts the profile; later calls are no-ops.

use rusqlite::{params, Connection, OptionalExtension};

use crate::auth::SessionContext;
use crate::error::JournalError;

use super::models::UserRow;

/// Display name used when the identity provider supplies none
pub const UNKNOWN_NAME: &str = "Unknown";

/// Get a user by ID
pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>, JournalError> {
    conn.query_row(
        "SELECT id, email, name, image FROM users WHERE id = ?",
        params![id],
        |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                image: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(|e| JournalError::Database(format!("Failed to get user: {}", e)))
}

/// Create the session's user if absent. Returns true when a row was inserted.
pub fn ensure_user(conn: &Connection, session: &SessionContext) -> Result<bool, JournalError> {
    let inserted = conn
        .execute(
            "INSERT INTO users (id, email, name, image) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
            params![
                session.user_id,
                session.email.as_deref().unwrap_or(""),
                session.name.as_deref().unwrap_or(UNKNOWN_NAME),
                session.image,
            ],
        )
        .map_err(|e| JournalError::Database(format!("Failed to ensure user: {}", e)))?;

    Ok(inserted > 0)
}
