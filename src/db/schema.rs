//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::JournalError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), JournalError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(JOURNAL_SCHEMA)
            .map_err(|e| JournalError::Database(format!("Failed to create tables: {}", e)))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, JournalError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| JournalError::Database(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), JournalError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

/// Journal tables.
///
/// Soft-deleted rows stay in the base tables. Reads go through the `live_*`
/// views, which expose `rowid` as `seq` for stable tie-breaking.
const JOURNAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL,
    image TEXT
);

CREATE TABLE IF NOT EXISTS goals (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'archived')),
    created_at TEXT NOT NULL,
    deleted_at TEXT,

    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS reflections (
    id TEXT PRIMARY KEY NOT NULL,
    goal_id TEXT NOT NULL,
    -- YYYY-MM-DD, midnight implied
    date TEXT NOT NULL,
    good TEXT NOT NULL CHECK (length(trim(good)) > 0),
    bad TEXT,
    analysis TEXT,
    next_action TEXT,
    deleted_at TEXT,

    FOREIGN KEY (goal_id) REFERENCES goals(id)
);

CREATE INDEX IF NOT EXISTS idx_goals_user_live
    ON goals(user_id, created_at) WHERE deleted_at IS NULL;

-- At most one live reflection per goal and day
CREATE UNIQUE INDEX IF NOT EXISTS idx_reflections_goal_day_live
    ON reflections(goal_id, date) WHERE deleted_at IS NULL;

CREATE VIEW IF NOT EXISTS live_goals AS
    SELECT rowid AS seq, * FROM goals WHERE deleted_at IS NULL;

CREATE VIEW IF NOT EXISTS live_reflections AS
    SELECT rowid AS seq, * FROM reflections WHERE deleted_at IS NULL;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_partial_unique_index_allows_deleted_duplicates() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name) VALUES ('u', 'U');
             INSERT INTO goals (id, user_id, title, created_at) VALUES ('g', 'u', 'T', '2024-01-01');
             INSERT INTO reflections (id, goal_id, date, good, deleted_at)
                 VALUES ('r1', 'g', '2024-01-01', 'old', '2024-01-02');
             INSERT INTO reflections (id, goal_id, date, good) VALUES ('r2', 'g', '2024-01-01', 'new');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO reflections (id, goal_id, date, good) VALUES ('r3', 'g', '2024-01-01', 'again')",
            [],
        );
        assert!(crate::error::is_unique_violation(&dup.unwrap_err()));
    }
}
