//! SQLite database module for the goal journal
//!
//! ## Tables
//!
//! - `users` - Profiles, created lazily from the session on first goal
//! - `goals` - Goals owned by one user, soft-deleted via `deleted_at`
//! - `reflections` - Daily reflections owned by one goal
//!
//! Reads go through the `live_goals` / `live_reflections` views so soft-deleted
//! rows are filtered in exactly one place.

pub mod activity;
pub mod goals;
pub mod models;
pub mod reflections;
pub mod schema;
pub mod users;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::JournalError;

/// How long a writer waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database for the journal
pub struct JournalDb {
    conn: Mutex<Connection>,
}

impl JournalDb {
    /// Open or create the journal database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, JournalError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| JournalError::Database(format!("Failed to open SQLite: {}", e)))?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| JournalError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, JournalError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            JournalError::Database(format!("Failed to open in-memory SQLite: {}", e))
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), JournalError> {
        self.with_conn(schema::init_schema)
    }

    /// Run a read with the shared connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, JournalError>
    where
        F: FnOnce(&Connection) -> Result<T, JournalError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| JournalError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, JournalError>
    where
        F: FnOnce(&mut Connection) -> Result<T, JournalError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| JournalError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Row counts for the health endpoint
    pub fn stats(&self) -> Result<DbStats, JournalError> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64, JournalError> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                user_count: count("SELECT COUNT(*) FROM users")?,
                goal_count: count("SELECT COUNT(*) FROM live_goals")?,
                reflection_count: count("SELECT COUNT(*) FROM live_reflections")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub user_count: u64,
    pub goal_count: u64,
    pub reflection_count: u64,
}

// Re-exports
pub use models::{
    GoalDraft, GoalRow, GoalStatus, GoalWithReflections, Lifecycle, OwnedReflection,
    ReflectionContent, ReflectionRow, UpsertOutcome, UserRow,
};
