//! Error types for StepLoop
//!
//! One variant per failure class, each mapped to an HTTP status.

use hyper::StatusCode;

/// Main error type for journal operations
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation raised by the store. `record_daily` absorbs it.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JournalError {
    /// Shorthand for a required-field failure
    pub fn required(field: &'static str) -> Self {
        Self::Validation {
            field,
            message: format!("{} is required", field),
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Field name for validation failures, used in response bodies
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Whether a rusqlite error is a UNIQUE constraint failure.
///
/// SQLite reports partial-index violations as
/// "UNIQUE constraint failed: reflections.goal_id, reflections.date".
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == rusqlite::ErrorCode::ConstraintViolation
                && (code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || message
                        .as_deref()
                        .map(|m| m.contains("UNIQUE constraint"))
                        .unwrap_or(false))
        }
        _ => false,
    }
}

impl From<rusqlite::Error> for JournalError {
    fn from(err: rusqlite::Error) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict(err.to_string())
        } else {
            Self::Database(err.to_string())
        }
    }
}

impl From<std::io::Error> for JournalError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation {
            field: "body",
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<hyper::Error> for JournalError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

/// Result type alias for journal operations
pub type Result<T> = std::result::Result<T, JournalError>;
