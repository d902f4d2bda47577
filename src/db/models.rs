//! Row types and validated inputs for the journal tables

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::auth::Owned;
use crate::error::{JournalError, Result};

// =============================================================================
// Lifecycle
// =============================================================================

/// Soft-delete state of a row, mapped from the nullable `deleted_at` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted { at: DateTime<Utc> },
}

impl Lifecycle {
    pub fn from_deleted_at(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            None => Lifecycle::Active,
            Some(at) => Lifecycle::Deleted { at },
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted { at } => Some(*at),
        }
    }
}

// =============================================================================
// Goal status
// =============================================================================

/// Goal status. Transitions only active -> archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Archived,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(GoalStatus::Active),
            "archived" => Ok(GoalStatus::Archived),
            other => Err(format!("unknown goal status: {}", other)),
        }
    }
}

impl ToSql for GoalStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for GoalStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

// =============================================================================
// Rows
// =============================================================================

/// User row (created lazily on first goal creation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
}

/// Goal row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub lifecycle: Lifecycle,
}

impl Owned for GoalRow {
    const KIND: &'static str = "Goal";

    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

/// Reflection row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionRow {
    pub id: String,
    pub goal_id: String,
    /// Day granularity; immutable once set
    pub date: NaiveDate,
    pub good: String,
    pub bad: Option<String>,
    pub analysis: Option<String>,
    pub next_action: Option<String>,
    pub lifecycle: Lifecycle,
}

/// Reflection joined with the owner of its live parent goal
#[derive(Debug, Clone)]
pub struct OwnedReflection {
    pub reflection: ReflectionRow,
    pub owner_id: String,
}

impl Owned for OwnedReflection {
    const KIND: &'static str = "Reflection";

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Goal with its most recent reflections, as shown on the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct GoalWithReflections {
    #[serde(flatten)]
    pub goal: GoalRow,
    pub reflections: Vec<ReflectionRow>,
}

/// Whether `record_daily` created a row or overwrote the day's row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

// =============================================================================
// Validated inputs
// =============================================================================

/// Empty submissions of optional text are stored as absent
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Required text, trimmed
pub fn required_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(JournalError::required(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Required identifier
pub fn required_id<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(JournalError::required(field))
    } else {
        Ok(trimmed)
    }
}

/// Validated title/description pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalDraft {
    pub title: String,
    pub description: Option<String>,
}

impl GoalDraft {
    pub fn new(title: &str, description: Option<String>) -> Result<Self> {
        Ok(Self {
            title: required_text("title", title)?,
            description: optional_text(description),
        })
    }
}

/// Validated reflection content fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionContent {
    pub good: String,
    pub bad: Option<String>,
    pub analysis: Option<String>,
    pub next_action: Option<String>,
}

impl ReflectionContent {
    pub fn new(
        good: &str,
        bad: Option<String>,
        analysis: Option<String>,
        next_action: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            good: required_text("good", good)?,
            bad: optional_text(bad),
            analysis: optional_text(analysis),
            next_action: optional_text(next_action),
        })
    }
}

// =============================================================================
// Days
// =============================================================================

/// Truncate a timestamp to its calendar day (midnight)
pub fn truncate_to_day(at: NaiveDateTime) -> NaiveDate {
    at.date()
}

/// Parse a submitted date.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS[.f]]` and RFC 3339 with an
/// offset. The calendar date is taken as written; offsets are not converted.
pub fn parse_submitted_date(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day.and_time(NaiveTime::MIN));
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(at);
        }
    }

    Err(JournalError::Validation {
        field: "date",
        message: format!("unrecognized date: {}", raw),
    })
}
