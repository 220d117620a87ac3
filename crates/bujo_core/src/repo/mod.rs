//! Repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define per-family data access contracts the core depends on.
//! - Isolate SQLite query details and version bookkeeping from callers.
//!
//! # Invariants
//! - Write paths call the model's `validate()` before any SQL mutation.
//! - Each repository operation is atomic on its own; nothing spans calls.
//! - A tripped cancellation token fails the operation before storage is touched.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod day_context_repo;
pub mod entry_repo;
pub mod goal_repo;
pub mod habit_repo;
pub mod list_repo;
pub mod summary_repo;
mod versioning;

use crate::cancel::CancellationToken;
use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::entity_id::EntityId;
use crate::model::entry::EntryType;
use crate::model::ValidationError;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use day_context_repo::{DayContextRepository, SqliteDayContextRepository};
pub use entry_repo::{EntryRepository, SqliteEntryRepository};
pub use goal_repo::{GoalRepository, SqliteGoalRepository};
pub use habit_repo::{
    HabitLogRepository, HabitRepository, SqliteHabitLogRepository, SqliteHabitRepository,
};
pub use list_repo::{
    ListItemRepository, ListRepository, SqliteListItemRepository, SqliteListRepository,
};
pub use summary_repo::{SqliteSummaryRepository, SummaryRepository};

pub type RepoResult<T> = Result<T, RepoError>;

/// Source of "now" for version bookkeeping.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const SEARCH_DEFAULT_LIMIT: u32 = 50;

/// Repository error shared by every entity family.
#[derive(Debug)]
pub enum RepoError {
    /// Object failed its invariant checks.
    Validation(ValidationError),
    /// Underlying SQLite or filesystem failure.
    Db(DbError),
    /// Lookup expected a row and found none.
    NotFound { kind: &'static str, key: String },
    /// Write would duplicate an identity or break the hierarchy.
    Conflict(String),
    /// Cancellation token was tripped.
    Cancelled,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted into a valid model.
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, key } => write!(f, "{kind} not found: {key}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Search filters for entry lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Case-insensitive substring over content. Blank matches everything.
    pub query: String,
    pub kind: Option<EntryType>,
    /// Inclusive lower bound on the scheduled day.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the scheduled day.
    pub date_to: Option<NaiveDate>,
    /// Every tag must be present in the content (`#tag`).
    pub tags: Vec<String>,
    pub limit: u32,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kind: None,
            date_from: None,
            date_to: None,
            tags: Vec::new(),
            limit: SEARCH_DEFAULT_LIMIT,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new("")
    }
}

/// Clock and cancellation shared by SQLite repositories.
#[derive(Clone)]
pub(crate) struct RepoContext {
    clock: Clock,
    cancel: Option<CancellationToken>,
}

impl RepoContext {
    pub(crate) fn new() -> Self {
        Self {
            clock: Arc::new(Utc::now),
            cancel: None,
        }
    }

    pub(crate) fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    pub(crate) fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub(crate) fn check_cancelled(&self) -> RepoResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(RepoError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Verifies that `conn` carries the fully migrated schema.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

pub(crate) fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn from_millis(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value)
        .single()
        .ok_or_else(|| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

pub(crate) fn date_to_db(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_db_date(value: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

pub(crate) fn parse_entity_id(value: &str, column: &str) -> RepoResult<EntityId> {
    EntityId::parse(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid entity id `{value}` in {column}")))
}

pub(crate) fn parse_optional_entity_id(
    value: Option<String>,
    column: &str,
) -> RepoResult<Option<EntityId>> {
    value
        .map(|text| parse_entity_id(&text, column))
        .transpose()
}

/// Start of `date` in UTC as epoch milliseconds.
pub(crate) fn day_start_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
        .timestamp_millis()
}

pub(crate) fn to_u32(value: i64, column: &str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}
