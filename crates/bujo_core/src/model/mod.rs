//! Journal domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by parsing, diffing and storage.
//! - Own invariant checks (`validate()`) shared by every write path.
//!
//! # Invariants
//! - Every durable object is identified by a stable `EntityId`.
//! - Row ids are storage-assigned and change with every stored version.
//! - Validation never panics; it reports a typed `ValidationError`.

pub mod day_context;
pub mod entity_id;
pub mod entry;
pub mod goal;
pub mod habit;
pub mod list;
pub mod summary;
pub mod version;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Invariant violation detected on a domain object or an input value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Text content is blank after trim.
    EmptyContent,
    /// Content cannot be written to a single editable line and read back as is.
    UnrepresentableContent(&'static str),
    /// Name is blank after trim.
    EmptyName,
    /// Entry type string is not part of the known type set.
    InvalidEntryType(String),
    /// Priority string is not part of the known priority set.
    InvalidPriority(String),
    /// Depth and parent link disagree.
    DepthMismatch { depth: u32, has_parent: bool },
    /// Entity cannot be its own parent.
    SelfParent(entity_id::EntityId),
    /// Summary horizon string is unknown.
    InvalidHorizon(String),
    /// Summary end date precedes its start date.
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    /// Habit goal must be a positive integer.
    InvalidHabitGoal(i64),
    /// Habit log count must be a positive integer.
    InvalidLogCount(i64),
    /// Goal month must be the first day of a month.
    InvalidGoalMonth(chrono::NaiveDate),
    /// Goal status string is unknown.
    InvalidGoalStatus(String),
    /// `migrated_to` must be set exactly when status is `migrated`.
    InconsistentGoalMigration,
    /// Optional text field was provided but blank.
    EmptyField(&'static str),
    /// Model spec string is malformed.
    InvalidModelSpec(String),
    /// Prompt type string is unknown.
    InvalidPromptType(String),
    /// Entity identifier is malformed or nil.
    InvalidEntityId(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "content must not be empty"),
            Self::UnrepresentableContent(reason) => {
                write!(f, "content cannot round-trip through text: {reason}")
            }
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::InvalidEntryType(value) => write!(f, "invalid entry type `{value}`"),
            Self::InvalidPriority(value) => write!(f, "invalid priority `{value}`"),
            Self::DepthMismatch { depth, has_parent } => write!(
                f,
                "depth {depth} does not agree with parent link (has_parent={has_parent})"
            ),
            Self::SelfParent(id) => write!(f, "entity {id} cannot be its own parent"),
            Self::InvalidHorizon(value) => write!(f, "invalid summary horizon `{value}`"),
            Self::InvalidDateRange { start, end } => {
                write!(f, "end date {end} must not precede start date {start}")
            }
            Self::InvalidHabitGoal(value) => {
                write!(f, "habit goal per day must be positive, got {value}")
            }
            Self::InvalidLogCount(value) => {
                write!(f, "habit log count must be positive, got {value}")
            }
            Self::InvalidGoalMonth(value) => {
                write!(f, "goal month must be the first day of a month, got {value}")
            }
            Self::InvalidGoalStatus(value) => write!(f, "invalid goal status `{value}`"),
            Self::InconsistentGoalMigration => write!(
                f,
                "goal migrated_to must be set if and only if status is migrated"
            ),
            Self::EmptyField(field) => write!(f, "{field} must not be empty when present"),
            Self::InvalidModelSpec(value) => write!(f, "invalid model spec `{value}`"),
            Self::InvalidPromptType(value) => write!(f, "invalid prompt type `{value}`"),
            Self::InvalidEntityId(value) => write!(f, "invalid entity id `{value}`"),
        }
    }
}

impl Error for ValidationError {}
