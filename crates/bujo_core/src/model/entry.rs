//! Journal entry domain model.
//!
//! # Responsibility
//! - Define the typed bullet (`Entry`) with its priority and hierarchy links.
//! - Expose per-type capabilities so callers branch on the tag, not on strings.
//!
//! # Invariants
//! - `depth == 0` if and only if `parent_entity_id` is `None`.
//! - `content` is never blank and reads back unchanged from its text line.
//! - `done` and `cancelled` entries are never overdue.

use super::entity_id::EntityId;
use super::ValidationError;
use crate::document::line::strip_priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bullet type of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Task,
    Note,
    Event,
    Done,
    Migrated,
    Cancelled,
    Question,
    Answer,
    Answered,
    MovedToList,
}

impl EntryType {
    pub const ALL: [EntryType; 10] = [
        Self::Task,
        Self::Note,
        Self::Event,
        Self::Done,
        Self::Migrated,
        Self::Cancelled,
        Self::Question,
        Self::Answer,
        Self::Answered,
        Self::MovedToList,
    ];

    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Note => "note",
            Self::Event => "event",
            Self::Done => "done",
            Self::Migrated => "migrated",
            Self::Cancelled => "cancelled",
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Answered => "answered",
            Self::MovedToList => "moved_to_list",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidEntryType(value.to_string()))
    }

    /// ASCII symbol used in the editable text form.
    ///
    /// `answer` has no symbol of its own and is written as a note.
    pub fn symbol(self) -> char {
        match self {
            Self::Task => '.',
            Self::Note | Self::Answer => '-',
            Self::Event => 'o',
            Self::Done => 'x',
            Self::Migrated => '>',
            Self::Cancelled => '~',
            Self::Question => '?',
            Self::Answered => '*',
            Self::MovedToList => '^',
        }
    }

    /// Symbol used by the display form.
    pub fn display_symbol(self) -> char {
        match self {
            Self::Task => '•',
            Self::Note | Self::Answer => '–',
            Self::Event => '○',
            Self::Done => '✓',
            Self::Migrated => '→',
            other => other.symbol(),
        }
    }

    /// Resolves an editable or display symbol to its type.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' | '•' => Some(Self::Task),
            '-' | '–' => Some(Self::Note),
            'o' | '○' => Some(Self::Event),
            'x' | '✓' => Some(Self::Done),
            '>' | '→' => Some(Self::Migrated),
            '~' => Some(Self::Cancelled),
            '?' => Some(Self::Question),
            '*' => Some(Self::Answered),
            '^' => Some(Self::MovedToList),
            _ => None,
        }
    }

    /// Types that no longer need action.
    pub fn has_terminal_state(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Cancelled | Self::Migrated | Self::Answered | Self::MovedToList
        )
    }

    /// Types whose `scheduled_date` participates in overdue checks.
    pub fn can_have_schedule(self) -> bool {
        matches!(self, Self::Task | Self::Event | Self::Question)
    }

    pub fn can_be_answered(self) -> bool {
        matches!(self, Self::Question)
    }

    /// Types that can be carried forward to another day.
    pub fn is_migration_source(self) -> bool {
        matches!(self, Self::Task | Self::Question)
    }
}

/// Entry priority level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parses a stored priority. Empty text is treated as `None`.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ValidationError::InvalidPriority(value.to_string())),
        }
    }

    /// Editable marker (`!`, `!!`, `!!!`), empty for `None`.
    pub fn marker(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Low => "!",
            Self::Medium => "!!",
            Self::High => "!!!",
        }
    }

    pub fn is_set(self) -> bool {
        self != Self::None
    }
}

/// One journal bullet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Storage row of the version this value was read from. `0` before insert.
    pub row_id: i64,
    pub entity_id: EntityId,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub content: String,
    #[serde(default)]
    pub priority: Priority,
    /// Row id of the parent version this value was read with, when known.
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub parent_entity_id: Option<EntityId>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub migration_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Creates a root-level entry with a freshly minted id.
    pub fn new(kind: EntryType, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::with_id(EntityId::new(), kind, content, created_at)
    }

    /// Creates a root-level entry with a caller-provided id.
    pub fn with_id(
        entity_id: EntityId,
        kind: EntryType,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            row_id: 0,
            entity_id,
            kind,
            content: content.into(),
            priority: Priority::None,
            parent_id: None,
            parent_entity_id: None,
            depth: 0,
            location: None,
            scheduled_date: None,
            migration_count: 0,
            created_at,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn scheduled(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_date = Some(at);
        self
    }

    /// Attaches this entry under `parent`, deriving depth from it.
    pub fn child_of(mut self, parent: &Entry) -> Self {
        self.parent_entity_id = Some(parent.entity_id);
        self.parent_id = (parent.row_id > 0).then_some(parent.row_id);
        self.depth = parent.depth + 1;
        self
    }

    /// Checks entry-local invariants.
    ///
    /// Parent existence and cycle checks need storage and live in the
    /// repository layer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if self.content.trim() != self.content {
            return Err(ValidationError::UnrepresentableContent(
                "leading or trailing whitespace",
            ));
        }
        if self.content.contains(['\n', '\r']) {
            return Err(ValidationError::UnrepresentableContent("line break"));
        }
        if !self.priority.is_set() && strip_priority(&self.content).0.is_set() {
            return Err(ValidationError::UnrepresentableContent(
                "reads as a priority marker",
            ));
        }
        let has_parent = self.parent_entity_id.is_some();
        if (self.depth == 0) == has_parent {
            return Err(ValidationError::DepthMismatch {
                depth: self.depth,
                has_parent,
            });
        }
        if self.parent_entity_id == Some(self.entity_id) {
            return Err(ValidationError::SelfParent(self.entity_id));
        }
        if matches!(self.location.as_deref(), Some(value) if value.trim().is_empty()) {
            return Err(ValidationError::EmptyField("location"));
        }
        Ok(())
    }

    /// Returns whether this entry is past its schedule and still actionable.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if self.kind.has_terminal_state() || !self.kind.can_have_schedule() {
            return false;
        }
        matches!(self.scheduled_date, Some(scheduled) if scheduled < now)
    }

    /// Returns whether type, content and priority match `other` as far as
    /// the editable text form can tell them apart.
    pub fn same_text_state(&self, other: &Entry) -> bool {
        self.kind.symbol() == other.kind.symbol()
            && self.content == other.content
            && self.priority == other.priority
    }
}
