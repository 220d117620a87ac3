//! Named lists and their versioned items.

use super::entity_id::EntityId;
use super::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named container for list items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub row_id: i64,
    pub entity_id: EntityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl List {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            row_id: 0,
            entity_id: EntityId::new(),
            name: name.into(),
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

/// Item state inside a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListItemType {
    Task,
    Done,
    Cancelled,
}

impl ListItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ValidationError::InvalidEntryType(value.to_string())),
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Task
    }
}

/// One item of a named list. Versioned like entries, without hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub row_id: i64,
    pub entity_id: EntityId,
    pub list_entity_id: EntityId,
    #[serde(rename = "type")]
    pub kind: ListItemType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ListItem {
    pub fn new(
        list_entity_id: EntityId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            row_id: 0,
            entity_id: EntityId::new(),
            list_entity_id,
            kind: ListItemType::Task,
            content: content.into(),
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        Ok(())
    }
}
