//! Versioning envelope for history-tracked objects.
//!
//! # Invariants
//! - At most one row per entity has `valid_to = None`; that row is current.
//! - `version` starts at 1 (the INSERT row) and strictly increases.
//! - A current row with `op_type = Delete` marks a tombstoned entity.

use super::entity_id::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of write that produced a version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpType {
    Insert,
    Update,
    Delete,
}

impl OpType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Bookkeeping carried by every stored version row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub row_id: i64,
    pub entity_id: EntityId,
    pub version: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub op_type: OpType,
}

impl VersionInfo {
    /// Returns whether this row is the current version of its entity.
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Returns whether this row is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.op_type == OpType::Delete
    }

    /// Returns whether `at` falls inside `[valid_from, valid_to)`.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if at < self.valid_from {
            return false;
        }
        match self.valid_to {
            Some(valid_to) => at < valid_to,
            None => true,
        }
    }
}

/// One historical version of an object together with its envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub info: VersionInfo,
    pub value: T,
}
