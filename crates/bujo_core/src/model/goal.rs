//! Monthly goals.

use super::entity_id::EntityId;
use super::ValidationError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a monthly goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Done,
    Migrated,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Done => "done",
            Self::Migrated => "migrated",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "done" => Ok(Self::Done),
            "migrated" => Ok(Self::Migrated),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ValidationError::InvalidGoalStatus(value.to_string())),
        }
    }
}

/// A goal set for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub row_id: i64,
    pub entity_id: EntityId,
    pub content: String,
    /// First day of the goal's month.
    pub month: NaiveDate,
    pub status: GoalStatus,
    pub migrated_to: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Creates an active goal for the month containing `month`.
    pub fn new(content: impl Into<String>, month: NaiveDate, created_at: DateTime<Utc>) -> Self {
        Self {
            row_id: 0,
            entity_id: EntityId::new(),
            content: content.into(),
            month: first_of_month(month),
            status: GoalStatus::Active,
            migrated_to: None,
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if self.month.day() != 1 {
            return Err(ValidationError::InvalidGoalMonth(self.month));
        }
        if let Some(target) = self.migrated_to {
            if target.day() != 1 {
                return Err(ValidationError::InvalidGoalMonth(target));
            }
        }
        if (self.status == GoalStatus::Migrated) != self.migrated_to.is_some() {
            return Err(ValidationError::InconsistentGoalMigration);
        }
        Ok(())
    }
}

/// Normalizes any date to the first day of its month.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
