//! Habit tracker definitions and log records.

use super::entity_id::EntityId;
use super::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked habit with a daily target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub row_id: i64,
    pub entity_id: EntityId,
    pub name: String,
    pub goal_per_day: u32,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(name: impl Into<String>, goal_per_day: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            row_id: 0,
            entity_id: EntityId::new(),
            name: name.into(),
            goal_per_day,
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.goal_per_day == 0 {
            return Err(ValidationError::InvalidHabitGoal(0));
        }
        Ok(())
    }
}

/// One completion record for a habit.
///
/// Carries both the habit row id and its entity id so logs stay attached to
/// the habit across renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitLog {
    pub row_id: i64,
    pub habit_id: i64,
    pub habit_entity_id: EntityId,
    pub count: u32,
    pub logged_at: DateTime<Utc>,
}

impl HabitLog {
    pub fn for_habit(habit: &Habit, count: u32, logged_at: DateTime<Utc>) -> Self {
        Self {
            row_id: 0,
            habit_id: habit.row_id,
            habit_entity_id: habit.entity_id,
            count,
            logged_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(ValidationError::InvalidLogCount(0));
        }
        Ok(())
    }
}
