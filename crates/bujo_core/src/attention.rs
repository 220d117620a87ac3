//! Attention scoring for surfacing entries that need a look.
//!
//! # Responsibility
//! - Compute an additive, deterministic score per entry.
//! - Report which signals contributed, in a stable order.
//!
//! # Invariants
//! - Every component is non-negative; the score is their sum.
//! - Indicators are never duplicated and keep the declaration order of
//!   `Indicator`.

use crate::model::entry::{Entry, EntryType, Priority};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const OVERDUE_POINTS: u32 = 50;
const PRIORITY_POINTS: u32 = 30;
const HIGH_PRIORITY_BONUS: u32 = 20;
const AGING_LONG_POINTS: u32 = 25;
const AGING_SHORT_POINTS: u32 = 15;
const URGENT_WORD_POINTS: u32 = 20;
const QUESTION_POINTS: u32 = 10;
const EVENT_CHILD_POINTS: u32 = 5;
const PER_MIGRATION_POINTS: u32 = 15;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

const URGENT_WORDS: &[&str] = &["urgent", "asap", "blocker", "waiting", "blocked"];

/// Signal that contributed to an attention score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Overdue,
    Priority,
    Aging,
    Migrated,
}

impl Indicator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Priority => "priority",
            Self::Aging => "aging",
            Self::Migrated => "migrated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionScore {
    pub score: u32,
    pub indicators: Vec<Indicator>,
    /// Whole days since creation, floored. Negative when `created_at` is in the future.
    pub days_old: i64,
}

/// Scores one entry at `now`.
///
/// `parent_type` is the type of the entry's parent, when it has one.
pub fn score(entry: &Entry, now: DateTime<Utc>, parent_type: Option<EntryType>) -> AttentionScore {
    let mut total = 0;
    let mut indicators = Vec::new();

    if counts_as_overdue(entry, now) {
        total += OVERDUE_POINTS;
        indicators.push(Indicator::Overdue);
    }

    if entry.priority.is_set() {
        total += PRIORITY_POINTS;
        indicators.push(Indicator::Priority);
        if entry.priority == Priority::High {
            total += HIGH_PRIORITY_BONUS;
        }
    }

    let age = now - entry.created_at;
    if age > Duration::days(7) {
        total += AGING_LONG_POINTS;
        indicators.push(Indicator::Aging);
    } else if age > Duration::days(3) {
        total += AGING_SHORT_POINTS;
        indicators.push(Indicator::Aging);
    }

    if contains_urgent_word(&entry.content) {
        total += URGENT_WORD_POINTS;
    }

    if entry.kind == EntryType::Question {
        total += QUESTION_POINTS;
    }

    if entry.parent_entity_id.is_some() && parent_type == Some(EntryType::Event) {
        total += EVENT_CHILD_POINTS;
    }

    if entry.migration_count > 0 {
        total += PER_MIGRATION_POINTS.saturating_mul(entry.migration_count);
        indicators.push(Indicator::Migrated);
    }

    AttentionScore {
        score: total,
        indicators,
        days_old: age.num_seconds().div_euclid(SECONDS_PER_DAY),
    }
}

/// Any past schedule counts unless the entry is finished or moved on.
fn counts_as_overdue(entry: &Entry, now: DateTime<Utc>) -> bool {
    if matches!(
        entry.kind,
        EntryType::Done | EntryType::Cancelled | EntryType::Migrated
    ) {
        return false;
    }
    matches!(entry.scheduled_date, Some(scheduled) if scheduled < now)
}

fn contains_urgent_word(content: &str) -> bool {
    let lowered = content.to_lowercase();
    URGENT_WORDS.iter().any(|word| lowered.contains(word))
}

#[cfg(test)]
mod tests {
    use super::contains_urgent_word;

    #[test]
    fn urgent_words_match_case_insensitively() {
        assert!(contains_urgent_word("Ship it ASAP"));
        assert!(contains_urgent_word("Blocked on review"));
        assert!(!contains_urgent_word("calm afternoon"));
    }
}
