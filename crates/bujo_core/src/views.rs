//! Score-driven projections over stored entries.
//!
//! # Responsibility
//! - Build overdue, pending and attention-ranked views from repository reads.
//! - Resolve each entry's parent type for the scorer.
//!
//! # Invariants
//! - Views are read-only; they never write back.
//! - Ranking is stable: ties keep ascending `created_at`, then storage order.

use crate::attention::{self, AttentionScore};
use crate::model::entity_id::EntityId;
use crate::model::entry::{Entry, EntryType};
use crate::repo::{EntryRepository, RepoResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entry paired with its attention score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: Entry,
    pub attention: AttentionScore,
}

/// Scores `entries` and sorts them by descending score.
///
/// `parent_types` maps parent entity ids to their type; missing parents
/// score as if the entry had none.
pub fn rank(
    entries: Vec<Entry>,
    parent_types: &HashMap<EntityId, EntryType>,
    now: DateTime<Utc>,
) -> Vec<ScoredEntry> {
    let mut scored: Vec<ScoredEntry> = entries
        .into_iter()
        .map(|entry| {
            let parent_type = entry
                .parent_entity_id
                .and_then(|id| parent_types.get(&id).copied());
            let attention = attention::score(&entry, now, parent_type);
            ScoredEntry { entry, attention }
        })
        .collect();
    scored.sort_by(|left, right| {
        right
            .attention
            .score
            .cmp(&left.attention.score)
            .then_with(|| left.entry.created_at.cmp(&right.entry.created_at))
    });
    scored
}

/// Whether an entry still asks for action.
pub fn is_pending(entry: &Entry) -> bool {
    !entry.kind.has_terminal_state() && entry.kind.can_have_schedule()
}

/// Overdue entries, most pressing first.
pub fn overdue_view<R>(repo: &R, now: DateTime<Utc>) -> RepoResult<Vec<ScoredEntry>>
where
    R: EntryRepository + ?Sized,
{
    let overdue = repo.get_overdue(now)?;
    let parent_types = resolve_parent_types(repo, &overdue)?;
    Ok(rank(overdue, &parent_types, now))
}

/// Open tasks, events and questions ordered by schedule, unscheduled last.
pub fn pending_view<R>(repo: &R) -> RepoResult<Vec<Entry>>
where
    R: EntryRepository + ?Sized,
{
    let mut pending: Vec<Entry> = repo.get_all()?.into_iter().filter(is_pending).collect();
    pending.sort_by(|left, right| match (left.scheduled_date, right.scheduled_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    Ok(pending)
}

/// Pending entries with a positive score, highest first, capped at `limit`.
pub fn attention_view<R>(
    repo: &R,
    now: DateTime<Utc>,
    limit: usize,
) -> RepoResult<Vec<ScoredEntry>>
where
    R: EntryRepository + ?Sized,
{
    let all = repo.get_all()?;
    let parent_types: HashMap<EntityId, EntryType> =
        all.iter().map(|entry| (entry.entity_id, entry.kind)).collect();
    let pending: Vec<Entry> = all.into_iter().filter(is_pending).collect();

    let mut ranked = rank(pending, &parent_types, now);
    ranked.retain(|scored| scored.attention.score > 0);
    ranked.truncate(limit);
    Ok(ranked)
}

fn resolve_parent_types<R>(
    repo: &R,
    entries: &[Entry],
) -> RepoResult<HashMap<EntityId, EntryType>>
where
    R: EntryRepository + ?Sized,
{
    let mut parent_types = HashMap::new();
    for parent_id in entries.iter().filter_map(|entry| entry.parent_entity_id) {
        if parent_types.contains_key(&parent_id) {
            continue;
        }
        if let Some(parent) = repo.get_by_entity_id(parent_id)? {
            parent_types.insert(parent_id, parent.kind);
        }
    }
    Ok(parent_types)
}

#[cfg(test)]
mod tests {
    use super::{is_pending, rank};
    use crate::model::entry::{Entry, EntryType, Priority};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;

    #[test]
    fn rank_orders_by_score_then_age() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let older = Entry::new(EntryType::Task, "older", now - Duration::hours(2));
        let newer = Entry::new(EntryType::Task, "newer", now - Duration::hours(1));
        let urgent = Entry::new(EntryType::Task, "urgent", now).with_priority(Priority::High);

        let ranked = rank(vec![newer, older, urgent], &HashMap::new(), now);
        let contents: Vec<&str> = ranked.iter().map(|s| s.entry.content.as_str()).collect();
        assert_eq!(contents, vec!["urgent", "older", "newer"]);
    }

    #[test]
    fn pending_excludes_terminal_and_notes() {
        let now = Utc::now();
        assert!(is_pending(&Entry::new(EntryType::Task, "a", now)));
        assert!(is_pending(&Entry::new(EntryType::Question, "b", now)));
        assert!(!is_pending(&Entry::new(EntryType::Done, "c", now)));
        assert!(!is_pending(&Entry::new(EntryType::Note, "d", now)));
    }
}
