//! Diff of an edited document against its persisted snapshot.
//!
//! # Responsibility
//! - Turn parsed lines into typed write operations keyed by entity id.
//! - Track hierarchy through a depth-indexed parent stack.
//!
//! # Invariants
//! - Operations follow line order; deletes come last.
//! - Inserts carry a freshly minted entity id so later lines can use it as a
//!   parent before anything is persisted.
//! - Type changes are plain updates; storage interprets terminal types.

use super::parser::EditableDocument;
use super::{ParseError, MSG_DUPLICATE_ENTITY, MSG_ORPHAN_CHILD};
use crate::model::entity_id::EntityId;
use crate::model::entry::Entry;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Policy for entities present in the snapshot but missing from the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplicitDeletes {
    /// Delete missing entities only when the editor sent no explicit deletes.
    #[default]
    WhenNoPendingDeletes,
    /// Always delete missing entities.
    Always,
    /// Only explicit deletes are emitted.
    Never,
}

/// Inputs the diff needs besides the two documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesetContext {
    /// `created_at` for inserted entries.
    pub now: DateTime<Utc>,
    /// Day inserted entries belong to.
    pub scheduled_date: Option<DateTime<Utc>>,
    /// Location stamped on inserted entries.
    pub location: Option<String>,
    pub implicit_deletes: ImplicitDeletes,
}

impl ChangesetContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            scheduled_date: None,
            location: None,
            implicit_deletes: ImplicitDeletes::default(),
        }
    }

    pub fn scheduled_on(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_date = Some(at);
        self
    }

    pub fn with_implicit_deletes(mut self, policy: ImplicitDeletes) -> Self {
        self.implicit_deletes = policy;
        self
    }
}

/// One write derived from the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DiffOp {
    Insert {
        line_number: usize,
        entry: Entry,
    },
    Update {
        line_number: usize,
        entity_id: EntityId,
        /// Full new state.
        entry: Entry,
    },
    Delete {
        entity_id: EntityId,
    },
    Reparent {
        line_number: usize,
        entity_id: EntityId,
        new_parent: Option<EntityId>,
        depth: u32,
    },
    Migrate {
        line_number: usize,
        entity_id: EntityId,
        target: NaiveDate,
    },
}

impl DiffOp {
    /// Line the operation came from; deletes have none.
    pub fn line_number(&self) -> Option<usize> {
        match self {
            Self::Insert { line_number, .. }
            | Self::Update { line_number, .. }
            | Self::Reparent { line_number, .. }
            | Self::Migrate { line_number, .. } => Some(*line_number),
            Self::Delete { .. } => None,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Insert { entry, .. } => entry.entity_id,
            Self::Update { entity_id, .. }
            | Self::Delete { entity_id }
            | Self::Reparent { entity_id, .. }
            | Self::Migrate { entity_id, .. } => *entity_id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Reparent { .. } => "reparent",
            Self::Migrate { .. } => "migrate",
        }
    }
}

/// Ordered operations plus the line errors found while diffing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    pub operations: Vec<DiffOp>,
    pub errors: Vec<ParseError>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.errors.is_empty()
    }
}

/// Diffs `document` against the `original` snapshot.
pub fn compute_changeset(
    original: &[Entry],
    document: &EditableDocument,
    ctx: &ChangesetContext,
) -> Changeset {
    let original_by_id: HashMap<EntityId, &Entry> = original
        .iter()
        .map(|entry| (entry.entity_id, entry))
        .collect();

    let mut changeset = Changeset::default();
    let mut parent_stack: Vec<EntityId> = Vec::new();
    // Ids kept alive by any line, and ids already taken by a valid line.
    let mut seen: HashSet<EntityId> = HashSet::new();
    let mut claimed: HashSet<EntityId> = HashSet::new();

    for line in &document.lines {
        if line.is_header || line.is_blank() {
            continue;
        }

        if !line.is_valid {
            if let Some(message) = &line.error_message {
                changeset
                    .errors
                    .push(ParseError::new(line.line_number, message.clone()));
            }
            // A typo must not turn into an implicit delete.
            if let Some(id) = line.entity_id {
                seen.insert(id);
            }
            continue;
        }

        let Some(kind) = line.kind else {
            continue;
        };

        if line.depth > 0 && parent_stack.is_empty() {
            changeset
                .errors
                .push(ParseError::new(line.line_number, MSG_ORPHAN_CHILD));
            if let Some(id) = line.entity_id {
                seen.insert(id);
            }
            continue;
        }

        parent_stack.truncate(line.depth as usize);
        let depth = parent_stack.len() as u32;
        let parent = if depth > 0 {
            parent_stack.last().copied()
        } else {
            None
        };

        let existing = match line.entity_id {
            Some(id) if !claimed.insert(id) => {
                changeset.errors.push(ParseError::new(
                    line.line_number,
                    format!("{MSG_DUPLICATE_ENTITY} {id}"),
                ));
                parent_stack.push(id);
                continue;
            }
            Some(id) => {
                seen.insert(id);
                original_by_id.get(&id).copied()
            }
            None => None,
        };

        let Some(original_entry) = existing else {
            let mut entry = Entry::new(kind, line.content.clone(), ctx.now)
                .with_priority(line.priority);
            entry.parent_entity_id = parent;
            entry.depth = depth;
            entry.location = ctx.location.clone();
            entry.scheduled_date = match line.migration_target {
                Some(target) => Some(start_of_day(target)),
                None => ctx.scheduled_date,
            };
            parent_stack.push(entry.entity_id);
            changeset.operations.push(DiffOp::Insert {
                line_number: line.line_number,
                entry,
            });
            continue;
        };

        let entity_id = original_entry.entity_id;
        // A root line whose stored parent lives outside the snapshot keeps it.
        let (parent, depth) = match original_entry.parent_entity_id {
            Some(outside) if parent.is_none() && !original_by_id.contains_key(&outside) => {
                (Some(outside), original_entry.depth)
            }
            _ => (parent, depth),
        };
        if let Some(target) = line.migration_target {
            changeset.operations.push(DiffOp::Migrate {
                line_number: line.line_number,
                entity_id,
                target,
            });
            parent_stack.push(entity_id);
            continue;
        }

        if original_entry.parent_entity_id != parent {
            changeset.operations.push(DiffOp::Reparent {
                line_number: line.line_number,
                entity_id,
                new_parent: parent,
                depth,
            });
        }

        let mut updated = original_entry.clone();
        updated.kind = kind;
        updated.content = line.content.clone();
        updated.priority = line.priority;
        if !updated.same_text_state(original_entry) {
            if updated.kind.symbol() == original_entry.kind.symbol() {
                updated.kind = original_entry.kind;
            }
            if parent != original_entry.parent_entity_id {
                updated.parent_entity_id = parent;
                updated.depth = depth;
                updated.parent_id = None;
            }
            changeset.operations.push(DiffOp::Update {
                line_number: line.line_number,
                entity_id,
                entry: updated,
            });
        }

        parent_stack.push(entity_id);
    }

    let mut deleted: HashSet<EntityId> = HashSet::new();
    for id in &document.pending_deletes {
        if original_by_id.contains_key(id) && deleted.insert(*id) {
            changeset.operations.push(DiffOp::Delete { entity_id: *id });
        }
    }

    let implicit = match ctx.implicit_deletes {
        ImplicitDeletes::Always => true,
        ImplicitDeletes::WhenNoPendingDeletes => document.pending_deletes.is_empty(),
        ImplicitDeletes::Never => false,
    };
    if implicit {
        for entry in original {
            if !seen.contains(&entry.entity_id) && deleted.insert(entry.entity_id) {
                changeset.operations.push(DiffOp::Delete {
                    entity_id: entry.entity_id,
                });
            }
        }
    }

    debug!(
        "event=changeset_computed module=document status=ok lines={} operations={} errors={}",
        document.lines.len(),
        changeset.operations.len(),
        changeset.errors.len()
    );
    changeset
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}
