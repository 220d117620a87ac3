//! Canonical text rendering of stored entries.
//!
//! # Invariants
//! - Without parent links, entries keep input order and their stored depth.
//! - With parent links, output is a stable depth-first walk: each root is
//!   followed by its descendants, siblings keep input order, and
//!   indentation comes from the walk depth.
//! - Output never ends with a newline.

use crate::model::entity_id::EntityId;
use crate::model::entry::Entry;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// Rendered text plus the entity id behind each emitted line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializedDocument {
    pub text: String,
    /// One element per line of `text`; `None` for header lines.
    pub line_ids: Vec<Option<EntityId>>,
}

/// Renders entries into the editable text form.
pub fn serialize(entries: &[Entry]) -> String {
    serialize_with_ids(entries).text
}

/// Renders entries and reports the entity id carried by each line.
pub fn serialize_with_ids(entries: &[Entry]) -> SerializedDocument {
    let mut lines = Vec::with_capacity(entries.len());
    let mut line_ids = Vec::with_capacity(entries.len());
    for (entry, depth) in ordered_with_depth(entries) {
        lines.push(format_entry_line(entry, depth));
        line_ids.push(Some(entry.entity_id));
    }
    SerializedDocument {
        text: lines.join("\n"),
        line_ids,
    }
}

/// Renders one day: a header line followed by the day's entries.
pub fn serialize_day(date: NaiveDate, entries: &[Entry]) -> SerializedDocument {
    let body = serialize_with_ids(entries);
    let header = format!("── {} ──", date.format("%A, %B %-d %Y"));
    let mut line_ids = Vec::with_capacity(body.line_ids.len() + 1);
    line_ids.push(None);
    line_ids.extend(body.line_ids);
    let text = if body.text.is_empty() {
        header
    } else {
        format!("{header}\n{}", body.text)
    };
    SerializedDocument { text, line_ids }
}

/// Formats one entry at an explicit depth.
pub fn format_entry_line(entry: &Entry, depth: u32) -> String {
    let mut line = "  ".repeat(depth as usize);
    line.push(entry.kind.symbol());
    line.push(' ');
    if entry.priority.is_set() {
        line.push_str(entry.priority.marker());
        line.push(' ');
    }
    line.push_str(&entry.content);
    line
}

fn ordered_with_depth(entries: &[Entry]) -> Vec<(&Entry, u32)> {
    let row_to_entity: HashMap<i64, EntityId> = entries
        .iter()
        .filter(|entry| entry.row_id > 0)
        .map(|entry| (entry.row_id, entry.entity_id))
        .collect();
    let parent_of = |entry: &Entry| -> Option<EntityId> {
        entry.parent_entity_id.or_else(|| {
            entry
                .parent_id
                .and_then(|row_id| row_to_entity.get(&row_id).copied())
        })
    };

    if entries.iter().all(|entry| parent_of(entry).is_none()) {
        return entries.iter().map(|entry| (entry, entry.depth)).collect();
    }

    let known: HashSet<EntityId> = entries.iter().map(|entry| entry.entity_id).collect();
    let mut children: HashMap<EntityId, Vec<&Entry>> = HashMap::new();
    let mut roots = Vec::new();
    for entry in entries {
        match parent_of(entry) {
            Some(parent) if known.contains(&parent) && parent != entry.entity_id => {
                children.entry(parent).or_default().push(entry);
            }
            _ => roots.push(entry),
        }
    }

    let mut ordered = Vec::with_capacity(entries.len());
    let mut visited = HashSet::new();
    for root in roots {
        emit_subtree(root, 0, &children, &mut visited, &mut ordered);
    }
    ordered
}

fn emit_subtree<'a>(
    entry: &'a Entry,
    depth: u32,
    children: &HashMap<EntityId, Vec<&'a Entry>>,
    visited: &mut HashSet<EntityId>,
    ordered: &mut Vec<(&'a Entry, u32)>,
) {
    if !visited.insert(entry.entity_id) {
        return;
    }
    ordered.push((entry, depth));
    if let Some(kids) = children.get(&entry.entity_id) {
        for child in kids {
            emit_subtree(child, depth + 1, children, visited, ordered);
        }
    }
}
