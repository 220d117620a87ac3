//! Multi-line document parsing.

use super::date::DateParser;
use super::line::{parse_line, ParsedLine};
use super::ParseError;
use crate::model::entity_id::EntityId;
use serde::{Deserialize, Serialize};

/// Parsed form of an edited journal buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableDocument {
    /// Lines in buffer order.
    pub lines: Vec<ParsedLine>,
    /// Entities the editor workflow removed explicitly.
    pub pending_deletes: Vec<EntityId>,
}

impl EditableDocument {
    /// Attaches an out-of-band entity id to a 1-based line.
    ///
    /// Returns `false` when the line does not exist.
    pub fn set_entity_id(&mut self, line_number: usize, entity_id: EntityId) -> bool {
        match line_number
            .checked_sub(1)
            .and_then(|index| self.lines.get_mut(index))
        {
            Some(line) => {
                line.entity_id = Some(entity_id);
                true
            }
            None => false,
        }
    }

    /// Records an explicit deletion. Duplicates are ignored.
    pub fn mark_deleted(&mut self, entity_id: EntityId) {
        if !self.pending_deletes.contains(&entity_id) {
            self.pending_deletes.push(entity_id);
        }
    }

    /// Lines that describe entries.
    pub fn entries(&self) -> impl Iterator<Item = &ParsedLine> {
        self.lines.iter().filter(|line| line.is_entry())
    }

    /// Line-level errors (blank lines are not errors).
    pub fn errors(&self) -> Vec<ParseError> {
        self.lines
            .iter()
            .filter_map(|line| {
                line.error_message
                    .as_ref()
                    .map(|message| ParseError::new(line.line_number, message.clone()))
            })
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.lines.iter().any(|line| line.error_message.is_some())
    }

    /// Renders every line canonically, joined without a trailing newline.
    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(ParsedLine::canonical)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parses a buffer into an `EditableDocument`, one `ParsedLine` per line.
pub fn parse_document(text: &str, dates: &dyn DateParser) -> EditableDocument {
    let lines = text
        .lines()
        .enumerate()
        .map(|(index, raw)| parse_line(raw, index + 1, dates))
        .collect();
    EditableDocument {
        lines,
        pending_deletes: Vec::new(),
    }
}

/// Parses a buffer and attaches one optional entity id per line, in order.
///
/// Extra ids are ignored; missing ids leave the line without identity.
pub fn parse_document_with_ids(
    text: &str,
    ids: &[Option<EntityId>],
    dates: &dyn DateParser,
) -> EditableDocument {
    let mut document = parse_document(text, dates);
    for (line, id) in document.lines.iter_mut().zip(ids) {
        line.entity_id = *id;
    }
    document
}
