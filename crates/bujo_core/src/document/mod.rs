//! Editable text round-trip for journal entries.
//!
//! # Responsibility
//! - Parse the plain-text journal format line by line.
//! - Serialize stored entries back into that format.
//! - Diff an edited document against its persisted snapshot.
//!
//! # Invariants
//! - Parsing never reorders lines and never panics.
//! - For valid inputs, `parse(serialize(entries))` diffs to an empty changeset.
//! - Entity ids travel out-of-band, one optional id per line.

pub mod changeset;
pub mod date;
pub mod line;
pub mod parser;
pub mod serializer;

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use changeset::{
    compute_changeset, Changeset, ChangesetContext, DiffOp, ImplicitDeletes,
};
pub use date::{DateParser, RelativeDateParser};
pub use line::{parse_line, ParsedLine};
pub use parser::{parse_document, parse_document_with_ids, EditableDocument};
pub use serializer::{serialize, serialize_day, serialize_with_ids, SerializedDocument};

pub const MSG_UNKNOWN_TYPE: &str = "Unknown entry type";
pub const MSG_CONTENT_REQUIRED: &str = "Entry content required";
pub const MSG_UNCLOSED_MIGRATION: &str = "Unclosed migration bracket";
pub const MSG_MIGRATION_DATE_REQUIRED: &str = "Migration date required";
pub const MSG_INVALID_MIGRATION_DATE: &str = "Invalid migration date";
pub const MSG_ORPHAN_CHILD: &str = "Orphan child: indented entry has no parent";
pub const MSG_DUPLICATE_ENTITY: &str = "Duplicate entity id";

/// Malformed line reported by parsing or diffing.
///
/// Parse errors are collected, never raised: the rest of the document is
/// still processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    /// 1-based line number in the edited document.
    pub line_number: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line_number: usize, message: impl Into<String>) -> Self {
        Self {
            line_number,
            message: message.into(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.message)
    }
}

impl Error for ParseError {}
