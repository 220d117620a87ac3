//! Core of a plain-text bullet journal.
//!
//! Typed entries round-trip through an editable text form, persist as
//! versioned rows with stable entity ids, and feed attention and habit views.

pub mod ai;
pub mod attention;
pub mod cancel;
pub mod config;
pub mod db;
pub mod document;
pub mod habit_stats;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod text;
pub mod views;

pub use ai::{AiAdapter, AiError, AiProvider, ReflectionGenerator, TokenStream};
pub use attention::{AttentionScore, Indicator};
pub use cancel::CancellationToken;
pub use config::{ConfigError, JournalConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use document::{
    compute_changeset, parse_document, parse_document_with_ids, serialize, serialize_day,
    serialize_with_ids, Changeset, ChangesetContext, DiffOp, EditableDocument, ImplicitDeletes,
    ParseError, RelativeDateParser,
};
pub use habit_stats::HabitSummary;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity_id::EntityId;
pub use model::entry::{Entry, EntryType, Priority};
pub use model::ValidationError;
pub use repo::{RepoError, RepoResult, SearchOptions};
pub use service::changeset_service::{apply_changeset, ApplyError, ApplyReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
