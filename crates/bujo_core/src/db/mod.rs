//! Journal store bootstrap.
//!
//! Every connection handed out here has foreign keys on and the schema at
//! [`migrations::latest_version`]; repositories refuse anything else.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_from_config};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-level failure below the repository layer.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Creating the store directory failed.
    Io(std::io::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    /// A schema step failed; the whole upgrade was rolled back.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Io(err) => write!(f, "cannot prepare journal directory: {err}"),
            Self::UnsupportedSchemaVersion { found, supported } => write!(
                f,
                "journal schema version {found} is newer than this build supports ({supported})"
            ),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "schema migration {version} ({name}) failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::Io(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
