//! Opening the journal store.
//!
//! File stores run in WAL mode so a reader (an open editor session) does not
//! block the writer applying a changeset. In-memory stores skip it.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use crate::config::JournalConfig;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreKind {
    File,
    Memory,
}

impl StoreKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens (creating if needed) the journal file at `path` and migrates it.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    open_store(StoreKind::File, || Connection::open(path))
}

/// Opens a throwaway migrated store, used by tests and dry runs.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_store(StoreKind::Memory, Connection::open_in_memory)
}

/// Opens the store at `config.database_path()`.
pub fn open_from_config(config: &JournalConfig) -> DbResult<Connection> {
    open_db(config.database_path())
}

fn open_store(
    kind: StoreKind,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = connect()
        .map_err(DbError::from)
        .and_then(|mut conn| prepare(&mut conn, kind).map(|applied| (conn, applied)));

    match result {
        Ok((conn, applied)) => {
            info!(
                "event=db_open module=db status=ok store={} migrations_applied={} duration_ms={}",
                kind.as_str(),
                applied,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error store={} duration_ms={} error={}",
                kind.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Sets pragmas and migrates; returns how many migrations ran.
fn prepare(conn: &mut Connection, kind: StoreKind) -> DbResult<usize> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if kind == StoreKind::File {
        // journal_mode answers with the resulting mode, so it must be read.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    }
    apply_migrations(conn)
}
