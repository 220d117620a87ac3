//! Journal schema steps, tracked in `PRAGMA user_version`.
//!
//! Steps are applied in version order inside one transaction, so a store is
//! either fully upgraded or left at its previous version.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "entries",
        sql: include_str!("0001_entries.sql"),
    },
    Migration {
        version: 2,
        name: "lists",
        sql: include_str!("0002_lists.sql"),
    },
    Migration {
        version: 3,
        name: "habits_goals",
        sql: include_str!("0003_habits_goals.sql"),
    },
    Migration {
        version: 4,
        name: "days_summaries",
        sql: include_str!("0004_days_summaries.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Schema version recorded in the store.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Brings the store up to [`latest_version`] and returns how many steps ran.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the store is newer than this build.
/// - `Migration` naming the step that failed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::UnsupportedSchemaVersion { found, supported });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > found)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from={} to={} steps={}",
        found,
        supported,
        pending.len()
    );
    Ok(pending.len())
}
