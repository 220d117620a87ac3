//! Version-row bookkeeping shared by history-tracked tables.
//!
//! # Invariants
//! - Only `entries` and `list_items` go through these helpers.
//! - Closing a row sets `valid_to` no earlier than its `valid_from`, so a
//!   clock that steps backwards never produces an inverted interval.

use super::{from_millis, parse_entity_id, to_millis, to_u32, RepoError, RepoResult};
use crate::model::entity_id::EntityId;
use crate::model::version::{OpType, VersionInfo};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Current row of one entity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CurrentRow {
    pub row_id: i64,
    pub version: u32,
    pub valid_from: DateTime<Utc>,
    pub op_type: OpType,
}

impl CurrentRow {
    pub fn is_live(&self) -> bool {
        self.op_type != OpType::Delete
    }

    /// Timestamp for the next version: `now`, clamped to this row's start.
    pub fn next_valid_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.valid_from)
    }
}

pub(crate) fn current_row(
    conn: &Connection,
    table: &'static str,
    entity_id: EntityId,
) -> RepoResult<Option<CurrentRow>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT row_id, version, valid_from, op_type
                 FROM {table}
                 WHERE entity_id = ?1 AND valid_to IS NULL;"
            ),
            [entity_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((row_id, version, valid_from, op_type)) = row else {
        return Ok(None);
    };
    Ok(Some(CurrentRow {
        row_id,
        version: to_u32(version, &format!("{table}.version"))?,
        valid_from: from_millis(valid_from, &format!("{table}.valid_from"))?,
        op_type: parse_op_type(&op_type, table)?,
    }))
}

/// Current live row, or `NotFound`.
pub(crate) fn live_row(
    conn: &Connection,
    table: &'static str,
    kind: &'static str,
    entity_id: EntityId,
) -> RepoResult<CurrentRow> {
    match current_row(conn, table, entity_id)? {
        Some(current) if current.is_live() => Ok(current),
        _ => Err(RepoError::not_found(kind, entity_id)),
    }
}

/// Whether any version row exists for the entity, tombstones included.
pub(crate) fn entity_exists(
    conn: &Connection,
    table: &'static str,
    entity_id: EntityId,
) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE entity_id = ?1);"),
        [entity_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Ends the validity interval of a row.
pub(crate) fn close_row(
    conn: &Connection,
    table: &'static str,
    row_id: i64,
    valid_to: DateTime<Utc>,
) -> RepoResult<()> {
    conn.execute(
        &format!("UPDATE {table} SET valid_to = ?1 WHERE row_id = ?2 AND valid_to IS NULL;"),
        params![to_millis(valid_to), row_id],
    )?;
    Ok(())
}

/// Reads the envelope columns of a version row.
pub(crate) fn parse_version_info(row: &Row<'_>, table: &'static str) -> RepoResult<VersionInfo> {
    let entity_text: String = row.get("entity_id")?;
    let op_text: String = row.get("op_type")?;
    let valid_to = match row.get::<_, Option<i64>>("valid_to")? {
        Some(value) => Some(from_millis(value, &format!("{table}.valid_to"))?),
        None => None,
    };
    Ok(VersionInfo {
        row_id: row.get("row_id")?,
        entity_id: parse_entity_id(&entity_text, &format!("{table}.entity_id"))?,
        version: to_u32(row.get("version")?, &format!("{table}.version"))?,
        valid_from: from_millis(row.get("valid_from")?, &format!("{table}.valid_from"))?,
        valid_to,
        op_type: parse_op_type(&op_text, table)?,
    })
}

fn parse_op_type(value: &str, table: &'static str) -> RepoResult<OpType> {
    OpType::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid op_type `{value}` in {table}")))
}
