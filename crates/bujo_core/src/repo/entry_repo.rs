//! Entry repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Store every entry change as a new version row.
//! - Answer current, historical ("as of") and hierarchical reads.
//!
//! # Invariants
//! - Exactly one row per entity has `valid_to IS NULL`.
//! - Parents referenced by live entries are live themselves.
//! - `depth` equals the parent's depth plus one; reparenting rewrites the
//!   depth of every live descendant.
//! - Reparenting never changes `entity_id`.

use super::versioning::{self, CurrentRow};
use super::{
    day_start_millis, ensure_connection_ready, from_millis, parse_entity_id,
    parse_optional_entity_id, to_millis, to_u32, Clock, RepoContext, RepoError, RepoResult,
    SearchOptions,
};
use crate::cancel::CancellationToken;
use crate::document::changeset::start_of_day;
use crate::model::entity_id::EntityId;
use crate::model::entry::{Entry, EntryType, Priority};
use crate::model::version::{OpType, Versioned};
use crate::model::ValidationError;
use crate::text::extract_tags;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;

const TABLE: &str = "entries";
const KIND: &str = "entry";

const ENTRY_SELECT_SQL: &str = "SELECT
    row_id,
    entity_id,
    version,
    valid_from,
    valid_to,
    op_type,
    type,
    content,
    priority,
    parent_entity_id,
    (SELECT p.row_id
       FROM entries p
      WHERE p.entity_id = entries.parent_entity_id
        AND p.valid_to IS NULL
        AND p.op_type != 'DELETE') AS parent_row_id,
    depth,
    location,
    scheduled_date,
    migration_count,
    created_at
FROM entries";

const LIVE_FILTER: &str = "valid_to IS NULL AND op_type != 'DELETE'";

const ENTRY_ORDER_SQL: &str = " ORDER BY created_at ASC,
    (SELECT MIN(h.row_id) FROM entries h WHERE h.entity_id = entries.entity_id) ASC";

/// Repository interface for versioned journal entries.
pub trait EntryRepository {
    /// Inserts version 1 of a new entity and returns its row id.
    fn insert(&self, entry: &Entry) -> RepoResult<i64>;
    /// Loads one stored version by row id. Tombstone rows are not returned.
    fn get_by_row_id(&self, row_id: i64) -> RepoResult<Option<Entry>>;
    /// Loads the current live version of an entity.
    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<Entry>>;
    /// Live entries scheduled on `date` (UTC day).
    fn get_by_date(&self, date: NaiveDate) -> RepoResult<Vec<Entry>>;
    /// Live entries scheduled within `[from, to]` (UTC days).
    fn get_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Entry>>;
    /// Live actionable entries scheduled strictly before `as_of`.
    fn get_overdue(&self, as_of: DateTime<Utc>) -> RepoResult<Vec<Entry>>;
    /// Live direct children of the entity stored at `parent_row_id`.
    fn get_children(&self, parent_row_id: i64) -> RepoResult<Vec<Entry>>;
    /// The entry at `row_id` followed by its live descendants, depth-first.
    fn get_with_children(&self, row_id: i64) -> RepoResult<Vec<Entry>>;
    /// Every live entry.
    fn get_all(&self) -> RepoResult<Vec<Entry>>;
    /// Appends a new version carrying the full state of `entry`.
    fn update(&self, entry: &Entry) -> RepoResult<i64>;
    /// Tombstones one entity; its live children move up one level.
    fn delete(&self, entity_id: EntityId) -> RepoResult<()>;
    /// Tombstones an entity and all of its live descendants.
    fn delete_with_children(&self, entity_id: EntityId) -> RepoResult<usize>;
    /// Marks an entry migrated and inserts its continuation on `target`.
    fn migrate(&self, entity_id: EntityId, target: NaiveDate) -> RepoResult<EntityId>;
    /// All versions of one entity, oldest first.
    fn get_history(&self, entity_id: EntityId) -> RepoResult<Vec<Versioned<Entry>>>;
    /// Version valid at `at`, unless the entity was absent or deleted then.
    fn get_as_of(&self, entity_id: EntityId, at: DateTime<Utc>) -> RepoResult<Option<Entry>>;
    fn search(&self, options: &SearchOptions) -> RepoResult<Vec<Entry>>;
}

/// SQLite-backed entry repository.
pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
    ctx: RepoContext,
}

impl<'conn> SqliteEntryRepository<'conn> {
    /// Wraps `conn` without checking its schema version.
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            ctx: RepoContext::new(),
        }
    }

    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            ctx: RepoContext::new(),
        })
    }

    /// Replaces the clock used for `valid_from` / `valid_to`.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.ctx.set_clock(clock);
        self
    }

    /// Fails every later operation once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.ctx.set_cancellation(token);
        self
    }

    fn query_entries(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Entry>> {
        query_entries(self.conn, sql, bind_values)
    }

    fn live_children(&self, parent: EntityId) -> RepoResult<Vec<Entry>> {
        self.query_entries(
            &format!(
                "{ENTRY_SELECT_SQL} WHERE parent_entity_id = ? AND {LIVE_FILTER}{ENTRY_ORDER_SQL};"
            ),
            vec![Value::Text(parent.to_string())],
        )
    }

    fn collect_subtree(
        &self,
        entry: Entry,
        visited: &mut HashSet<EntityId>,
        out: &mut Vec<Entry>,
    ) -> RepoResult<()> {
        if !visited.insert(entry.entity_id) {
            return Ok(());
        }
        let entity_id = entry.entity_id;
        out.push(entry);
        for child in self.live_children(entity_id)? {
            self.collect_subtree(child, visited, out)?;
        }
        Ok(())
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn insert(&self, entry: &Entry) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        entry.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        if versioning::entity_exists(&tx, TABLE, entry.entity_id)? {
            return Err(RepoError::Conflict(format!(
                "entry {} already exists",
                entry.entity_id
            )));
        }
        ensure_parent_consistent(&tx, entry)?;

        let row_id = insert_version(&tx, entry, 1, OpType::Insert, self.ctx.now())?;
        tx.commit()?;

        debug!(
            "event=entry_insert module=repo status=ok entity_id={} row_id={}",
            entry.entity_id, row_id
        );
        Ok(row_id)
    }

    fn get_by_row_id(&self, row_id: i64) -> RepoResult<Option<Entry>> {
        self.ctx.check_cancelled()?;
        let mut entries = self.query_entries(
            &format!("{ENTRY_SELECT_SQL} WHERE row_id = ? AND op_type != 'DELETE';"),
            vec![Value::Integer(row_id)],
        )?;
        Ok(entries.pop())
    }

    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<Entry>> {
        self.ctx.check_cancelled()?;
        load_live(self.conn, entity_id)
    }

    fn get_by_date(&self, date: NaiveDate) -> RepoResult<Vec<Entry>> {
        self.get_by_date_range(date, date)
    }

    fn get_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Entry>> {
        self.ctx.check_cancelled()?;
        let end = to + Duration::days(1);
        self.query_entries(
            &format!(
                "{ENTRY_SELECT_SQL}
                 WHERE {LIVE_FILTER}
                   AND scheduled_date >= ?
                   AND scheduled_date < ?{ENTRY_ORDER_SQL};"
            ),
            vec![
                Value::Integer(day_start_millis(from)),
                Value::Integer(day_start_millis(end)),
            ],
        )
    }

    fn get_overdue(&self, as_of: DateTime<Utc>) -> RepoResult<Vec<Entry>> {
        self.ctx.check_cancelled()?;
        let candidates = self.query_entries(
            &format!(
                "{ENTRY_SELECT_SQL}
                 WHERE {LIVE_FILTER}
                   AND scheduled_date IS NOT NULL
                   AND scheduled_date < ?
                 ORDER BY scheduled_date ASC, created_at ASC;"
            ),
            vec![Value::Integer(to_millis(as_of))],
        )?;
        Ok(candidates
            .into_iter()
            .filter(|entry| entry.is_overdue(as_of))
            .collect())
    }

    fn get_children(&self, parent_row_id: i64) -> RepoResult<Vec<Entry>> {
        self.ctx.check_cancelled()?;
        let parent = self
            .get_by_row_id(parent_row_id)?
            .ok_or_else(|| RepoError::not_found(KIND, format!("row {parent_row_id}")))?;
        self.live_children(parent.entity_id)
    }

    fn get_with_children(&self, row_id: i64) -> RepoResult<Vec<Entry>> {
        self.ctx.check_cancelled()?;
        let root = self
            .get_by_row_id(row_id)?
            .ok_or_else(|| RepoError::not_found(KIND, format!("row {row_id}")))?;
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.collect_subtree(root, &mut visited, &mut out)?;
        Ok(out)
    }

    fn get_all(&self) -> RepoResult<Vec<Entry>> {
        self.ctx.check_cancelled()?;
        self.query_entries(
            &format!("{ENTRY_SELECT_SQL} WHERE {LIVE_FILTER}{ENTRY_ORDER_SQL};"),
            Vec::new(),
        )
    }

    fn update(&self, entry: &Entry) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        entry.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let current = versioning::live_row(&tx, TABLE, KIND, entry.entity_id)?;
        let stored = load_live(&tx, entry.entity_id)?
            .ok_or_else(|| RepoError::not_found(KIND, entry.entity_id))?;
        ensure_parent_consistent(&tx, entry)?;

        let mut next = entry.clone();
        next.created_at = stored.created_at;
        let at = current.next_valid_from(self.ctx.now());
        let row_id = append_version(&tx, &current, &next, OpType::Update, at)?;
        if next.depth != stored.depth {
            rebase_descendants(&tx, next.entity_id, next.depth, self.ctx.now())?;
        }
        tx.commit()?;

        debug!(
            "event=entry_update module=repo status=ok entity_id={} version={}",
            entry.entity_id,
            current.version + 1
        );
        Ok(row_id)
    }

    fn delete(&self, entity_id: EntityId) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let tx = self.conn.unchecked_transaction()?;
        let stored =
            load_live(&tx, entity_id)?.ok_or_else(|| RepoError::not_found(KIND, entity_id))?;

        for child in query_entries(
            &tx,
            &format!("{ENTRY_SELECT_SQL} WHERE parent_entity_id = ? AND {LIVE_FILTER};"),
            vec![Value::Text(entity_id.to_string())],
        )? {
            let mut promoted = child.clone();
            promoted.parent_entity_id = stored.parent_entity_id;
            promoted.parent_id = None;
            promoted.depth = stored.depth;
            let current = versioning::live_row(&tx, TABLE, KIND, child.entity_id)?;
            let at = current.next_valid_from(self.ctx.now());
            append_version(&tx, &current, &promoted, OpType::Update, at)?;
            rebase_descendants(&tx, promoted.entity_id, promoted.depth, self.ctx.now())?;
        }

        tombstone(&tx, &stored, self.ctx.now())?;
        tx.commit()?;

        debug!("event=entry_delete module=repo status=ok entity_id={entity_id}");
        Ok(())
    }

    fn delete_with_children(&self, entity_id: EntityId) -> RepoResult<usize> {
        self.ctx.check_cancelled()?;
        let tx = self.conn.unchecked_transaction()?;
        let root =
            load_live(&tx, entity_id)?.ok_or_else(|| RepoError::not_found(KIND, entity_id))?;

        let mut doomed = vec![root];
        let mut index = 0;
        while index < doomed.len() {
            let parent = doomed[index].entity_id;
            doomed.extend(query_entries(
                &tx,
                &format!("{ENTRY_SELECT_SQL} WHERE parent_entity_id = ? AND {LIVE_FILTER};"),
                vec![Value::Text(parent.to_string())],
            )?);
            index += 1;
        }

        let now = self.ctx.now();
        for entry in doomed.iter().rev() {
            tombstone(&tx, entry, now)?;
        }
        tx.commit()?;

        info!(
            "event=entry_delete_tree module=repo status=ok entity_id={} removed={}",
            entity_id,
            doomed.len()
        );
        Ok(doomed.len())
    }

    fn migrate(&self, entity_id: EntityId, target: NaiveDate) -> RepoResult<EntityId> {
        self.ctx.check_cancelled()?;
        let tx = self.conn.unchecked_transaction()?;
        let current = versioning::live_row(&tx, TABLE, KIND, entity_id)?;
        let source =
            load_live(&tx, entity_id)?.ok_or_else(|| RepoError::not_found(KIND, entity_id))?;
        if source.kind.has_terminal_state() {
            return Err(RepoError::Conflict(format!(
                "entry {entity_id} is {} and cannot be migrated",
                source.kind.as_str()
            )));
        }

        let now = self.ctx.now();
        let mut migrated = source.clone();
        migrated.kind = EntryType::Migrated;
        append_version(&tx, &current, &migrated, OpType::Update, current.next_valid_from(now))?;

        let mut continuation = Entry::new(source.kind, source.content.clone(), source.created_at)
            .with_priority(source.priority)
            .scheduled(start_of_day(target));
        continuation.location = source.location.clone();
        continuation.migration_count = source.migration_count.saturating_add(1);
        insert_version(&tx, &continuation, 1, OpType::Insert, now)?;
        tx.commit()?;

        info!(
            "event=entry_migrate module=repo status=ok entity_id={} continuation={} migrations={}",
            entity_id, continuation.entity_id, continuation.migration_count
        );
        Ok(continuation.entity_id)
    }

    fn get_history(&self, entity_id: EntityId) -> RepoResult<Vec<Versioned<Entry>>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE entity_id = ?1 ORDER BY version ASC;"))?;
        let mut rows = stmt.query([entity_id.to_string()])?;
        let mut history = Vec::new();
        while let Some(row) = rows.next()? {
            history.push(Versioned {
                info: versioning::parse_version_info(row, TABLE)?,
                value: parse_entry_row(row)?,
            });
        }
        Ok(history)
    }

    fn get_as_of(&self, entity_id: EntityId, at: DateTime<Utc>) -> RepoResult<Option<Entry>> {
        self.ctx.check_cancelled()?;
        let mut entries = self.query_entries(
            &format!(
                "{ENTRY_SELECT_SQL}
                 WHERE entity_id = ?
                   AND valid_from <= ?
                   AND (valid_to IS NULL OR valid_to > ?)
                   AND op_type != 'DELETE';"
            ),
            vec![
                Value::Text(entity_id.to_string()),
                Value::Integer(to_millis(at)),
                Value::Integer(to_millis(at)),
            ],
        )?;
        Ok(entries.pop())
    }

    fn search(&self, options: &SearchOptions) -> RepoResult<Vec<Entry>> {
        self.ctx.check_cancelled()?;
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE {LIVE_FILTER}");
        let mut bind_values: Vec<Value> = Vec::new();

        let query = options.query.trim();
        if !query.is_empty() {
            sql.push_str(" AND content LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(format!("%{}%", escape_like(query))));
        }
        if let Some(kind) = options.kind {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(from) = options.date_from {
            sql.push_str(" AND scheduled_date >= ?");
            bind_values.push(Value::Integer(day_start_millis(from)));
        }
        if let Some(to) = options.date_to {
            sql.push_str(" AND scheduled_date < ?");
            bind_values.push(Value::Integer(day_start_millis(to + Duration::days(1))));
        }
        sql.push_str(ENTRY_ORDER_SQL);

        let wanted_tags: Vec<String> = options
            .tags
            .iter()
            .map(|tag| tag.trim().trim_start_matches('#').to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        if wanted_tags.is_empty() {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(options.limit)));
        }

        let mut entries = self.query_entries(&sql, bind_values)?;
        if !wanted_tags.is_empty() {
            entries.retain(|entry| {
                let tags = extract_tags(&entry.content);
                wanted_tags.iter().all(|tag| tags.contains(tag))
            });
            entries.truncate(options.limit as usize);
        }
        Ok(entries)
    }
}

fn query_entries(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Entry>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_entry_row(row)?);
    }
    Ok(entries)
}

fn load_live(conn: &Connection, entity_id: EntityId) -> RepoResult<Option<Entry>> {
    let mut entries = query_entries(
        conn,
        &format!("{ENTRY_SELECT_SQL} WHERE entity_id = ? AND {LIVE_FILTER};"),
        vec![Value::Text(entity_id.to_string())],
    )?;
    Ok(entries.pop())
}

/// Checks parent existence, depth agreement and acyclicity for a write.
fn ensure_parent_consistent(conn: &Connection, entry: &Entry) -> RepoResult<()> {
    let Some(parent_id) = entry.parent_entity_id else {
        return Ok(());
    };
    let parent = load_live(conn, parent_id)?
        .ok_or_else(|| RepoError::not_found("parent entry", parent_id))?;
    if entry.depth != parent.depth + 1 {
        return Err(RepoError::Validation(ValidationError::DepthMismatch {
            depth: entry.depth,
            has_parent: true,
        }));
    }

    let mut visited = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(current) = cursor {
        if current == entry.entity_id || !visited.insert(current) {
            return Err(RepoError::Conflict(format!(
                "moving entry {} under {} would create a cycle",
                entry.entity_id, parent_id
            )));
        }
        cursor = conn
            .query_row(
                &format!("SELECT parent_entity_id FROM entries WHERE entity_id = ?1 AND {LIVE_FILTER};"),
                [current.to_string()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten()
            .map(|text| parse_entity_id(&text, "entries.parent_entity_id"))
            .transpose()?;
    }
    Ok(())
}

/// Rewrites the depth of every live descendant of `entity_id`.
fn rebase_descendants(
    conn: &Connection,
    entity_id: EntityId,
    depth: u32,
    now: DateTime<Utc>,
) -> RepoResult<()> {
    let children = query_entries(
        conn,
        &format!("{ENTRY_SELECT_SQL} WHERE parent_entity_id = ? AND {LIVE_FILTER};"),
        vec![Value::Text(entity_id.to_string())],
    )?;
    for child in children {
        if child.depth == depth + 1 {
            continue;
        }
        let mut moved = child.clone();
        moved.depth = depth + 1;
        let current = versioning::live_row(conn, TABLE, KIND, child.entity_id)?;
        append_version(conn, &current, &moved, OpType::Update, current.next_valid_from(now))?;
        rebase_descendants(conn, moved.entity_id, moved.depth, now)?;
    }
    Ok(())
}

fn tombstone(conn: &Connection, entry: &Entry, now: DateTime<Utc>) -> RepoResult<()> {
    let current = versioning::live_row(conn, TABLE, KIND, entry.entity_id)?;
    append_version(conn, &current, entry, OpType::Delete, current.next_valid_from(now))?;
    Ok(())
}

/// Closes `current` and appends the next version of the entity.
fn append_version(
    conn: &Connection,
    current: &CurrentRow,
    entry: &Entry,
    op_type: OpType,
    at: DateTime<Utc>,
) -> RepoResult<i64> {
    versioning::close_row(conn, TABLE, current.row_id, at)?;
    insert_version(conn, entry, current.version + 1, op_type, at)
}

fn insert_version(
    conn: &Connection,
    entry: &Entry,
    version: u32,
    op_type: OpType,
    valid_from: DateTime<Utc>,
) -> RepoResult<i64> {
    conn.execute(
        "INSERT INTO entries (
            entity_id,
            version,
            valid_from,
            valid_to,
            op_type,
            type,
            content,
            priority,
            parent_entity_id,
            depth,
            location,
            scheduled_date,
            migration_count,
            created_at
        ) VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
        params![
            entry.entity_id.to_string(),
            i64::from(version),
            to_millis(valid_from),
            op_type.as_str(),
            entry.kind.as_str(),
            entry.content.as_str(),
            entry.priority.as_str(),
            entry.parent_entity_id.map(|id| id.to_string()),
            i64::from(entry.depth),
            entry.location.as_deref(),
            entry.scheduled_date.map(to_millis),
            i64::from(entry.migration_count),
            to_millis(entry.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<Entry> {
    let entity_text: String = row.get("entity_id")?;
    let type_text: String = row.get("type")?;
    let priority_text: String = row.get("priority")?;
    let kind = EntryType::parse(&type_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid entry type `{type_text}` in entries.type"))
    })?;
    let priority = Priority::parse(&priority_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in entries.priority"
        ))
    })?;
    let scheduled_date = match row.get::<_, Option<i64>>("scheduled_date")? {
        Some(value) => Some(from_millis(value, "entries.scheduled_date")?),
        None => None,
    };

    Ok(Entry {
        row_id: row.get("row_id")?,
        entity_id: parse_entity_id(&entity_text, "entries.entity_id")?,
        kind,
        content: row.get("content")?,
        priority,
        parent_id: row.get("parent_row_id")?,
        parent_entity_id: parse_optional_entity_id(
            row.get("parent_entity_id")?,
            "entries.parent_entity_id",
        )?,
        depth: to_u32(row.get("depth")?, "entries.depth")?,
        location: row.get("location")?,
        scheduled_date,
        migration_count: to_u32(row.get("migration_count")?, "entries.migration_count")?,
        created_at: from_millis(row.get("created_at")?, "entries.created_at")?,
    })
}

pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
