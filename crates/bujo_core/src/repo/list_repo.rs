//! List and list item repositories.
//!
//! # Responsibility
//! - Persist named lists as plain rows.
//! - Persist list items with the same version envelope as entries.
//!
//! # Invariants
//! - List names are unique, compared case-insensitively.
//! - Items always belong to an existing list; deleting a list removes its
//!   items and their history.

use super::versioning::{self, CurrentRow};
use super::{
    ensure_connection_ready, from_millis, parse_entity_id, to_millis, Clock, RepoContext,
    RepoError, RepoResult,
};
use crate::cancel::CancellationToken;
use crate::model::entity_id::EntityId;
use crate::model::list::{List, ListItem, ListItemType};
use crate::model::version::{OpType, Versioned};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

const ITEM_TABLE: &str = "list_items";
const ITEM_KIND: &str = "list item";

const LIST_SELECT_SQL: &str = "SELECT row_id, entity_id, name, created_at FROM lists";

const ITEM_SELECT_SQL: &str = "SELECT
    row_id,
    entity_id,
    version,
    valid_from,
    valid_to,
    op_type,
    list_entity_id,
    type,
    content,
    created_at
FROM list_items";

/// Repository interface for named lists.
pub trait ListRepository {
    fn create(&self, list: &List) -> RepoResult<i64>;
    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<List>>;
    /// Case-insensitive lookup.
    fn get_by_name(&self, name: &str) -> RepoResult<Option<List>>;
    /// All lists ordered by name.
    fn get_all(&self) -> RepoResult<Vec<List>>;
    fn rename(&self, entity_id: EntityId, name: &str) -> RepoResult<()>;
    /// Removes the list together with its items.
    fn delete(&self, entity_id: EntityId) -> RepoResult<()>;
}

/// Repository interface for versioned list items.
pub trait ListItemRepository {
    fn insert(&self, item: &ListItem) -> RepoResult<i64>;
    fn get_by_row_id(&self, row_id: i64) -> RepoResult<Option<ListItem>>;
    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<ListItem>>;
    /// Live items of one list in creation order.
    fn get_by_list(&self, list_entity_id: EntityId) -> RepoResult<Vec<ListItem>>;
    fn update(&self, item: &ListItem) -> RepoResult<i64>;
    fn delete(&self, entity_id: EntityId) -> RepoResult<()>;
    fn get_history(&self, entity_id: EntityId) -> RepoResult<Vec<Versioned<ListItem>>>;
    fn get_as_of(&self, entity_id: EntityId, at: DateTime<Utc>) -> RepoResult<Option<ListItem>>;
}

/// SQLite-backed list repository.
pub struct SqliteListRepository<'conn> {
    conn: &'conn Connection,
    ctx: RepoContext,
}

impl<'conn> SqliteListRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            ctx: RepoContext::new(),
        }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self::new(conn))
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.ctx.set_cancellation(token);
        self
    }
}

impl ListRepository for SqliteListRepository<'_> {
    fn create(&self, list: &List) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        list.validate()?;

        self.conn
            .execute(
                "INSERT INTO lists (entity_id, name, created_at) VALUES (?1, ?2, ?3);",
                params![
                    list.entity_id.to_string(),
                    list.name.trim(),
                    to_millis(list.created_at)
                ],
            )
            .map_err(|err| unique_conflict(err, format!("list `{}` already exists", list.name)))?;

        debug!(
            "event=list_create module=repo status=ok entity_id={}",
            list.entity_id
        );
        Ok(self.conn.last_insert_rowid())
    }

    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<List>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self
            .conn
            .prepare(&format!("{LIST_SELECT_SQL} WHERE entity_id = ?1;"))?;
        let list = stmt
            .query_row([entity_id.to_string()], |row| Ok(parse_list_row(row)))
            .optional()?;
        list.transpose()
    }

    fn get_by_name(&self, name: &str) -> RepoResult<Option<List>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self
            .conn
            .prepare(&format!("{LIST_SELECT_SQL} WHERE name = ?1 COLLATE NOCASE;"))?;
        let list = stmt
            .query_row([name.trim()], |row| Ok(parse_list_row(row)))
            .optional()?;
        list.transpose()
    }

    fn get_all(&self) -> RepoResult<Vec<List>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self.conn.prepare(&format!(
            "{LIST_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut lists = Vec::new();
        while let Some(row) = rows.next()? {
            lists.push(parse_list_row(row)?);
        }
        Ok(lists)
    }

    fn rename(&self, entity_id: EntityId, name: &str) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let mut list = self
            .get_by_entity_id(entity_id)?
            .ok_or_else(|| RepoError::not_found("list", entity_id))?;
        list.name = name.to_string();
        list.validate()?;

        self.conn
            .execute(
                "UPDATE lists SET name = ?1 WHERE entity_id = ?2;",
                params![list.name.trim(), entity_id.to_string()],
            )
            .map_err(|err| unique_conflict(err, format!("list `{name}` already exists")))?;
        Ok(())
    }

    fn delete(&self, entity_id: EntityId) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let changed = self.conn.execute(
            "DELETE FROM lists WHERE entity_id = ?1;",
            [entity_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("list", entity_id));
        }
        debug!("event=list_delete module=repo status=ok entity_id={entity_id}");
        Ok(())
    }
}

/// SQLite-backed list item repository.
pub struct SqliteListItemRepository<'conn> {
    conn: &'conn Connection,
    ctx: RepoContext,
}

impl<'conn> SqliteListItemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            ctx: RepoContext::new(),
        }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self::new(conn))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.ctx.set_clock(clock);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.ctx.set_cancellation(token);
        self
    }

    fn query_items(&self, sql: &str, bind: &[&dyn rusqlite::ToSql]) -> RepoResult<Vec<ListItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn ensure_list_exists(&self, list_entity_id: EntityId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM lists WHERE entity_id = ?1);",
            [list_entity_id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Ok(())
        } else {
            Err(RepoError::not_found("list", list_entity_id))
        }
    }

    fn append_version(
        &self,
        current: &CurrentRow,
        item: &ListItem,
        op_type: OpType,
    ) -> RepoResult<i64> {
        let at = current.next_valid_from(self.ctx.now());
        versioning::close_row(self.conn, ITEM_TABLE, current.row_id, at)?;
        insert_item_version(self.conn, item, current.version + 1, op_type, at)
    }
}

impl ListItemRepository for SqliteListItemRepository<'_> {
    fn insert(&self, item: &ListItem) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        item.validate()?;
        self.ensure_list_exists(item.list_entity_id)?;

        if versioning::entity_exists(self.conn, ITEM_TABLE, item.entity_id)? {
            return Err(RepoError::Conflict(format!(
                "list item {} already exists",
                item.entity_id
            )));
        }
        let row_id = insert_item_version(self.conn, item, 1, OpType::Insert, self.ctx.now())?;

        debug!(
            "event=list_item_insert module=repo status=ok entity_id={} list={}",
            item.entity_id, item.list_entity_id
        );
        Ok(row_id)
    }

    fn get_by_row_id(&self, row_id: i64) -> RepoResult<Option<ListItem>> {
        self.ctx.check_cancelled()?;
        let mut items = self.query_items(
            &format!("{ITEM_SELECT_SQL} WHERE row_id = ?1 AND op_type != 'DELETE';"),
            &[&row_id],
        )?;
        Ok(items.pop())
    }

    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<ListItem>> {
        self.ctx.check_cancelled()?;
        let mut items = self.query_items(
            &format!(
                "{ITEM_SELECT_SQL}
                 WHERE entity_id = ?1 AND valid_to IS NULL AND op_type != 'DELETE';"
            ),
            &[&entity_id.to_string()],
        )?;
        Ok(items.pop())
    }

    fn get_by_list(&self, list_entity_id: EntityId) -> RepoResult<Vec<ListItem>> {
        self.ctx.check_cancelled()?;
        self.query_items(
            &format!(
                "{ITEM_SELECT_SQL}
                 WHERE list_entity_id = ?1 AND valid_to IS NULL AND op_type != 'DELETE'
                 ORDER BY created_at ASC, entity_id ASC;"
            ),
            &[&list_entity_id.to_string()],
        )
    }

    fn update(&self, item: &ListItem) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        item.validate()?;
        self.ensure_list_exists(item.list_entity_id)?;

        let tx = self.conn.unchecked_transaction()?;
        let current = versioning::live_row(&tx, ITEM_TABLE, ITEM_KIND, item.entity_id)?;
        let stored = self
            .get_by_entity_id(item.entity_id)?
            .ok_or_else(|| RepoError::not_found(ITEM_KIND, item.entity_id))?;
        let mut next = item.clone();
        next.created_at = stored.created_at;
        let row_id = self.append_version(&current, &next, OpType::Update)?;
        tx.commit()?;
        Ok(row_id)
    }

    fn delete(&self, entity_id: EntityId) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let tx = self.conn.unchecked_transaction()?;
        let current = versioning::live_row(&tx, ITEM_TABLE, ITEM_KIND, entity_id)?;
        let stored = self
            .get_by_entity_id(entity_id)?
            .ok_or_else(|| RepoError::not_found(ITEM_KIND, entity_id))?;
        self.append_version(&current, &stored, OpType::Delete)?;
        tx.commit()?;

        debug!("event=list_item_delete module=repo status=ok entity_id={entity_id}");
        Ok(())
    }

    fn get_history(&self, entity_id: EntityId) -> RepoResult<Vec<Versioned<ListItem>>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL} WHERE entity_id = ?1 ORDER BY version ASC;"
        ))?;
        let mut rows = stmt.query([entity_id.to_string()])?;
        let mut history = Vec::new();
        while let Some(row) = rows.next()? {
            history.push(Versioned {
                info: versioning::parse_version_info(row, ITEM_TABLE)?,
                value: parse_item_row(row)?,
            });
        }
        Ok(history)
    }

    fn get_as_of(&self, entity_id: EntityId, at: DateTime<Utc>) -> RepoResult<Option<ListItem>> {
        self.ctx.check_cancelled()?;
        let at = to_millis(at);
        let mut items = self.query_items(
            &format!(
                "{ITEM_SELECT_SQL}
                 WHERE entity_id = ?1
                   AND valid_from <= ?2
                   AND (valid_to IS NULL OR valid_to > ?2)
                   AND op_type != 'DELETE';"
            ),
            &[&entity_id.to_string(), &at],
        )?;
        Ok(items.pop())
    }
}

fn insert_item_version(
    conn: &Connection,
    item: &ListItem,
    version: u32,
    op_type: OpType,
    valid_from: DateTime<Utc>,
) -> RepoResult<i64> {
    conn.execute(
        "INSERT INTO list_items (
            entity_id,
            version,
            valid_from,
            valid_to,
            op_type,
            list_entity_id,
            type,
            content,
            created_at
        ) VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?7, ?8);",
        params![
            item.entity_id.to_string(),
            i64::from(version),
            to_millis(valid_from),
            op_type.as_str(),
            item.list_entity_id.to_string(),
            item.kind.as_str(),
            item.content.as_str(),
            to_millis(item.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_list_row(row: &Row<'_>) -> RepoResult<List> {
    let entity_text: String = row.get("entity_id")?;
    Ok(List {
        row_id: row.get("row_id")?,
        entity_id: parse_entity_id(&entity_text, "lists.entity_id")?,
        name: row.get("name")?,
        created_at: from_millis(row.get("created_at")?, "lists.created_at")?,
    })
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<ListItem> {
    let entity_text: String = row.get("entity_id")?;
    let list_text: String = row.get("list_entity_id")?;
    let type_text: String = row.get("type")?;
    let kind = ListItemType::parse(&type_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid item type `{type_text}` in list_items.type"))
    })?;
    Ok(ListItem {
        row_id: row.get("row_id")?,
        entity_id: parse_entity_id(&entity_text, "list_items.entity_id")?,
        list_entity_id: parse_entity_id(&list_text, "list_items.list_entity_id")?,
        kind,
        content: row.get("content")?,
        created_at: from_millis(row.get("created_at")?, "list_items.created_at")?,
    })
}

/// Maps a UNIQUE violation to `Conflict`, anything else to a DB error.
pub(crate) fn unique_conflict(err: rusqlite::Error, message: String) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepoError::Conflict(message)
        }
        _ => RepoError::from(err),
    }
}
