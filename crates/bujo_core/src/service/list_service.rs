//! Moving journal entries onto named lists.
//!
//! # Invariants
//! - Only open tasks can move; the journal keeps the entry as
//!   `moved_to_list` so its history stays intact.

use crate::model::entity_id::EntityId;
use crate::model::entry::EntryType;
use crate::model::list::ListItem;
use crate::repo::{EntryRepository, ListItemRepository, ListRepository, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::info;

/// Use-case service spanning the entry and list repositories.
pub struct ListService<E, L, I>
where
    E: EntryRepository,
    L: ListRepository,
    I: ListItemRepository,
{
    entries: E,
    lists: L,
    items: I,
}

impl<E, L, I> ListService<E, L, I>
where
    E: EntryRepository,
    L: ListRepository,
    I: ListItemRepository,
{
    pub fn new(entries: E, lists: L, items: I) -> Self {
        Self {
            entries,
            lists,
            items,
        }
    }

    /// Copies a task onto `list_name` and marks the journal entry moved.
    ///
    /// # Errors
    /// - `NotFound` when the entry or the list does not exist.
    /// - `Conflict` when the entry is not an open task.
    pub fn move_to_list(
        &self,
        entity_id: EntityId,
        list_name: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<ListItem> {
        let mut entry = self
            .entries
            .get_by_entity_id(entity_id)?
            .ok_or_else(|| RepoError::not_found("entry", entity_id))?;
        if entry.kind != EntryType::Task {
            return Err(RepoError::Conflict(format!(
                "only open tasks can move to a list, entry {entity_id} is {}",
                entry.kind.as_str()
            )));
        }
        let list = self
            .lists
            .get_by_name(list_name)?
            .ok_or_else(|| RepoError::not_found("list", list_name))?;

        let mut item = ListItem::new(list.entity_id, entry.content.clone(), now);
        item.row_id = self.items.insert(&item)?;

        entry.kind = EntryType::MovedToList;
        self.entries.update(&entry)?;

        info!(
            "event=entry_move_to_list module=service status=ok entity_id={} list={} item={}",
            entity_id, list.entity_id, item.entity_id
        );
        Ok(item)
    }

    /// Open items of `list_name`.
    pub fn open_items(&self, list_name: &str) -> RepoResult<Vec<ListItem>> {
        let list = self
            .lists
            .get_by_name(list_name)?
            .ok_or_else(|| RepoError::not_found("list", list_name))?;
        Ok(self
            .items
            .get_by_list(list.entity_id)?
            .into_iter()
            .filter(|item| item.kind.is_open())
            .collect())
    }
}
