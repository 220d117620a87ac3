//! Monthly goal repository.
//!
//! # Invariants
//! - `month` and `migrated_to` are stored as the first day of their month.
//! - Only active goals can be completed, cancelled or migrated.

use super::{
    date_to_db, ensure_connection_ready, from_millis, parse_db_date, parse_entity_id, to_millis,
    Clock, RepoContext, RepoError, RepoResult,
};
use crate::cancel::CancellationToken;
use crate::model::entity_id::EntityId;
use crate::model::goal::{first_of_month, Goal, GoalStatus};
use chrono::NaiveDate;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};

const GOAL_SELECT_SQL: &str =
    "SELECT row_id, entity_id, content, month, status, migrated_to, created_at FROM goals";

pub trait GoalRepository {
    fn insert(&self, goal: &Goal) -> RepoResult<i64>;
    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<Goal>>;
    /// Goals of the month containing `month`, in creation order.
    fn get_by_month(&self, month: NaiveDate) -> RepoResult<Vec<Goal>>;
    fn update(&self, goal: &Goal) -> RepoResult<()>;
    fn mark_done(&self, entity_id: EntityId) -> RepoResult<()>;
    fn cancel(&self, entity_id: EntityId) -> RepoResult<()>;
    /// Marks the goal migrated and creates an active copy in `to_month`.
    fn migrate(&self, entity_id: EntityId, to_month: NaiveDate) -> RepoResult<EntityId>;
    fn delete(&self, entity_id: EntityId) -> RepoResult<()>;
}

/// SQLite-backed goal repository.
pub struct SqliteGoalRepository<'conn> {
    conn: &'conn Connection,
    ctx: RepoContext,
}

impl<'conn> SqliteGoalRepository<'conn> {
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

    /// Clock used for `created_at` of migrated copies.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.ctx.set_clock(clock);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.ctx.set_cancellation(token);
        self
    }

    fn load_active(&self, entity_id: EntityId) -> RepoResult<Goal> {
        let goal = self
            .get_by_entity_id(entity_id)?
            .ok_or_else(|| RepoError::not_found("goal", entity_id))?;
        if goal.status != GoalStatus::Active {
            return Err(RepoError::Conflict(format!(
                "goal {entity_id} is already {}",
                goal.status.as_str()
            )));
        }
        Ok(goal)
    }

    fn set_status(&self, entity_id: EntityId, status: GoalStatus) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let mut goal = self.load_active(entity_id)?;
        goal.status = status;
        self.update(&goal)
    }
}

impl GoalRepository for SqliteGoalRepository<'_> {
    fn insert(&self, goal: &Goal) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        goal.validate()?;
        insert_goal(self.conn, goal)
    }

    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<Goal>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self
            .conn
            .prepare(&format!("{GOAL_SELECT_SQL} WHERE entity_id = ?1;"))?;
        stmt.query_row([entity_id.to_string()], |row| Ok(parse_goal_row(row)))
            .optional()?
            .transpose()
    }

    fn get_by_month(&self, month: NaiveDate) -> RepoResult<Vec<Goal>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self.conn.prepare(&format!(
            "{GOAL_SELECT_SQL} WHERE month = ?1 ORDER BY created_at ASC, row_id ASC;"
        ))?;
        let mut rows = stmt.query([date_to_db(first_of_month(month))])?;
        let mut goals = Vec::new();
        while let Some(row) = rows.next()? {
            goals.push(parse_goal_row(row)?);
        }
        Ok(goals)
    }

    fn update(&self, goal: &Goal) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        goal.validate()?;
        let changed = self.conn.execute(
            "UPDATE goals
             SET content = ?1, month = ?2, status = ?3, migrated_to = ?4
             WHERE entity_id = ?5;",
            params![
                goal.content.as_str(),
                date_to_db(goal.month),
                goal.status.as_str(),
                goal.migrated_to.map(date_to_db),
                goal.entity_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("goal", goal.entity_id));
        }
        Ok(())
    }

    fn mark_done(&self, entity_id: EntityId) -> RepoResult<()> {
        self.set_status(entity_id, GoalStatus::Done)
    }

    fn cancel(&self, entity_id: EntityId) -> RepoResult<()> {
        self.set_status(entity_id, GoalStatus::Cancelled)
    }

    fn migrate(&self, entity_id: EntityId, to_month: NaiveDate) -> RepoResult<EntityId> {
        self.ctx.check_cancelled()?;
        let source = self.load_active(entity_id)?;
        let target = first_of_month(to_month);
        if target == source.month {
            return Err(RepoError::Conflict(format!(
                "goal {entity_id} already belongs to {}",
                date_to_db(target)
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut migrated = source.clone();
        migrated.status = GoalStatus::Migrated;
        migrated.migrated_to = Some(target);
        self.update(&migrated)?;

        let continuation = Goal::new(source.content.clone(), target, self.ctx.now());
        insert_goal(&tx, &continuation)?;
        tx.commit()?;

        info!(
            "event=goal_migrate module=repo status=ok entity_id={} continuation={}",
            entity_id, continuation.entity_id
        );
        Ok(continuation.entity_id)
    }

    fn delete(&self, entity_id: EntityId) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let changed = self.conn.execute(
            "DELETE FROM goals WHERE entity_id = ?1;",
            [entity_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("goal", entity_id));
        }
        Ok(())
    }
}

fn insert_goal(conn: &Connection, goal: &Goal) -> RepoResult<i64> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM goals WHERE entity_id = ?1);",
        [goal.entity_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        return Err(RepoError::Conflict(format!(
            "goal {} already exists",
            goal.entity_id
        )));
    }

    conn.execute(
        "INSERT INTO goals (entity_id, content, month, status, migrated_to, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            goal.entity_id.to_string(),
            goal.content.as_str(),
            date_to_db(goal.month),
            goal.status.as_str(),
            goal.migrated_to.map(date_to_db),
            to_millis(goal.created_at),
        ],
    )?;
    debug!(
        "event=goal_insert module=repo status=ok entity_id={}",
        goal.entity_id
    );
    Ok(conn.last_insert_rowid())
}

fn parse_goal_row(row: &Row<'_>) -> RepoResult<Goal> {
    let entity_text: String = row.get("entity_id")?;
    let month_text: String = row.get("month")?;
    let status_text: String = row.get("status")?;
    let migrated_to = match row.get::<_, Option<String>>("migrated_to")? {
        Some(text) => Some(parse_db_date(&text, "goals.migrated_to")?),
        None => None,
    };
    let status = GoalStatus::parse(&status_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid goal status `{status_text}` in goals.status"))
    })?;
    Ok(Goal {
        row_id: row.get("row_id")?,
        entity_id: parse_entity_id(&entity_text, "goals.entity_id")?,
        content: row.get("content")?,
        month: parse_db_date(&month_text, "goals.month")?,
        status,
        migrated_to,
        created_at: from_millis(row.get("created_at")?, "goals.created_at")?,
    })
}
