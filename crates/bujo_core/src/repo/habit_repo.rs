//! Habit and habit log repositories.
//!
//! # Invariants
//! - Habit names are unique, compared case-insensitively.
//! - Logs reference an existing habit; deleting a habit drops its logs.

use super::list_repo::unique_conflict;
use super::{
    day_start_millis, ensure_connection_ready, from_millis, parse_entity_id, to_millis, to_u32,
    RepoContext, RepoError, RepoResult,
};
use crate::cancel::CancellationToken;
use crate::model::entity_id::EntityId;
use crate::model::habit::{Habit, HabitLog};
use chrono::{Duration, NaiveDate};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

const HABIT_SELECT_SQL: &str =
    "SELECT row_id, entity_id, name, goal_per_day, created_at FROM habits";
const LOG_SELECT_SQL: &str =
    "SELECT row_id, habit_id, habit_entity_id, count, logged_at FROM habit_logs";

pub trait HabitRepository {
    fn insert(&self, habit: &Habit) -> RepoResult<i64>;
    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<Habit>>;
    fn get_by_name(&self, name: &str) -> RepoResult<Option<Habit>>;
    fn get_all(&self) -> RepoResult<Vec<Habit>>;
    /// Changes name and daily goal.
    fn update(&self, habit: &Habit) -> RepoResult<()>;
    fn delete(&self, entity_id: EntityId) -> RepoResult<()>;
}

pub trait HabitLogRepository {
    fn insert(&self, log: &HabitLog) -> RepoResult<i64>;
    /// All logs of one habit, oldest first.
    fn get_by_habit(&self, habit_entity_id: EntityId) -> RepoResult<Vec<HabitLog>>;
    /// Logs of one habit whose UTC day falls in `[from, to]`.
    fn get_range(
        &self,
        habit_entity_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<HabitLog>>;
    fn delete(&self, row_id: i64) -> RepoResult<()>;
}

/// SQLite-backed habit repository.
pub struct SqliteHabitRepository<'conn> {
    conn: &'conn Connection,
    ctx: RepoContext,
}

impl<'conn> SqliteHabitRepository<'conn> {
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

    fn query_one(&self, filter: &str, key: &str) -> RepoResult<Option<Habit>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{HABIT_SELECT_SQL} WHERE {filter};"))?;
        stmt.query_row([key], |row| Ok(parse_habit_row(row)))
            .optional()?
            .transpose()
    }
}

impl HabitRepository for SqliteHabitRepository<'_> {
    fn insert(&self, habit: &Habit) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        habit.validate()?;
        self.conn
            .execute(
                "INSERT INTO habits (entity_id, name, goal_per_day, created_at)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    habit.entity_id.to_string(),
                    habit.name.trim(),
                    i64::from(habit.goal_per_day),
                    to_millis(habit.created_at),
                ],
            )
            .map_err(|err| unique_conflict(err, format!("habit `{}` already exists", habit.name)))?;
        debug!(
            "event=habit_insert module=repo status=ok entity_id={}",
            habit.entity_id
        );
        Ok(self.conn.last_insert_rowid())
    }

    fn get_by_entity_id(&self, entity_id: EntityId) -> RepoResult<Option<Habit>> {
        self.ctx.check_cancelled()?;
        self.query_one("entity_id = ?1", &entity_id.to_string())
    }

    fn get_by_name(&self, name: &str) -> RepoResult<Option<Habit>> {
        self.ctx.check_cancelled()?;
        self.query_one("name = ?1 COLLATE NOCASE", name.trim())
    }

    fn get_all(&self) -> RepoResult<Vec<Habit>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self
            .conn
            .prepare(&format!("{HABIT_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut habits = Vec::new();
        while let Some(row) = rows.next()? {
            habits.push(parse_habit_row(row)?);
        }
        Ok(habits)
    }

    fn update(&self, habit: &Habit) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        habit.validate()?;
        let changed = self
            .conn
            .execute(
                "UPDATE habits SET name = ?1, goal_per_day = ?2 WHERE entity_id = ?3;",
                params![
                    habit.name.trim(),
                    i64::from(habit.goal_per_day),
                    habit.entity_id.to_string()
                ],
            )
            .map_err(|err| unique_conflict(err, format!("habit `{}` already exists", habit.name)))?;
        if changed == 0 {
            return Err(RepoError::not_found("habit", habit.entity_id));
        }
        Ok(())
    }

    fn delete(&self, entity_id: EntityId) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let changed = self.conn.execute(
            "DELETE FROM habits WHERE entity_id = ?1;",
            [entity_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("habit", entity_id));
        }
        debug!("event=habit_delete module=repo status=ok entity_id={entity_id}");
        Ok(())
    }
}

/// SQLite-backed habit log repository.
pub struct SqliteHabitLogRepository<'conn> {
    conn: &'conn Connection,
    ctx: RepoContext,
}

impl<'conn> SqliteHabitLogRepository<'conn> {
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

    fn query_logs(
        &self,
        sql: &str,
        habit: EntityId,
        bounds: Option<(i64, i64)>,
    ) -> RepoResult<Vec<HabitLog>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match bounds {
            Some((from, to)) => stmt.query(params![habit.to_string(), from, to])?,
            None => stmt.query(params![habit.to_string()])?,
        };
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(parse_log_row(row)?);
        }
        Ok(logs)
    }
}

impl HabitLogRepository for SqliteHabitLogRepository<'_> {
    fn insert(&self, log: &HabitLog) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        log.validate()?;
        let habit_row_id: i64 = self
            .conn
            .query_row(
                "SELECT row_id FROM habits WHERE entity_id = ?1;",
                [log.habit_entity_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("habit", log.habit_entity_id))?;

        self.conn.execute(
            "INSERT INTO habit_logs (habit_id, habit_entity_id, count, logged_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                habit_row_id,
                log.habit_entity_id.to_string(),
                i64::from(log.count),
                to_millis(log.logged_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_by_habit(&self, habit_entity_id: EntityId) -> RepoResult<Vec<HabitLog>> {
        self.ctx.check_cancelled()?;
        self.query_logs(
            &format!(
                "{LOG_SELECT_SQL} WHERE habit_entity_id = ?1 ORDER BY logged_at ASC, row_id ASC;"
            ),
            habit_entity_id,
            None,
        )
    }

    fn get_range(
        &self,
        habit_entity_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<HabitLog>> {
        self.ctx.check_cancelled()?;
        self.query_logs(
            &format!(
                "{LOG_SELECT_SQL}
                 WHERE habit_entity_id = ?1 AND logged_at >= ?2 AND logged_at < ?3
                 ORDER BY logged_at ASC, row_id ASC;"
            ),
            habit_entity_id,
            Some((
                day_start_millis(from),
                day_start_millis(to + Duration::days(1)),
            )),
        )
    }

    fn delete(&self, row_id: i64) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let changed = self
            .conn
            .execute("DELETE FROM habit_logs WHERE row_id = ?1;", [row_id])?;
        if changed == 0 {
            return Err(RepoError::not_found("habit log", row_id));
        }
        Ok(())
    }
}

fn parse_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    let entity_text: String = row.get("entity_id")?;
    Ok(Habit {
        row_id: row.get("row_id")?,
        entity_id: parse_entity_id(&entity_text, "habits.entity_id")?,
        name: row.get("name")?,
        goal_per_day: to_u32(row.get("goal_per_day")?, "habits.goal_per_day")?,
        created_at: from_millis(row.get("created_at")?, "habits.created_at")?,
    })
}

fn parse_log_row(row: &Row<'_>) -> RepoResult<HabitLog> {
    let entity_text: String = row.get("habit_entity_id")?;
    Ok(HabitLog {
        row_id: row.get("row_id")?,
        habit_id: row.get("habit_id")?,
        habit_entity_id: parse_entity_id(&entity_text, "habit_logs.habit_entity_id")?,
        count: to_u32(row.get("count")?, "habit_logs.count")?,
        logged_at: from_millis(row.get("logged_at")?, "habit_logs.logged_at")?,
    })
}
