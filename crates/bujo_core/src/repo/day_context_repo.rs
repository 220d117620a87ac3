//! Per-day context (location, mood, weather) repository.

use super::{
    date_to_db, ensure_connection_ready, parse_db_date, RepoContext, RepoError, RepoResult,
};
use crate::cancel::CancellationToken;
use crate::model::day_context::DayContext;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

const DAY_SELECT_SQL: &str = "SELECT date, location, mood, weather FROM day_contexts";

pub trait DayContextRepository {
    /// Inserts or replaces the context of `context.date`.
    fn upsert(&self, context: &DayContext) -> RepoResult<()>;
    fn get(&self, date: NaiveDate) -> RepoResult<Option<DayContext>>;
    /// Contexts within `[from, to]`, ordered by date.
    fn get_range(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<DayContext>>;
    fn delete(&self, date: NaiveDate) -> RepoResult<()>;
}

pub struct SqliteDayContextRepository<'conn> {
    conn: &'conn Connection,
    ctx: RepoContext,
}

impl<'conn> SqliteDayContextRepository<'conn> {
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

impl DayContextRepository for SqliteDayContextRepository<'_> {
    fn upsert(&self, context: &DayContext) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        context.validate()?;
        self.conn.execute(
            "INSERT INTO day_contexts (date, location, mood, weather)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date) DO UPDATE SET
                location = excluded.location,
                mood = excluded.mood,
                weather = excluded.weather;",
            params![
                date_to_db(context.date),
                context.location.as_deref(),
                context.mood.as_deref(),
                context.weather.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, date: NaiveDate) -> RepoResult<Option<DayContext>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self
            .conn
            .prepare(&format!("{DAY_SELECT_SQL} WHERE date = ?1;"))?;
        stmt.query_row([date_to_db(date)], |row| Ok(parse_day_row(row)))
            .optional()?
            .transpose()
    }

    fn get_range(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<DayContext>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self.conn.prepare(&format!(
            "{DAY_SELECT_SQL} WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC;"
        ))?;
        let mut rows = stmt.query([date_to_db(from), date_to_db(to)])?;
        let mut days = Vec::new();
        while let Some(row) = rows.next()? {
            days.push(parse_day_row(row)?);
        }
        Ok(days)
    }

    fn delete(&self, date: NaiveDate) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let changed = self
            .conn
            .execute("DELETE FROM day_contexts WHERE date = ?1;", [date_to_db(date)])?;
        if changed == 0 {
            return Err(RepoError::not_found("day context", date));
        }
        Ok(())
    }
}

fn parse_day_row(row: &Row<'_>) -> RepoResult<DayContext> {
    let date_text: String = row.get("date")?;
    Ok(DayContext {
        date: parse_db_date(&date_text, "day_contexts.date")?,
        location: row.get("location")?,
        mood: row.get("mood")?,
        weather: row.get("weather")?,
    })
}
