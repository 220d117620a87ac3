//! Reflection summary repository.
//!
//! # Invariants
//! - At most one summary per `(horizon, start_date)`; writes replace it.

use super::{
    date_to_db, ensure_connection_ready, from_millis, parse_db_date, to_millis, RepoContext,
    RepoError, RepoResult,
};
use crate::cancel::CancellationToken;
use crate::model::summary::{Horizon, Summary};
use chrono::NaiveDate;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

const SUMMARY_SELECT_SQL: &str =
    "SELECT row_id, horizon, content, start_date, end_date, created_at FROM summaries";

pub trait SummaryRepository {
    /// Inserts or replaces the summary for its horizon and start date.
    fn upsert(&self, summary: &Summary) -> RepoResult<i64>;
    fn get(&self, horizon: Horizon, start_date: NaiveDate) -> RepoResult<Option<Summary>>;
    /// Summaries of one horizon starting within `[from, to]`.
    fn get_range(
        &self,
        horizon: Horizon,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<Summary>>;
    fn delete(&self, horizon: Horizon, start_date: NaiveDate) -> RepoResult<()>;
}

pub struct SqliteSummaryRepository<'conn> {
    conn: &'conn Connection,
    ctx: RepoContext,
}

impl<'conn> SqliteSummaryRepository<'conn> {
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

impl SummaryRepository for SqliteSummaryRepository<'_> {
    fn upsert(&self, summary: &Summary) -> RepoResult<i64> {
        self.ctx.check_cancelled()?;
        summary.validate()?;
        let row_id: i64 = self.conn.query_row(
            "INSERT INTO summaries (horizon, content, start_date, end_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(horizon, start_date) DO UPDATE SET
                content = excluded.content,
                end_date = excluded.end_date,
                created_at = excluded.created_at
             RETURNING row_id;",
            params![
                summary.horizon.as_str(),
                summary.content.as_str(),
                date_to_db(summary.start_date),
                date_to_db(summary.end_date),
                to_millis(summary.created_at),
            ],
            |row| row.get(0),
        )?;
        debug!(
            "event=summary_upsert module=repo status=ok horizon={} row_id={}",
            summary.horizon.as_str(),
            row_id
        );
        Ok(row_id)
    }

    fn get(&self, horizon: Horizon, start_date: NaiveDate) -> RepoResult<Option<Summary>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self.conn.prepare(&format!(
            "{SUMMARY_SELECT_SQL} WHERE horizon = ?1 AND start_date = ?2;"
        ))?;
        stmt.query_row(
            params![horizon.as_str(), date_to_db(start_date)],
            |row| Ok(parse_summary_row(row)),
        )
        .optional()?
        .transpose()
    }

    fn get_range(
        &self,
        horizon: Horizon,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<Summary>> {
        self.ctx.check_cancelled()?;
        let mut stmt = self.conn.prepare(&format!(
            "{SUMMARY_SELECT_SQL}
             WHERE horizon = ?1 AND start_date >= ?2 AND start_date <= ?3
             ORDER BY start_date ASC;"
        ))?;
        let mut rows = stmt.query(params![horizon.as_str(), date_to_db(from), date_to_db(to)])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(parse_summary_row(row)?);
        }
        Ok(summaries)
    }

    fn delete(&self, horizon: Horizon, start_date: NaiveDate) -> RepoResult<()> {
        self.ctx.check_cancelled()?;
        let changed = self.conn.execute(
            "DELETE FROM summaries WHERE horizon = ?1 AND start_date = ?2;",
            params![horizon.as_str(), date_to_db(start_date)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                "summary",
                format!("{} {}", horizon.as_str(), date_to_db(start_date)),
            ));
        }
        Ok(())
    }
}

fn parse_summary_row(row: &Row<'_>) -> RepoResult<Summary> {
    let horizon_text: String = row.get("horizon")?;
    let start_text: String = row.get("start_date")?;
    let end_text: String = row.get("end_date")?;
    let horizon = Horizon::parse(&horizon_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid horizon `{horizon_text}` in summaries.horizon"
        ))
    })?;
    Ok(Summary {
        row_id: row.get("row_id")?,
        horizon,
        content: row.get("content")?,
        start_date: parse_db_date(&start_text, "summaries.start_date")?,
        end_date: parse_db_date(&end_text, "summaries.end_date")?,
        created_at: from_millis(row.get("created_at")?, "summaries.created_at")?,
    })
}
