//! Reflection summaries over a date range.

use super::ValidationError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Temporal span of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Daily,
    Weekly,
    Quarterly,
    Annual,
}

impl Horizon {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "quarterly" => Ok(Self::Quarterly),
            "annual" => Ok(Self::Annual),
            _ => Err(ValidationError::InvalidHorizon(value.to_string())),
        }
    }

    /// Returns the inclusive `[start, end]` span of this horizon containing `date`.
    ///
    /// Weeks start on Monday.
    pub fn range_containing(self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Daily => (date, date),
            Self::Weekly => {
                let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                (start, start + Duration::days(6))
            }
            Self::Quarterly => {
                let first_month = (date.month0() / 3) * 3 + 1;
                let start = NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date);
                let end = if first_month == 10 {
                    NaiveDate::from_ymd_opt(date.year(), 12, 31)
                } else {
                    NaiveDate::from_ymd_opt(date.year(), first_month + 3, 1)
                        .and_then(|next| next.pred_opt())
                }
                .unwrap_or(date);
                (start, end)
            }
            Self::Annual => (
                NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
                NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub row_id: i64,
    pub horizon: Horizon,
    pub content: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(
        horizon: Horizon,
        content: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            row_id: 0,
            horizon,
            content: content.into(),
            start_date,
            end_date,
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if self.end_date < self.start_date {
            return Err(ValidationError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }
}
