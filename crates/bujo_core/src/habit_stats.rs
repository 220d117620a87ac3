//! Habit aggregation over log streams.
//!
//! # Responsibility
//! - Collapse timestamped logs into completed calendar days.
//! - Compute streaks, windowed completion rates and per-day totals.
//!
//! # Invariants
//! - A day is the calendar date of `logged_at` in the caller's time zone.
//! - Results are deterministic for a fixed `today` and log set.

use crate::model::habit::{Habit, HabitLog};
use chrono::{Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Aggregated tracker state for one habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitSummary {
    pub habit_name: String,
    pub goal_per_day: u32,
    pub today_count: u32,
    pub streak: u32,
    pub completion_7d: f64,
    pub completion_30d: f64,
}

/// Distinct calendar days with at least one log.
pub fn completed_days<Tz: TimeZone>(logs: &[HabitLog], tz: &Tz) -> BTreeSet<NaiveDate> {
    logs.iter()
        .map(|log| log.logged_at.with_timezone(tz).date_naive())
        .collect()
}

/// Consecutive completed days ending today, or yesterday when today is still open.
pub fn streak<Tz: TimeZone>(logs: &[HabitLog], today: NaiveDate, tz: &Tz) -> u32 {
    let days = completed_days(logs, tz);
    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut count = 0;
    while days.contains(&cursor) {
        count += 1;
        match cursor.pred_opt() {
            Some(previous) => cursor = previous,
            None => break,
        }
    }
    count
}

/// Percentage of completed days in `[today - days + 1, today]`.
///
/// Returns `0.0` for an empty window.
pub fn completion_rate<Tz: TimeZone>(
    logs: &[HabitLog],
    today: NaiveDate,
    days: u32,
    tz: &Tz,
) -> f64 {
    if days == 0 {
        return 0.0;
    }
    let window_start = today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .unwrap_or(NaiveDate::MIN);
    let completed = completed_days(logs, tz)
        .range(window_start..=today)
        .count();
    completed as f64 / f64::from(days) * 100.0
}

/// Sum of `count` across logs on `date`, saturating at `u32::MAX`.
pub fn day_total<Tz: TimeZone>(logs: &[HabitLog], date: NaiveDate, tz: &Tz) -> u32 {
    logs.iter()
        .filter(|log| log.logged_at.with_timezone(tz).date_naive() == date)
        .fold(0u32, |total, log| total.saturating_add(log.count))
}

/// Builds the tracker summary shown for one habit.
pub fn summarize<Tz: TimeZone>(
    habit: &Habit,
    logs: &[HabitLog],
    today: NaiveDate,
    tz: &Tz,
) -> HabitSummary {
    HabitSummary {
        habit_name: habit.name.clone(),
        goal_per_day: habit.goal_per_day,
        today_count: day_total(logs, today, tz),
        streak: streak(logs, today, tz),
        completion_7d: completion_rate(logs, today, 7, tz),
        completion_30d: completion_rate(logs, today, 30, tz),
    }
}
