//! Pluggable date parsing for migration directives.
//!
//! Natural-language parsing is owned by the caller; the crate only needs a
//! function from text to calendar date. `RelativeDateParser` covers ISO dates
//! and a handful of relative words anchored on an explicit `today`.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Converts user text inside `>[...]` into a calendar date.
pub trait DateParser {
    fn parse_date(&self, input: &str) -> Result<NaiveDate, String>;
}

impl<F> DateParser for F
where
    F: Fn(&str) -> Result<NaiveDate, String>,
{
    fn parse_date(&self, input: &str) -> Result<NaiveDate, String> {
        self(input)
    }
}

/// ISO (`YYYY-MM-DD`) and relative-word date parser.
///
/// Accepted forms: `today`, `tomorrow`, `yesterday`, `next week`,
/// `next month`, weekday names (next occurrence after today),
/// `in N days`, `in N weeks`, `+N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeDateParser {
    today: NaiveDate,
}

impl RelativeDateParser {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl DateParser for RelativeDateParser {
    fn parse_date(&self, input: &str) -> Result<NaiveDate, String> {
        let normalized = input.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err("date is empty".to_string());
        }

        if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
            return Ok(date);
        }

        let today = self.today;
        let relative = match normalized.as_str() {
            "today" => Some(today),
            "tomorrow" => today.succ_opt(),
            "yesterday" => today.pred_opt(),
            "next week" => today.checked_add_signed(Duration::days(7)),
            "next month" => add_one_month(today),
            _ => None,
        };
        if let Some(date) = relative {
            return Ok(date);
        }

        if let Some(weekday) = parse_weekday(&normalized) {
            return Ok(next_weekday(today, weekday));
        }

        if let Some(offset) = parse_offset_days(&normalized) {
            return today
                .checked_add_signed(Duration::days(offset))
                .ok_or_else(|| format!("date offset out of range: `{input}`"));
        }

        Err(format!("unrecognized date `{input}`"))
    }
}

fn parse_weekday(value: &str) -> Option<Weekday> {
    let name = value.strip_prefix("next ").unwrap_or(value);
    match name {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = i64::from(today.weekday().num_days_from_monday());
    let target = i64::from(weekday.num_days_from_monday());
    let mut delta = (target - current).rem_euclid(7);
    if delta == 0 {
        delta = 7;
    }
    today + Duration::days(delta)
}

fn parse_offset_days(value: &str) -> Option<i64> {
    if let Some(number) = value.strip_prefix('+') {
        return number.trim().parse::<i64>().ok();
    }
    let rest = value.strip_prefix("in ")?;
    let mut parts = rest.split_whitespace();
    let amount = parts.next()?.parse::<i64>().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    match unit {
        "day" | "days" => Some(amount),
        "week" | "weeks" => amount.checked_mul(7),
        _ => None,
    }
}

fn add_one_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    (1..=date.day())
        .rev()
        .find_map(|day| NaiveDate::from_ymd_opt(year, month, day))
}
