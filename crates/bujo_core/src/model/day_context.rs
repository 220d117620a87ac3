//! Per-day context (where the day happened and how it felt).

use super::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayContext {
    pub date: NaiveDate,
    pub location: Option<String>,
    pub mood: Option<String>,
    pub weather: Option<String>,
}

impl DayContext {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            location: None,
            mood: None,
            weather: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("location", &self.location),
            ("mood", &self.mood),
            ("weather", &self.weather),
        ] {
            if matches!(value.as_deref(), Some(text) if text.trim().is_empty()) {
                return Err(ValidationError::EmptyField(field));
            }
        }
        Ok(())
    }
}
