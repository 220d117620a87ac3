//! Reflection prompt templates.
//!
//! Templates live at `<prompt_dir>/<type>.txt`; a built-in default is used
//! when the file is absent. Placeholders: `{{start}}`, `{{end}}`, `{{entries}}`.

use super::AiError;
use crate::document::serializer::serialize;
use crate::model::entry::Entry;
use crate::model::summary::Horizon;
use crate::model::ValidationError;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DAILY_DEFAULT: &str = "Reflect on my bullet journal for {{start}}.
Summarize what got done, what is still open, and one thing to carry into tomorrow.

{{entries}}";

const WEEKLY_DEFAULT: &str = "Reflect on my bullet journal for the week {{start}} to {{end}}.
Name recurring themes, stalled tasks, and the most meaningful progress.

{{entries}}";

const QUARTERLY_DEFAULT: &str = "Reflect on my bullet journal for the quarter {{start}} to {{end}}.
Describe how my focus shifted and which goals moved forward.

{{entries}}";

const ANNUAL_DEFAULT: &str = "Reflect on my bullet journal for the year {{start}} to {{end}}.
Tell the story of the year in a few paragraphs.

{{entries}}";

const EMPTY_ENTRIES: &str = "(no entries)";

/// Reflection period a prompt is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    Daily,
    Weekly,
    Quarterly,
    Annual,
}

impl PromptType {
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
            _ => Err(ValidationError::InvalidPromptType(value.to_string())),
        }
    }

    pub fn horizon(self) -> Horizon {
        match self {
            Self::Daily => Horizon::Daily,
            Self::Weekly => Horizon::Weekly,
            Self::Quarterly => Horizon::Quarterly,
            Self::Annual => Horizon::Annual,
        }
    }

    fn default_body(self) -> &'static str {
        match self {
            Self::Daily => DAILY_DEFAULT,
            Self::Weekly => WEEKLY_DEFAULT,
            Self::Quarterly => QUARTERLY_DEFAULT,
            Self::Annual => ANNUAL_DEFAULT,
        }
    }
}

impl From<Horizon> for PromptType {
    fn from(value: Horizon) -> Self {
        match value {
            Horizon::Daily => Self::Daily,
            Horizon::Weekly => Self::Weekly,
            Horizon::Quarterly => Self::Quarterly,
            Horizon::Annual => Self::Annual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub prompt_type: PromptType,
    pub body: String,
}

impl PromptTemplate {
    pub fn builtin(prompt_type: PromptType) -> Self {
        Self {
            prompt_type,
            body: prompt_type.default_body().to_string(),
        }
    }

    /// Reads `<prompt_dir>/<type>.txt`, falling back to the built-in body.
    pub fn load(prompt_dir: &Path, prompt_type: PromptType) -> Result<Self, AiError> {
        let path = prompt_dir.join(format!("{}.txt", prompt_type.as_str()));
        match std::fs::read_to_string(&path) {
            Ok(body) if !body.trim().is_empty() => {
                debug!(
                    "event=prompt_load module=ai status=ok prompt_type={} source=file",
                    prompt_type.as_str()
                );
                Ok(Self { prompt_type, body })
            }
            Ok(_) => Ok(Self::builtin(prompt_type)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::builtin(prompt_type))
            }
            Err(err) => Err(AiError::Io(err)),
        }
    }

    /// Fills the placeholders; entries are written in the editable text form.
    pub fn render(&self, start: NaiveDate, end: NaiveDate, entries: &[Entry]) -> String {
        let listing = if entries.is_empty() {
            EMPTY_ENTRIES.to_string()
        } else {
            serialize(entries)
        };
        self.body
            .replace("{{start}}", &start.format("%Y-%m-%d").to_string())
            .replace("{{end}}", &end.format("%Y-%m-%d").to_string())
            .replace("{{entries}}", listing.trim_end())
    }
}
