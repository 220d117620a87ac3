//! Reflection drafting over a journal period.
//!
//! # Responsibility
//! - Gather the entries of one horizon, render the prompt, drive the adapter.
//! - Turn the streamed text into a validated `Summary`.
//!
//! # Invariants
//! - Disabled configuration refuses before any read or adapter call.
//! - Cancellation is checked before generation and between tokens.

use super::prompt::{PromptTemplate, PromptType};
use super::{AiAdapter, AiError};
use crate::cancel::CancellationToken;
use crate::config::JournalConfig;
use crate::model::summary::Summary;
use crate::model::ValidationError;
use crate::repo::{EntryRepository, SummaryRepository};
use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use std::path::PathBuf;

pub struct ReflectionGenerator<A: AiAdapter> {
    adapter: A,
    enabled: bool,
    prompt_dir: PathBuf,
}

impl<A: AiAdapter> ReflectionGenerator<A> {
    pub fn new(adapter: A, enabled: bool, prompt_dir: impl Into<PathBuf>) -> Self {
        Self {
            adapter,
            enabled,
            prompt_dir: prompt_dir.into(),
        }
    }

    pub fn from_config(adapter: A, config: &JournalConfig) -> Self {
        Self::new(adapter, config.ai_enabled, config.prompt_dir.clone())
    }

    /// Drafts a reflection for the period of `prompt_type` containing `anchor`.
    ///
    /// # Errors
    /// - `Disabled` when AI is switched off.
    /// - `Cancelled` when `cancel` trips at any point.
    /// - `Validation` when the model returns only whitespace.
    pub fn generate<R>(
        &self,
        entries: &R,
        prompt_type: PromptType,
        anchor: NaiveDate,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Summary, AiError>
    where
        R: EntryRepository + ?Sized,
    {
        if !self.enabled {
            return Err(AiError::Disabled);
        }
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }

        let horizon = prompt_type.horizon();
        let (start, end) = horizon.range_containing(anchor);
        let period = entries.get_by_date_range(start, end)?;
        let prompt =
            PromptTemplate::load(&self.prompt_dir, prompt_type)?.render(start, end, &period);

        info!(
            "event=reflection_generate module=ai status=start provider={} horizon={} entries={}",
            self.adapter.provider().as_str(),
            horizon.as_str(),
            period.len()
        );

        let mut text = String::new();
        let mut tokens = 0usize;
        for token in self.adapter.generate(&prompt, cancel)? {
            if cancel.is_cancelled() {
                warn!(
                    "event=reflection_generate module=ai status=error reason=cancelled tokens={tokens}"
                );
                return Err(AiError::Cancelled);
            }
            text.push_str(&token?);
            tokens += 1;
        }

        let content = text.trim();
        if content.is_empty() {
            return Err(AiError::Validation(ValidationError::EmptyContent));
        }
        let summary = Summary::new(horizon, content, start, end, now);
        summary.validate()?;

        info!(
            "event=reflection_generate module=ai status=ok horizon={} tokens={} chars={}",
            horizon.as_str(),
            tokens,
            summary.content.chars().count()
        );
        Ok(summary)
    }

    /// Drafts a reflection and upserts it for its horizon and start date.
    pub fn generate_and_store<R, S>(
        &self,
        entries: &R,
        summaries: &S,
        prompt_type: PromptType,
        anchor: NaiveDate,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Summary, AiError>
    where
        R: EntryRepository + ?Sized,
        S: SummaryRepository + ?Sized,
    {
        let mut summary = self.generate(entries, prompt_type, anchor, now, cancel)?;
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }
        summary.row_id = summaries.upsert(&summary)?;
        Ok(summary)
    }
}
