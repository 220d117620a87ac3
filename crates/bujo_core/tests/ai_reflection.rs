use bujo_core::ai::{AiAdapter, AiError, AiProvider, PromptType, ReflectionGenerator, TokenStream};
use bujo_core::db::open_db_in_memory;
use bujo_core::model::summary::Horizon;
use bujo_core::repo::{
    EntryRepository, SqliteEntryRepository, SqliteSummaryRepository, SummaryRepository,
};
use bujo_core::{CancellationToken, Entry, EntryType, ValidationError};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::cell::RefCell;

/// Replays canned tokens and records every prompt it was given.
struct ScriptedAdapter {
    tokens: Vec<&'static str>,
    prompts: RefCell<Vec<String>>,
    /// Trips the caller's token after this many tokens.
    cancel_after: Option<usize>,
}

impl ScriptedAdapter {
    fn new(tokens: Vec<&'static str>) -> Self {
        Self {
            tokens,
            prompts: RefCell::new(Vec::new()),
            cancel_after: None,
        }
    }
}

impl AiAdapter for ScriptedAdapter {
    fn provider(&self) -> AiProvider {
        AiProvider::Local
    }

    fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<TokenStream, AiError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        let cancel = cancel.clone();
        let cancel_after = self.cancel_after;
        let tokens: Vec<String> = self.tokens.iter().map(|t| t.to_string()).collect();
        Ok(Box::new(tokens.into_iter().enumerate().map(
            move |(index, token)| {
                if cancel_after == Some(index) {
                    cancel.cancel();
                }
                Ok(token)
            },
        )))
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 21, 0, 0).unwrap()
}

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 12).unwrap()
}

fn seed(repo: &SqliteEntryRepository<'_>) {
    let monday = Utc.with_ymd_and_hms(2025, 6, 9, 0, 0, 0).unwrap();
    let next_week = Utc.with_ymd_and_hms(2025, 6, 16, 0, 0, 0).unwrap();
    repo.insert(&Entry::new(EntryType::Done, "Shipped the release", now()).scheduled(monday))
        .unwrap();
    repo.insert(&Entry::new(EntryType::Task, "Plan the offsite", now()).scheduled(next_week))
        .unwrap();
}

#[test]
fn weekly_reflection_is_stored() {
    let conn = open_db_in_memory().unwrap();
    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    let summaries = SqliteSummaryRepository::try_new(&conn).unwrap();
    seed(&entries);

    let prompts = tempfile::tempdir().unwrap();
    let adapter = ScriptedAdapter::new(vec!["  A calm ", "week."]);
    let generator = ReflectionGenerator::new(&adapter, true, prompts.path());

    let summary = generator
        .generate_and_store(
            &entries,
            &summaries,
            PromptType::Weekly,
            anchor(),
            now(),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(summary.content, "A calm week.");
    assert_eq!(summary.horizon, Horizon::Weekly);
    assert_eq!(summary.start_date, NaiveDate::from_ymd_opt(2025, 6, 9).unwrap());
    assert_eq!(summary.end_date, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    assert!(summary.row_id > 0);
    assert_eq!(
        summaries.get(Horizon::Weekly, summary.start_date).unwrap(),
        Some(summary)
    );

    let sent = adapter.prompts.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("x Shipped the release"));
    assert!(!sent[0].contains("Plan the offsite"));
    assert!(sent[0].contains("2025-06-09"));
}

#[test]
fn prompt_file_overrides_builtin_template() {
    let conn = open_db_in_memory().unwrap();
    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    let prompts = tempfile::tempdir().unwrap();
    std::fs::write(
        prompts.path().join("daily.txt"),
        "Day {{start}} to {{end}}:\n{{entries}}",
    )
    .unwrap();

    let adapter = ScriptedAdapter::new(vec!["ok"]);
    let generator = ReflectionGenerator::new(&adapter, true, prompts.path());
    generator
        .generate(
            &entries,
            PromptType::Daily,
            anchor(),
            now(),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(
        adapter.prompts.borrow()[0],
        "Day 2025-06-12 to 2025-06-12:\n(no entries)"
    );
}

#[test]
fn disabled_generator_never_calls_the_adapter() {
    let conn = open_db_in_memory().unwrap();
    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    let adapter = ScriptedAdapter::new(vec!["unused"]);
    let generator = ReflectionGenerator::new(&adapter, false, "/nonexistent");

    let result = generator.generate(
        &entries,
        PromptType::Daily,
        anchor(),
        now(),
        &CancellationToken::new(),
    );
    assert!(matches!(result, Err(AiError::Disabled)));
    assert!(adapter.prompts.borrow().is_empty());
}

#[test]
fn cancellation_stops_generation() {
    let conn = open_db_in_memory().unwrap();
    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    let summaries = SqliteSummaryRepository::try_new(&conn).unwrap();

    let tripped = CancellationToken::new();
    tripped.cancel();
    let adapter = ScriptedAdapter::new(vec!["never"]);
    let generator = ReflectionGenerator::new(&adapter, true, "/nonexistent");
    assert!(matches!(
        generator.generate(&entries, PromptType::Daily, anchor(), now(), &tripped),
        Err(AiError::Cancelled)
    ));
    assert!(adapter.prompts.borrow().is_empty());

    let mut midway = ScriptedAdapter::new(vec!["one ", "two ", "three"]);
    midway.cancel_after = Some(1);
    let generator = ReflectionGenerator::new(&midway, true, "/nonexistent");
    let result = generator.generate_and_store(
        &entries,
        &summaries,
        PromptType::Daily,
        anchor(),
        now(),
        &CancellationToken::new(),
    );
    assert!(matches!(result, Err(AiError::Cancelled)));
    assert!(summaries
        .get(Horizon::Daily, anchor())
        .unwrap()
        .is_none());
}

#[test]
fn blank_output_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    let adapter = ScriptedAdapter::new(vec![" ", "\n"]);
    let generator = ReflectionGenerator::new(&adapter, true, "/nonexistent");

    assert!(matches!(
        generator.generate(
            &entries,
            PromptType::Quarterly,
            anchor(),
            now(),
            &CancellationToken::new()
        ),
        Err(AiError::Validation(ValidationError::EmptyContent))
    ));
}
