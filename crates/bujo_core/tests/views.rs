use bujo_core::attention::Indicator;
use bujo_core::db::open_db_in_memory;
use bujo_core::repo::{EntryRepository, SqliteEntryRepository};
use bujo_core::views::{attention_view, overdue_view, pending_view};
use bujo_core::{Entry, EntryType};
use chrono::{DateTime, TimeZone, Utc};

fn june(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
}

fn seed(repo: &SqliteEntryRepository<'_>) {
    let conference = Entry::new(EntryType::Event, "Conference", june(9, 8)).scheduled(june(20, 0));
    let entries = [
        Entry::new(EntryType::Task, "late report", june(1, 8)).scheduled(june(5, 0)),
        conference.clone(),
        Entry::new(EntryType::Task, "prepare slides", june(9, 9)).child_of(&conference),
        Entry::new(EntryType::Question, "why so slow?", june(10, 8)),
        Entry::new(EntryType::Done, "shipped", june(10, 9)).scheduled(june(2, 0)),
        Entry::new(EntryType::Task, "calm task", june(10, 10)),
    ];
    for entry in &entries {
        repo.insert(entry).unwrap();
    }
}

fn contents<'a>(entries: impl Iterator<Item = &'a Entry>) -> Vec<&'a str> {
    entries.map(|entry| entry.content.as_str()).collect()
}

#[test]
fn overdue_view_scores_overdue_entries() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed(&repo);

    let overdue = overdue_view(&repo, june(10, 12)).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].entry.content, "late report");
    assert_eq!(overdue[0].attention.score, 75);
    assert_eq!(
        overdue[0].attention.indicators,
        vec![Indicator::Overdue, Indicator::Aging]
    );
}

#[test]
fn pending_view_puts_scheduled_first() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed(&repo);

    let pending = pending_view(&repo).unwrap();
    assert_eq!(
        contents(pending.iter()),
        vec![
            "late report",
            "Conference",
            "prepare slides",
            "why so slow?",
            "calm task"
        ]
    );
}

#[test]
fn attention_view_ranks_and_limits() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed(&repo);

    let ranked = attention_view(&repo, june(10, 12), 10).unwrap();
    let scores: Vec<(&str, u32)> = ranked
        .iter()
        .map(|scored| (scored.entry.content.as_str(), scored.attention.score))
        .collect();
    assert_eq!(
        scores,
        vec![("late report", 75), ("why so slow?", 10), ("prepare slides", 5)]
    );

    let top = attention_view(&repo, june(10, 12), 2).unwrap();
    assert_eq!(contents(top.iter().map(|scored| &scored.entry)), vec!["late report", "why so slow?"]);
}
