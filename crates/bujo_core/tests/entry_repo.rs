use bujo_core::db::open_db_in_memory;
use bujo_core::model::version::OpType;
use bujo_core::repo::{Clock, EntryRepository, SqliteEntryRepository};
use bujo_core::{
    CancellationToken, EntityId, Entry, EntryType, Priority, RepoError, SearchOptions,
    ValidationError,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Clock that only moves when told to.
struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    fn starting_at(at: DateTime<Utc>) -> Self {
        Self(Arc::new(AtomicI64::new(at.timestamp_millis())))
    }

    fn advance(&self, by: Duration) {
        self.0.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0.load(Ordering::SeqCst))
            .unwrap()
    }

    fn clock(&self) -> Clock {
        let millis = Arc::clone(&self.0);
        Arc::new(move || {
            Utc.timestamp_millis_opt(millis.load(Ordering::SeqCst))
                .unwrap()
        })
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
}

fn repo_with_clock<'c>(conn: &'c Connection, clock: &ManualClock) -> SqliteEntryRepository<'c> {
    SqliteEntryRepository::try_new(conn)
        .unwrap()
        .with_clock(clock.clock())
}

fn current_rows(conn: &Connection, entity_id: EntityId) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE entity_id = ?1 AND valid_to IS NULL;",
        [entity_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn insert_and_read_back() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();

    let mut entry = Entry::new(EntryType::Task, "Buy milk", start())
        .with_priority(Priority::Low)
        .scheduled(day(2).and_hms_opt(0, 0, 0).unwrap().and_utc());
    entry.location = Some("Lisbon".to_string());
    let row_id = repo.insert(&entry).unwrap();

    let loaded = repo.get_by_entity_id(entry.entity_id).unwrap().unwrap();
    assert_eq!(loaded.row_id, row_id);
    assert_eq!(loaded.content, "Buy milk");
    assert_eq!(loaded.priority, Priority::Low);
    assert_eq!(loaded.location.as_deref(), Some("Lisbon"));
    assert_eq!(loaded.scheduled_date, entry.scheduled_date);
    assert_eq!(loaded.created_at, start());
    assert_eq!(repo.get_by_row_id(row_id).unwrap(), Some(loaded));
}

#[test]
fn duplicate_entity_id_is_conflict() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let entry = Entry::new(EntryType::Note, "once", start());

    repo.insert(&entry).unwrap();
    assert!(matches!(repo.insert(&entry), Err(RepoError::Conflict(_))));
}

#[test]
fn blank_content_is_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let entry = Entry::new(EntryType::Note, "   ", start());

    assert!(matches!(
        repo.insert(&entry),
        Err(RepoError::Validation(ValidationError::EmptyContent))
    ));
}

#[test]
fn child_depth_must_follow_parent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let parent = Entry::new(EntryType::Task, "parent", start());
    repo.insert(&parent).unwrap();

    let mut child = Entry::new(EntryType::Note, "child", start()).child_of(&parent);
    child.depth = 2;
    assert!(matches!(
        repo.insert(&child),
        Err(RepoError::Validation(ValidationError::DepthMismatch { .. }))
    ));

    let orphan = Entry::new(EntryType::Note, "orphan", start())
        .child_of(&Entry::new(EntryType::Task, "ghost", start()));
    assert!(matches!(
        repo.insert(&orphan),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn updates_append_versions_and_keep_one_current_row() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::starting_at(start());
    let repo = repo_with_clock(&conn, &clock);

    let mut entry = Entry::new(EntryType::Task, "draft", start());
    let first_row = repo.insert(&entry).unwrap();

    clock.advance(Duration::hours(1));
    entry.content = "final".to_string();
    let second_row = repo.update(&entry).unwrap();
    assert_ne!(first_row, second_row);

    clock.advance(Duration::hours(1));
    entry.kind = EntryType::Done;
    repo.update(&entry).unwrap();

    assert_eq!(current_rows(&conn, entry.entity_id), 1);
    let history = repo.get_history(entry.entity_id).unwrap();
    let versions: Vec<(u32, OpType, &str)> = history
        .iter()
        .map(|v| (v.info.version, v.info.op_type, v.value.content.as_str()))
        .collect();
    assert_eq!(
        versions,
        vec![
            (1, OpType::Insert, "draft"),
            (2, OpType::Update, "final"),
            (3, OpType::Update, "final"),
        ]
    );
    assert_eq!(history[0].info.valid_to, Some(history[1].info.valid_from));
    assert!(history[2].info.is_current());
    assert!(history.iter().all(|v| v.value.created_at == start()));
}

#[test]
fn as_of_returns_the_version_valid_at_that_instant() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::starting_at(start());
    let repo = repo_with_clock(&conn, &clock);

    let mut entry = Entry::new(EntryType::Task, "v1", start());
    repo.insert(&entry).unwrap();
    let after_insert = clock.now();

    clock.advance(Duration::minutes(10));
    entry.content = "v2".to_string();
    repo.update(&entry).unwrap();
    let after_update = clock.now();

    clock.advance(Duration::minutes(10));
    repo.delete(entry.entity_id).unwrap();

    let before = repo
        .get_as_of(entry.entity_id, start() - Duration::seconds(1))
        .unwrap();
    assert!(before.is_none());
    assert_eq!(
        repo.get_as_of(entry.entity_id, after_insert)
            .unwrap()
            .unwrap()
            .content,
        "v1"
    );
    assert_eq!(
        repo.get_as_of(entry.entity_id, after_update)
            .unwrap()
            .unwrap()
            .content,
        "v2"
    );
    assert!(repo.get_as_of(entry.entity_id, clock.now()).unwrap().is_none());
    assert!(repo.get_by_entity_id(entry.entity_id).unwrap().is_none());

    let history = repo.get_history(entry.entity_id).unwrap();
    assert_eq!(history.last().unwrap().info.op_type, OpType::Delete);
    assert_eq!(current_rows(&conn, entry.entity_id), 1);
}

#[test]
fn update_of_missing_or_deleted_entry_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let entry = Entry::new(EntryType::Task, "gone", start());

    assert!(matches!(repo.update(&entry), Err(RepoError::NotFound { .. })));
    repo.insert(&entry).unwrap();
    repo.delete(entry.entity_id).unwrap();
    assert!(matches!(repo.update(&entry), Err(RepoError::NotFound { .. })));
    assert!(matches!(
        repo.delete(entry.entity_id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn reparenting_into_a_descendant_is_conflict() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();

    let root = Entry::new(EntryType::Task, "root", start());
    let child = Entry::new(EntryType::Task, "child", start()).child_of(&root);
    repo.insert(&root).unwrap();
    repo.insert(&child).unwrap();

    let moved = root.clone().child_of(&child);
    assert!(matches!(repo.update(&moved), Err(RepoError::Conflict(_))));
}

#[test]
fn reparent_rewrites_descendant_depths() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();

    let anchor = Entry::new(EntryType::Event, "anchor", start());
    let branch = Entry::new(EntryType::Task, "branch", start());
    let leaf = Entry::new(EntryType::Note, "leaf", start()).child_of(&branch);
    for entry in [&anchor, &branch, &leaf] {
        repo.insert(entry).unwrap();
    }

    repo.update(&branch.clone().child_of(&anchor)).unwrap();

    let leaf = repo.get_by_entity_id(leaf.entity_id).unwrap().unwrap();
    assert_eq!(leaf.depth, 2);
    assert_eq!(leaf.parent_entity_id, Some(branch.entity_id));

    let tree = repo
        .get_with_children(
            repo.get_by_entity_id(anchor.entity_id)
                .unwrap()
                .unwrap()
                .row_id,
        )
        .unwrap();
    let names: Vec<(&str, u32)> = tree.iter().map(|e| (e.content.as_str(), e.depth)).collect();
    assert_eq!(names, vec![("anchor", 0), ("branch", 1), ("leaf", 2)]);
}

#[test]
fn deleting_a_parent_promotes_its_children() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();

    let top = Entry::new(EntryType::Task, "top", start());
    let middle = Entry::new(EntryType::Task, "middle", start()).child_of(&top);
    let bottom = Entry::new(EntryType::Note, "bottom", start()).child_of(&middle);
    for entry in [&top, &middle, &bottom] {
        repo.insert(entry).unwrap();
    }

    repo.delete(middle.entity_id).unwrap();

    let bottom = repo.get_by_entity_id(bottom.entity_id).unwrap().unwrap();
    assert_eq!(bottom.parent_entity_id, Some(top.entity_id));
    assert_eq!(bottom.depth, 1);

    let top_row = repo.get_by_entity_id(top.entity_id).unwrap().unwrap().row_id;
    let children = repo.get_children(top_row).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].content, "bottom");
}

#[test]
fn delete_with_children_removes_whole_subtree() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();

    let top = Entry::new(EntryType::Task, "top", start());
    let a = Entry::new(EntryType::Task, "a", start()).child_of(&top);
    let b = Entry::new(EntryType::Task, "b", start()).child_of(&a);
    let other = Entry::new(EntryType::Task, "other", start());
    for entry in [&top, &a, &b, &other] {
        repo.insert(entry).unwrap();
    }

    assert_eq!(repo.delete_with_children(top.entity_id).unwrap(), 3);
    let remaining: Vec<String> = repo
        .get_all()
        .unwrap()
        .into_iter()
        .map(|e| e.content)
        .collect();
    assert_eq!(remaining, vec!["other"]);
}

#[test]
fn migrate_marks_source_and_creates_continuation() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();

    let source = Entry::new(EntryType::Task, "Call dentist", start())
        .with_priority(Priority::High)
        .scheduled(day(1).and_hms_opt(0, 0, 0).unwrap().and_utc());
    repo.insert(&source).unwrap();

    let continuation_id = repo.migrate(source.entity_id, day(29)).unwrap();
    assert_ne!(continuation_id, source.entity_id);

    let migrated = repo.get_by_entity_id(source.entity_id).unwrap().unwrap();
    assert_eq!(migrated.kind, EntryType::Migrated);

    let continuation = repo.get_by_entity_id(continuation_id).unwrap().unwrap();
    assert_eq!(continuation.kind, EntryType::Task);
    assert_eq!(continuation.content, "Call dentist");
    assert_eq!(continuation.priority, Priority::High);
    assert_eq!(continuation.migration_count, 1);
    assert_eq!(
        continuation.scheduled_date,
        Some(day(29).and_hms_opt(0, 0, 0).unwrap().and_utc())
    );
    assert_eq!(repo.get_by_date(day(29)).unwrap(), vec![continuation.clone()]);

    let again = repo.migrate(continuation_id, day(30)).unwrap();
    assert_eq!(
        repo.get_by_entity_id(again).unwrap().unwrap().migration_count,
        2
    );
    assert!(matches!(
        repo.migrate(source.entity_id, day(30)),
        Err(RepoError::Conflict(_))
    ));
}

#[test]
fn date_queries_and_overdue() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let at = |d: u32| day(d).and_hms_opt(0, 0, 0).unwrap().and_utc();

    let late_task = Entry::new(EntryType::Task, "late", start()).scheduled(at(1));
    let done_task = Entry::new(EntryType::Done, "finished", start()).scheduled(at(1));
    let note = Entry::new(EntryType::Note, "remark", start()).scheduled(at(2));
    let future = Entry::new(EntryType::Event, "party", start()).scheduled(at(9));
    for entry in [&late_task, &done_task, &note, &future] {
        repo.insert(entry).unwrap();
    }

    assert_eq!(repo.get_by_date(day(1)).unwrap().len(), 2);
    assert_eq!(repo.get_by_date_range(day(1), day(2)).unwrap().len(), 3);
    assert_eq!(repo.get_by_date_range(day(3), day(8)).unwrap().len(), 0);

    let overdue = repo.get_overdue(at(5)).unwrap();
    let names: Vec<&str> = overdue.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(names, vec!["late"]);
}

#[test]
fn search_filters_compose() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let at = |d: u32| day(d).and_hms_opt(0, 0, 0).unwrap().and_utc();

    let entries = [
        Entry::new(EntryType::Task, "Email Bob about #Budget", start()).scheduled(at(1)),
        Entry::new(EntryType::Note, "budget looks fine #budget #q3", start()).scheduled(at(2)),
        Entry::new(EntryType::Task, "Book flights", start()).scheduled(at(3)),
        Entry::new(EntryType::Task, "100% done_ish", start()).scheduled(at(3)),
    ];
    for entry in &entries {
        repo.insert(entry).unwrap();
    }

    assert_eq!(repo.search(&SearchOptions::new("BUDGET")).unwrap().len(), 2);

    let mut tasks = SearchOptions::new("budget");
    tasks.kind = Some(EntryType::Task);
    assert_eq!(repo.search(&tasks).unwrap().len(), 1);

    let mut tagged = SearchOptions::default();
    tagged.tags = vec!["#budget".to_string(), "Q3".to_string()];
    let hits = repo.search(&tagged).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, EntryType::Note);

    let mut ranged = SearchOptions::default();
    ranged.date_from = Some(day(2));
    ranged.date_to = Some(day(3));
    assert_eq!(repo.search(&ranged).unwrap().len(), 3);

    let mut limited = SearchOptions::default();
    limited.limit = 2;
    assert_eq!(repo.search(&limited).unwrap().len(), 2);

    assert_eq!(repo.search(&SearchOptions::new("100%")).unwrap().len(), 1);
    assert_eq!(repo.search(&SearchOptions::new("e_i")).unwrap().len(), 1);
    assert_eq!(repo.search(&SearchOptions::new("k_f")).unwrap().len(), 0);
}

#[test]
fn cancelled_token_blocks_every_operation() {
    let conn = open_db_in_memory().unwrap();
    let token = CancellationToken::new();
    let repo = SqliteEntryRepository::try_new(&conn)
        .unwrap()
        .with_cancellation(token.clone());
    let entry = Entry::new(EntryType::Task, "later", start());
    repo.insert(&entry).unwrap();

    token.cancel();
    assert!(matches!(
        repo.insert(&Entry::new(EntryType::Task, "blocked", start())),
        Err(RepoError::Cancelled)
    ));
    assert!(matches!(
        repo.get_by_entity_id(entry.entity_id),
        Err(RepoError::Cancelled)
    ));
    assert!(matches!(
        repo.delete(entry.entity_id),
        Err(RepoError::Cancelled)
    ));

    let fresh = SqliteEntryRepository::try_new(&conn).unwrap();
    assert_eq!(fresh.get_all().unwrap().len(), 1);
}

#[test]
fn get_all_keeps_creation_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();

    let first = Entry::new(EntryType::Task, "first", start());
    let second = Entry::new(EntryType::Task, "second", start());
    let earlier = Entry::new(EntryType::Task, "earlier", start() - Duration::days(1));
    for entry in [&first, &second, &earlier] {
        repo.insert(entry).unwrap();
    }
    // Updating the first entry must not move it behind the second.
    let mut edited = first.clone();
    edited.content = "first edited".to_string();
    repo.update(&edited).unwrap();

    let names: Vec<String> = repo.get_all().unwrap().into_iter().map(|e| e.content).collect();
    assert_eq!(names, vec!["earlier", "first edited", "second"]);
}
