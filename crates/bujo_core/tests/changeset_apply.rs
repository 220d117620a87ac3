use bujo_core::db::open_db_in_memory;
use bujo_core::repo::{EntryRepository, SqliteEntryRepository};
use bujo_core::{
    apply_changeset, compute_changeset, parse_document, parse_document_with_ids,
    serialize_with_ids, CancellationToken, ChangesetContext, DiffOp, Entry, EntryType,
    RelativeDateParser, RepoError,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()
}

fn today_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap()
}

fn dates() -> RelativeDateParser {
    RelativeDateParser::new(today())
}

fn ctx() -> ChangesetContext {
    ChangesetContext::new(now()).scheduled_on(today_start())
}

#[test]
fn edited_day_is_written_back() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    for (kind, content) in [
        (EntryType::Task, "Buy milk"),
        (EntryType::Note, "Call mom"),
        (EntryType::Note, "Old idea"),
    ] {
        repo.insert(&Entry::new(kind, content, now()).scheduled(today_start()))
            .unwrap();
    }

    let loaded = repo.get_by_date(today()).unwrap();
    let rendered = serialize_with_ids(&loaded);
    assert_eq!(rendered.text, ". Buy milk\n- Call mom\n- Old idea");

    let edited = "x Buy milk\n- Call mom\n  . Bring cake";
    let mut ids = rendered.line_ids[..2].to_vec();
    ids.push(None);
    let document = parse_document_with_ids(edited, &ids, &dates());
    let changeset = compute_changeset(&loaded, &document, &ctx());

    let report = apply_changeset(&repo, changeset, &CancellationToken::new()).unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.applied(), 3);
    assert!(report.errors.is_empty());

    let after = repo.get_by_date(today()).unwrap();
    assert_eq!(serialize_with_ids(&after).text, edited);
    let cake = after.iter().find(|e| e.content == "Bring cake").unwrap();
    assert_eq!(cake.parent_entity_id, Some(loaded[1].entity_id));
    assert_eq!(cake.created_at, now());
}

#[test]
fn migration_line_creates_continuation() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let task = Entry::new(EntryType::Task, "Call dentist", now()).scheduled(today_start());
    repo.insert(&task).unwrap();

    let loaded = repo.get_by_date(today()).unwrap();
    let document = parse_document_with_ids(
        ">[2026-01-29] . Call dentist",
        &[Some(task.entity_id)],
        &dates(),
    );
    let report = apply_changeset(
        &repo,
        compute_changeset(&loaded, &document, &ctx()),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(report.migrated, 1);
    let (source, continuation) = report.migrations[0];
    assert_eq!(source, task.entity_id);
    assert_eq!(
        repo.get_by_entity_id(source).unwrap().unwrap().kind,
        EntryType::Migrated
    );
    let moved = repo
        .get_by_date(NaiveDate::from_ymd_opt(2026, 1, 29).unwrap())
        .unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].entity_id, continuation);
    assert_eq!(moved[0].migration_count, 1);
}

#[test]
fn indentation_change_reparents_stored_entry() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let p = Entry::new(EntryType::Task, "P", now()).scheduled(today_start());
    let c = Entry::new(EntryType::Task, "C", now()).scheduled(today_start());
    repo.insert(&p).unwrap();
    repo.insert(&c).unwrap();

    let loaded = repo.get_by_date(today()).unwrap();
    let document = parse_document_with_ids(
        ". P\n  . C",
        &[Some(p.entity_id), Some(c.entity_id)],
        &dates(),
    );
    let report = apply_changeset(
        &repo,
        compute_changeset(&loaded, &document, &ctx()),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(report.reparented, 1);
    let child = repo.get_by_entity_id(c.entity_id).unwrap().unwrap();
    assert_eq!(child.parent_entity_id, Some(p.entity_id));
    assert_eq!(child.depth, 1);
    assert_eq!(child.content, "C");
}

#[test]
fn failure_returns_the_unapplied_tail() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    // Snapshot entry that never reached storage.
    let ghost = Entry::new(EntryType::Task, "ghost", now());

    let document =
        parse_document_with_ids("x ghost\n. fresh", &[Some(ghost.entity_id), None], &dates());
    let changeset = compute_changeset(&[ghost.clone()], &document, &ctx());
    assert_eq!(changeset.operations.len(), 2);

    let err = apply_changeset(&repo, changeset, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err.error, RepoError::NotFound { .. }));
    assert_eq!(err.remaining.len(), 2);
    assert!(matches!(
        &err.remaining[0],
        DiffOp::Update { entity_id, .. } if *entity_id == ghost.entity_id
    ));
    assert!(repo.get_all().unwrap().is_empty());
}

#[test]
fn cancelled_token_applies_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let document = parse_document(". one\n. two", &dates());
    let err = apply_changeset(&repo, compute_changeset(&[], &document, &ctx()), &token)
        .unwrap_err();

    assert!(matches!(err.error, RepoError::Cancelled));
    assert_eq!(err.remaining.len(), 2);
    assert!(repo.get_all().unwrap().is_empty());
}

#[test]
fn line_errors_pass_through_the_report() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();

    let document = parse_document("  . dangling\n. fine", &dates());
    let report = apply_changeset(
        &repo,
        compute_changeset(&[], &document, &ctx()),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].line_number, 1);
    assert_eq!(report.inserted, 1);
}

#[test]
fn day_slice_keeps_parents_stored_on_other_days() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let yesterday = Utc.with_ymd_and_hms(2026, 1, 19, 0, 0, 0).unwrap();
    let trip = Entry::new(EntryType::Event, "Trip", now()).scheduled(yesterday);
    let pack = Entry::new(EntryType::Task, "Pack bags", now())
        .scheduled(today_start())
        .child_of(&trip);
    repo.insert(&trip).unwrap();
    repo.insert(&pack).unwrap();

    let loaded = repo.get_by_date(today()).unwrap();
    let rendered = serialize_with_ids(&loaded);
    assert_eq!(rendered.text, ". Pack bags");

    let mut ids = rendered.line_ids.clone();
    ids.push(None);
    let document = parse_document_with_ids("x Pack bags\n  . buy adapter", &ids, &dates());
    let changeset = compute_changeset(&loaded, &document, &ctx());
    let report = apply_changeset(&repo, changeset, &CancellationToken::new()).unwrap();
    assert_eq!((report.updated, report.inserted, report.reparented), (1, 1, 0));

    let stored = repo.get_by_entity_id(pack.entity_id).unwrap().unwrap();
    assert_eq!(stored.kind, EntryType::Done);
    assert_eq!(stored.parent_entity_id, Some(trip.entity_id));
    assert_eq!(stored.depth, 1);

    let adapter = repo
        .get_by_date(today())
        .unwrap()
        .into_iter()
        .find(|entry| entry.content == "buy adapter")
        .unwrap();
    assert_eq!(adapter.parent_entity_id, Some(pack.entity_id));
    assert_eq!(adapter.depth, 2);
}
