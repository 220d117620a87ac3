use bujo_core::db::migrations::{latest_version, schema_version};
use bujo_core::db::{open_db, open_db_in_memory, open_from_config, DbError};
use bujo_core::JournalConfig;
use bujo_core::repo::{RepoError, SqliteEntryRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for table in [
        "entries",
        "lists",
        "list_items",
        "habits",
        "habit_logs",
        "goals",
        "day_contexts",
        "summaries",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn foreign_keys_are_enabled() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bujo.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first).unwrap(), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second).unwrap(), latest_version());
    assert_table_exists(&second, "entries");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion { found, supported } => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteEntryRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn second_current_row_for_an_entity_is_rejected_by_schema() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO entries
        (entity_id, version, valid_from, op_type, type, content, created_at)
        VALUES ('11111111-1111-4111-8111-111111111111', ?1, 0, 'INSERT', 'task', 'x', 0);";
    conn.execute(insert, [1]).unwrap();
    assert!(conn.execute(insert, [2]).is_err());
}

#[test]
fn failed_step_rolls_back_the_whole_upgrade() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clash.db");

    // A foreign `entries` table without the version columns breaks step 1.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE entries (legacy TEXT);").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::Migration { version, name, .. } => {
            assert_eq!(version, 1);
            assert_eq!(name, "entries");
        }
        other => panic!("unexpected error: {other}"),
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 0);
    let lists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'lists';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(lists, 0);
}

#[test]
fn file_store_runs_in_wal_mode() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("wal.db")).unwrap();
    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_ascii_lowercase(), "wal");
}

#[test]
fn config_points_at_the_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("journal");
    let data_dir_text = data_dir.to_string_lossy().into_owned();
    let config = JournalConfig::from_lookup(|key| {
        (key == "BUJO_DATA_DIR").then(|| data_dir_text.clone())
    })
    .unwrap();

    let conn = open_from_config(&config).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert!(data_dir.join("bujo.db").exists());
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
