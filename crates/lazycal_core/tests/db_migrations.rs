use lazycal_core::db::migrations::{apply_migrations, latest_version, schema_version};
use lazycal_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const SERIES_TABLES: [&str; 5] = [
    "events",
    "recurrence_rules",
    "event_occurrences",
    "event_exceptions",
    "event_reminders",
];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for table in SERIES_TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn apply_migrations_reports_only_pending_steps() {
    let mut conn = Connection::open_in_memory().unwrap();

    assert_eq!(apply_migrations(&mut conn).unwrap(), latest_version() as usize);
    assert_eq!(apply_migrations(&mut conn).unwrap(), 0);
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lazycal.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "event_exceptions");
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
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
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
fn schema_rejects_duplicate_exception_keys() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO events (
            id, owner_id, title, event_type, start_at, end_at, time_zone,
            all_day, transparency, created_at, updated_at
         ) VALUES ('e1', 'o1', 'Standup', 'meeting', 1000, 2000, 'UTC', 0, 'opaque', 0, 0);
         INSERT INTO event_exceptions (
            id, event_id, original_at, time_zone, is_deleted, created_at, updated_at
         ) VALUES ('x1', 'e1', 1000, 'UTC', 1, 0, 0);",
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO event_exceptions (
            id, event_id, original_at, time_zone, is_deleted, created_at, updated_at
         ) VALUES ('x2', 'e1', 1000, 'UTC', 0, 0, 0);",
        [],
    );
    assert!(duplicate.is_err());
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
