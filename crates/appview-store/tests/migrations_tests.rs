// Integration tests for the migration framework

use appview_core::errors::ExErrorKind;
use appview_store::errors::from_rusqlite;
use appview_store::migrations::{applied_migrations, apply_migrations};
use appview_store::SqliteConnector;
use rusqlite::Connection;
use std::time::Duration;

fn index_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master WHERE type = 'index' \
             AND tbl_name = ?1 AND name LIKE 'idx_%' ORDER BY name",
        )
        .unwrap();
    stmt.query_map([table], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn test_apply_migrations_on_empty_db() {
    let mut conn = Connection::open_in_memory().unwrap();

    apply_migrations(&mut conn).unwrap();

    assert_eq!(
        applied_migrations(&conn).unwrap(),
        vec!["001_preprints", "002_reviews"]
    );
    assert_eq!(
        index_names(&conn, "preprints"),
        vec!["idx_preprints_last_synced_at", "idx_preprints_submitted_by"]
    );
    assert_eq!(
        index_names(&conn, "reviews"),
        vec!["idx_reviews_last_synced_at", "idx_reviews_subject_uri"]
    );
}

#[test]
fn test_schema_rejects_blank_title() {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations(&mut conn).unwrap();

    let err = conn
        .execute(
            "INSERT INTO preprints (uri, cid, submitted_by, title, created_at, indexed_at)
             VALUES ('at://did:plc:a/c/1', 'bafy', 'did:plc:a', '   ', 0, 0)",
            [],
        )
        .unwrap_err();
    assert_eq!(from_rusqlite(err).kind(), ExErrorKind::ConstraintViolation);
}

#[test]
fn test_reopening_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.db");

    SqliteConnector::open(&path, Duration::from_millis(50)).unwrap();
    let reopened = SqliteConnector::open(&path, Duration::from_millis(50)).unwrap();

    assert_eq!(reopened.applied_migrations().unwrap().len(), 2);
}

#[test]
fn test_tampered_migration_history_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.db");
    SqliteConnector::open(&path, Duration::from_millis(50)).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE schema_version SET checksum = 'edited' WHERE migration_id = '002_reviews'",
        [],
    )
    .unwrap();
    drop(conn);

    let err = SqliteConnector::open(&path, Duration::from_millis(50)).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
}
