//! Integration tests for the SQLite driver
//!
//! These tests exercise the driver end to end against the real engine:
//! - Statement execution and row decoding
//! - Savepoints and transactions
//! - Synchronous and background backups

use rust_sqlite_driver::prelude::*;
use rust_sqlite_driver::{Backup, SavepointId, Table};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::TempDir;

/// Route driver logs to the test output; `RUST_LOG=debug` shows backup steps.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn file_connection(dir: &TempDir, name: &str) -> Connection {
    let path = dir.path().join(name);
    Connection::open(path.to_str().expect("utf-8 temp path")).expect("Failed to open")
}

fn populate(conn: &Connection, rows: usize) {
    conn.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, payload TEXT)")
        .expect("Failed to create table");
    conn.begin().expect("Failed to begin");
    for i in 0..rows {
        let payload = format!("{i:0>200}");
        conn.prepare("INSERT INTO items (payload) VALUES (?)", params![payload])
            .and_then(|mut stmt| stmt.all())
            .expect("Insert failed");
    }
    conn.commit().expect("Failed to commit");
}

fn count(conn: &Connection, table: &str) -> i64 {
    Table::new(table, "").rows(conn).expect("Count failed")
}

mod statements {
    use super::*;

    #[test]
    fn test_select_all_rows_in_order() {
        let conn = Connection::open(":memory:").expect("Failed to open");
        conn.execute("CREATE TABLE foo (number INTEGER, text VARCHAR(20))")
            .expect("Failed to create table");
        conn.execute("INSERT INTO foo VALUES (1, 'a')").expect("Insert failed");
        conn.execute("INSERT INTO foo VALUES (2, 'b')").expect("Insert failed");

        let mut rows = Vec::new();
        let n = conn
            .execute_with("SELECT * FROM foo", |_, row| {
                rows.push(row.to_vec());
                Ok(())
            })
            .expect("Select failed");

        assert_eq!(n, 2);
        assert_eq!(
            rows,
            vec![
                vec![Value::Int64(1), Value::Text("a".into())],
                vec![Value::Int64(2), Value::Text("b".into())],
            ]
        );
    }

    #[test]
    fn test_prepared_insert_reuse() {
        let conn = Connection::open(":memory:").expect("Failed to open");
        let table = Table::new("nums", "n INTEGER");
        table.create(&conn).expect("Failed to create table");

        let mut stmt = conn
            .prepare("INSERT INTO nums VALUES (?)", &[])
            .expect("Prepare failed");
        for i in 0..10 {
            stmt.bind(1, params![i]).expect("Bind failed");
            assert_eq!(stmt.step().expect("Step failed"), StepResult::Done);
        }
        stmt.finalize().expect("Finalize failed");

        assert_eq!(table.rows(&conn).expect("Count failed"), 10);
        assert_eq!(conn.last_insert_rowid(), 10);
        assert_eq!(conn.execute("SELECT * FROM nums").expect("Select failed"), 10);
    }

    #[test]
    fn test_opaque_value_roundtrip() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Settings {
            name: String,
            retries: u8,
        }

        let conn = Connection::open(":memory:").expect("Failed to open");
        conn.execute("CREATE TABLE blobs (data BLOB)").expect("Failed to create table");

        let settings = Settings {
            name: "primary".into(),
            retries: 3,
        };
        conn.prepare(
            "INSERT INTO blobs VALUES (?)",
            &[Value::opaque(Settings {
                name: "primary".into(),
                retries: 3,
            })],
        )
        .and_then(|mut stmt| stmt.all())
        .expect("Insert failed");

        let mut stmt = conn.prepare("SELECT data FROM blobs", &[]).expect("Prepare failed");
        assert_eq!(stmt.step().expect("Step failed"), StepResult::Row);
        let decoded: Settings = stmt
            .column(0)
            .and_then(|v| v.decode())
            .expect("Decode failed");
        assert_eq!(decoded, settings);
    }

    #[test]
    fn test_use_after_close_is_misuse() {
        let mut conn = Connection::open(":memory:").expect("Failed to open");
        conn.close();
        let err = conn.execute("SELECT 1").unwrap_err();
        assert_eq!(err.code(), StatusCode::Misuse);
    }
}

mod savepoints {
    use super::*;

    #[test]
    fn test_mark_then_merge() {
        let conn = Connection::open(":memory:").expect("Failed to open");
        assert!(conn.mark("x").is_ok());
        assert!(conn.merge_steps("x").is_ok());
        assert!(conn.savepoints().is_empty());
    }

    #[test]
    fn test_release_without_mark_surfaces_engine_error() {
        let conn = Connection::open(":memory:").expect("Failed to open");
        let err = conn.release("x").unwrap_err();
        assert_eq!(err.code(), StatusCode::Error);
        assert!(err.to_string().contains("no such savepoint"));
    }

    #[test]
    fn test_release_rolls_back_to_mark() {
        let conn = Connection::open(":memory:").expect("Failed to open");
        conn.execute("CREATE TABLE t (v INTEGER)").expect("Failed to create table");

        conn.begin().expect("Failed to begin");
        conn.execute("INSERT INTO t VALUES (1)").expect("Insert failed");
        conn.mark(SavepointId::from(42u64)).expect("Mark failed");
        conn.execute("INSERT INTO t VALUES (2)").expect("Insert failed");
        conn.release(42u64).expect("Release failed");
        assert_eq!(conn.savepoints(), vec!["42".to_string()]);
        conn.commit().expect("Commit failed");

        assert_eq!(count(&conn, "t"), 1);
    }
}

mod transactions {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open(":memory:").expect("Failed to open");
        conn.execute("CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance INTEGER)")
            .expect("Failed to create table");
        conn
    }

    fn insert(db: &Connection) -> TransactionStep {
        db.execute("INSERT INTO accounts (balance) VALUES (100)")
            .map(drop)
            .into()
    }

    #[test]
    fn test_commit_now_still_commits() {
        let conn = setup();
        Transaction::new()
            .then(insert)
            .then(|_: &Connection| TransactionStep::CommitNow)
            .then(insert)
            .execute(&conn)
            .expect("Transaction failed");
        assert_eq!(count(&conn, "accounts"), 1);
    }

    #[test]
    fn test_abort_rolls_back() {
        let conn = setup();
        let err = Transaction::new()
            .then(insert)
            .then(|db: &Connection| db.execute("INSERT INTO missing VALUES (1)").map(drop).into())
            .execute(&conn)
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Error);
        assert_eq!(count(&conn, "accounts"), 0);
    }
}

mod backups {
    use super::*;

    #[test]
    fn test_load_and_save_copy_rows() {
        let dir = TempDir::new().expect("tempdir");
        let source = file_connection(&dir, "source.db");
        populate(&source, 50);

        let loaded = Connection::open(":memory:").expect("Failed to open");
        loaded.load(&source, None).expect("Load failed");
        assert_eq!(count(&loaded, "items"), count(&source, "items"));

        let saved = file_connection(&dir, "saved.db");
        loaded.save(&saved, Some("main")).expect("Save failed");
        assert_eq!(count(&saved, "items"), 50);
    }

    #[test]
    fn test_full_backup_into_closed_connection_fails() {
        let source = Connection::open(":memory:").expect("Failed to open");
        let dest = Connection::transient();
        let err = Backup::new(&dest, "main", &source, "main").unwrap_err();
        assert_eq!(err.code(), StatusCode::Misuse);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_async_backup_reports_progress() {
        init_tracing();
        let dir = TempDir::new().expect("tempdir");
        let source = file_connection(&dir, "source.db");
        populate(&source, 2000);

        let target = dir.path().join("target.db");
        let params = BackupParameters::new(&target)
            .with_pages_per_step(10)
            .with_queue_length(2);
        let mut reporter = source.backup(params).expect("Backup failed to start");

        let mut reports = Vec::new();
        while let Some(report) = reporter.recv().await {
            reports.push(report);
        }

        assert!(reports.len() > 1, "expected several steps, got {}", reports.len());
        for pair in reports.windows(2) {
            assert!(pair[1].remaining <= pair[0].remaining);
        }
        let last = reports.last().expect("at least one report");
        assert!(last.is_done());
        assert_eq!(last.remaining, 0);
        assert!(reports[..reports.len() - 1].iter().all(|r| !r.is_terminal()));
        assert!(reporter.recv().await.is_none());

        let copy = Connection::open(target.to_str().expect("utf-8 temp path")).expect("Failed to open");
        assert_eq!(count(&copy, "items"), 2000);
    }

    #[test]
    fn test_backup_outside_runtime() {
        init_tracing();
        let dir = TempDir::new().expect("tempdir");
        let source = file_connection(&dir, "source.db");
        populate(&source, 20);

        let target = dir.path().join("target.db");
        let reporter = source
            .backup(BackupParameters::new(&target).with_pages_per_step(1).with_verbose(true))
            .expect("Backup failed to start");

        let statuses: Vec<StatusCode> = reporter.map(|report| report.status).collect();
        assert!(statuses.len() > 1);
        assert_eq!(statuses.last(), Some(&StatusCode::Done));

        let copy = Connection::open(target.to_str().expect("utf-8 temp path")).expect("Failed to open");
        assert_eq!(count(&copy, "items"), 20);
    }

    #[test]
    fn test_backup_into_missing_directory_fails_synchronously() {
        let dir = TempDir::new().expect("tempdir");
        let source = file_connection(&dir, "source.db");
        let target = Path::new("/nonexistent-dir/for/sure/target.db");
        let err = source.backup(BackupParameters::new(target)).unwrap_err();
        assert_eq!(err.code(), StatusCode::CantOpen);
    }
}
