use std::cell::RefCell;
use std::fs;
use std::path::Path;

use pgjsonl_lib::import::{ImportEngine, ImportLogger, NullLogger};
use pgjsonl_lib::memory::{FailurePoint, MemorySession};
use pgjsonl_lib::model::{
    ConnectionParams, ImportOptions, ImportRequest, InputSource, SkipColumns, TableResult,
};
use pgjsonl_lib::{ColumnSpec, PgJsonlError, Session, SqlType, Statement, Value};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, lines: &[&str]) {
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(dir.join(name), body).expect("write jsonl");
}

fn request(source: InputSource, options: ImportOptions) -> ImportRequest {
    ImportRequest::new(ConnectionParams::default(), source, options).expect("valid request")
}

fn dir_request(dir: &TempDir, options: ImportOptions) -> ImportRequest {
    request(InputSource::Directory(dir.path().to_path_buf()), options)
}

fn create_options() -> ImportOptions {
    ImportOptions {
        create_tables: true,
        ..Default::default()
    }
}

#[derive(Default)]
struct Recorder {
    events: RefCell<Vec<String>>,
}

impl ImportLogger for Recorder {
    fn table_started(&self, target: &pgjsonl_lib::TableTarget) {
        self.events.borrow_mut().push(format!("start {}", target.table));
    }

    fn table_finished(&self, result: &TableResult) {
        self.events
            .borrow_mut()
            .push(format!("finish {} {}", result.table, result.success));
    }

    fn warning(&self, message: &str) {
        self.events.borrow_mut().push(format!("warn {message}"));
    }
}

#[test]
fn users_file_creates_typed_table() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "users.jsonl",
        &[r#"{"id":1,"name":"A"}"#, r#"{"id":2,"name":"B"}"#],
    );

    let mut session = MemorySession::new();
    let report = ImportEngine::new(dir_request(&dir, create_options()), &NullLogger)
        .run(&mut session)
        .unwrap();

    assert!(report.success);
    assert_eq!(report.tables.len(), 1);
    let users = &report.tables[0];
    assert_eq!(users.table, "users");
    assert_eq!(users.rows_loaded, 2);
    assert!(users.created);

    let table = session.table("public", "users").unwrap();
    assert_eq!(
        table.columns,
        vec![
            ColumnSpec::new("id", SqlType::Integer),
            ColumnSpec::new("name", SqlType::Text),
        ]
    );
    assert_eq!(table.rows.len(), 2);
}

#[test]
fn clear_makes_reimport_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "items.jsonl",
        &[r#"{"id":1}"#, r#"{"id":2}"#, r#"{"id":3}"#],
    );
    let options = ImportOptions {
        create_tables: true,
        clear_before_load: true,
        ..Default::default()
    };

    let mut session = MemorySession::new();
    let engine = ImportEngine::new(dir_request(&dir, options), &NullLogger);
    for _ in 0..3 {
        let report = engine.run(&mut session).unwrap();
        assert!(report.success);
        assert_eq!(session.row_count("public", "items"), Some(3));
    }
}

#[test]
fn reimport_without_clear_doubles_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "items.jsonl", &[r#"{"id":1}"#, r#"{"id":2}"#]);

    let mut session = MemorySession::new();
    let engine = ImportEngine::new(dir_request(&dir, create_options()), &NullLogger);
    engine.run(&mut session).unwrap();
    let second = engine.run(&mut session).unwrap();

    assert!(second.success);
    assert!(!second.tables[0].created);
    assert_eq!(session.row_count("public", "items"), Some(4));
}

#[test]
fn skipped_columns_are_never_created_or_inserted() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "users.jsonl",
        &[
            r#"{"id":1,"name":"A","password":"x"}"#,
            r#"{"id":2,"name":"B","password":"y"}"#,
        ],
    );
    let options = ImportOptions {
        create_tables: true,
        skip_columns: SkipColumns::parse("users.password").unwrap(),
        ..Default::default()
    };

    let mut session = MemorySession::new();
    ImportEngine::new(dir_request(&dir, options), &NullLogger)
        .run(&mut session)
        .unwrap();

    let table = session.table("public", "users").unwrap();
    assert!(table.columns.iter().all(|c| c.name != "password"));
    for statement in session.statements() {
        if let Statement::Insert { columns, .. } = statement {
            assert!(!columns.iter().any(|c| c == "password"));
        }
    }
}

#[test]
fn skipped_tables_get_no_result_and_no_work() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "audit_log.jsonl", &[r#"{"id":1}"#]);
    write_file(dir.path(), "users.jsonl", &[r#"{"id":1}"#]);
    let options = ImportOptions {
        create_tables: true,
        clear_before_load: true,
        skip_tables: ["audit_log".to_string()].into_iter().collect(),
        ..Default::default()
    };

    let mut session = MemorySession::new();
    let report = ImportEngine::new(dir_request(&dir, options), &NullLogger)
        .run(&mut session)
        .unwrap();

    assert!(report.table("audit_log").is_none());
    assert!(report.table("users").is_some());
    assert!(!session.touched("audit_log"));
}

#[test]
fn decode_failure_is_isolated_to_its_table() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a_first.jsonl", &[r#"{"id":1}"#, r#"{"id":2}"#]);
    write_file(
        dir.path(),
        "b_second.jsonl",
        &[r#"{"id":1}"#, r#"{"id":2"#, r#"{"id":3}"#],
    );
    write_file(
        dir.path(),
        "c_third.jsonl",
        &[r#"{"id":1}"#, r#"{"id":2}"#, r#"{"id":3}"#, r#"{"id":4}"#],
    );

    let logger = Recorder::default();
    let mut session = MemorySession::new();
    let report = ImportEngine::new(dir_request(&dir, create_options()), &logger)
        .run(&mut session)
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.tables.len(), 3);
    assert_eq!(report.failed_tables().count(), 1);

    let second = report.table("b_second").unwrap();
    assert!(!second.success);
    assert_eq!(second.rows_loaded, 0);
    assert!(second.error.as_deref().unwrap().contains("line 2"));

    let third = report.table("c_third").unwrap();
    assert!(third.success);
    assert_eq!(third.rows_loaded, 4);

    // The failed table rolled back, so nothing it created survives.
    assert!(session.table("public", "b_second").is_none());
    assert_eq!(
        *logger.events.borrow(),
        vec![
            "start a_first",
            "finish a_first true",
            "start b_second",
            "finish b_second false",
            "start c_third",
            "finish c_third true",
        ]
    );
}

#[test]
fn insert_failure_rolls_back_the_clear() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "items.jsonl", &[r#"{"id":"oops"}"#]);

    let mut session = MemorySession::new();
    session.create_table("public", "items", vec![ColumnSpec::new("id", SqlType::Integer)]);
    session
        .execute(&Statement::Insert {
            schema: "public".into(),
            table: "items".into(),
            columns: vec!["id".into()],
            rows: vec![vec![Value::Integer(7)]],
        })
        .unwrap();

    let options = ImportOptions {
        clear_before_load: true,
        ..Default::default()
    };
    let report = ImportEngine::new(dir_request(&dir, options), &NullLogger)
        .run(&mut session)
        .unwrap();

    let items = report.table("items").unwrap();
    assert!(!items.success);
    assert_eq!(items.rows_attempted, 1);
    assert_eq!(items.rows_loaded, 0);
    assert!(items.error.as_deref().unwrap().starts_with("Load error"));
    assert_eq!(session.row_count("public", "items"), Some(1));
    assert!(!session.in_transaction());
}

#[test]
fn fraction_after_integral_sample_fails_instead_of_rounding() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "measures.jsonl", &[r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":2.5}"#]);

    let options = ImportOptions {
        create_tables: true,
        sample_size: 2,
        ..Default::default()
    };
    let mut session = MemorySession::new();
    let report = ImportEngine::new(dir_request(&dir, options), &NullLogger)
        .run(&mut session)
        .unwrap();

    let measures = report.table("measures").unwrap();
    assert!(!measures.success);
    assert_eq!(measures.rows_loaded, 0);
    assert!(session.table("public", "measures").is_none());

    let insert_sql = session
        .statements()
        .iter()
        .find(|s| matches!(s, Statement::Insert { .. }))
        .map(Statement::to_sql)
        .unwrap();
    assert!(insert_sql.ends_with("(1), (2), ('2.5')"), "{insert_sql}");
}

#[test]
fn foreign_keys_are_suspended_for_out_of_order_files() {
    let dir = tempfile::tempdir().unwrap();
    // "orders" sorts before "users", so children load before parents.
    write_file(dir.path(), "orders.jsonl", &[r#"{"id":10,"user_id":1}"#]);
    write_file(dir.path(), "users.jsonl", &[r#"{"id":1}"#]);

    let build_session = || {
        let mut session = MemorySession::new();
        session.create_table("public", "users", vec![ColumnSpec::new("id", SqlType::Integer)]);
        session.create_table(
            "public",
            "orders",
            vec![
                ColumnSpec::new("id", SqlType::Integer),
                ColumnSpec::new("user_id", SqlType::Integer),
            ],
        );
        session.add_foreign_key("public", "orders", "user_id", "users", "id");
        session
    };

    let mut strict = build_session();
    let report = ImportEngine::new(dir_request(&dir, ImportOptions::default()), &NullLogger)
        .run(&mut strict)
        .unwrap();
    assert!(!report.table("orders").unwrap().success);
    assert!(report.table("users").unwrap().success);

    let options = ImportOptions {
        disable_foreign_keys: true,
        ..Default::default()
    };
    let mut relaxed = build_session();
    let report = ImportEngine::new(dir_request(&dir, options), &NullLogger)
        .run(&mut relaxed)
        .unwrap();
    assert!(report.success);
    assert!(relaxed.foreign_key_checks_enabled());
    assert_eq!(
        relaxed.statements().first(),
        Some(&Statement::SetForeignKeyChecks(false))
    );
    assert_eq!(
        relaxed.statements().last(),
        Some(&Statement::SetForeignKeyChecks(true))
    );
}

#[test]
fn foreign_keys_are_restored_when_tables_fail() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "broken.jsonl", &["not json"]);
    write_file(dir.path(), "fine.jsonl", &[r#"{"id":1}"#]);
    let options = ImportOptions {
        create_tables: true,
        disable_foreign_keys: true,
        ..Default::default()
    };

    let mut session = MemorySession::new();
    let report = ImportEngine::new(dir_request(&dir, options), &NullLogger)
        .run(&mut session)
        .unwrap();

    assert!(!report.success);
    assert!(report.warnings.is_empty());
    assert!(session.foreign_key_checks_enabled());
    let toggles = session
        .statements()
        .iter()
        .filter(|s| matches!(s, Statement::SetForeignKeyChecks(_)))
        .count();
    assert_eq!(toggles, 2);
}

#[test]
fn suspend_failure_aborts_before_any_table() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "users.jsonl", &[r#"{"id":1}"#]);
    let options = ImportOptions {
        create_tables: true,
        disable_foreign_keys: true,
        ..Default::default()
    };

    let mut session = MemorySession::new();
    session.fail_at(FailurePoint::SuspendForeignKeys);
    let err = ImportEngine::new(dir_request(&dir, options), &NullLogger)
        .run(&mut session)
        .unwrap_err();

    assert!(matches!(err, PgJsonlError::Constraint(_)));
    assert!(!session.touched("users"));
}

#[test]
fn restore_failure_becomes_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "users.jsonl", &[r#"{"id":1}"#]);
    let options = ImportOptions {
        create_tables: true,
        disable_foreign_keys: true,
        ..Default::default()
    };

    let logger = Recorder::default();
    let mut session = MemorySession::new();
    session.fail_at(FailurePoint::RestoreForeignKeys);
    let report = ImportEngine::new(dir_request(&dir, options), &logger)
        .run(&mut session)
        .unwrap();

    assert!(report.success);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("restore foreign-key checks"));
    assert!(
        logger
            .events
            .borrow()
            .iter()
            .any(|e| e.starts_with("warn "))
    );
}

#[test]
fn schema_failure_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "alpha.jsonl", &[r#"{"id":1}"#]);
    write_file(dir.path(), "beta.jsonl", &[r#"{"id":1}"#]);

    let mut session = MemorySession::new();
    session.fail_at(FailurePoint::CreateTable("alpha".into()));
    let report = ImportEngine::new(dir_request(&dir, create_options()), &NullLogger)
        .run(&mut session)
        .unwrap();

    let alpha = report.table("alpha").unwrap();
    assert!(!alpha.success);
    assert!(alpha.error.as_deref().unwrap().starts_with("Schema error"));
    assert!(report.table("beta").unwrap().success);
}

#[test]
fn empty_file_succeeds_without_creating_a_table() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("empty.jsonl"), "\n\n").unwrap();

    let mut session = MemorySession::new();
    let report = ImportEngine::new(dir_request(&dir, create_options()), &NullLogger)
        .run(&mut session)
        .unwrap();

    assert!(report.success);
    assert_eq!(report.tables[0].rows_loaded, 0);
    assert!(session.table("public", "empty").is_none());
}

#[test]
fn single_file_mode_imports_only_that_file() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "users.jsonl", &[r#"{"id":1}"#]);
    write_file(dir.path(), "orders.jsonl", &[r#"{"id":1}"#]);

    let mut session = MemorySession::new();
    let report = ImportEngine::new(
        request(
            InputSource::File(dir.path().join("orders.jsonl")),
            create_options(),
        ),
        &NullLogger,
    )
    .run(&mut session)
    .unwrap();

    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].table, "orders");
    assert!(!session.touched("users"));
}

#[test]
fn large_files_are_loaded_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..1234).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    write_file(dir.path(), "numbers.jsonl", &refs);
    let options = ImportOptions {
        create_tables: true,
        batch_size: 500,
        ..Default::default()
    };

    let mut session = MemorySession::new();
    let report = ImportEngine::new(dir_request(&dir, options), &NullLogger)
        .run(&mut session)
        .unwrap();

    assert_eq!(report.tables[0].rows_loaded, 1234);
    let inserts = session
        .statements()
        .iter()
        .filter(|s| matches!(s, Statement::Insert { .. }))
        .count();
    assert_eq!(inserts, 3);
}

#[test]
fn missing_input_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = MemorySession::new();
    let err = ImportEngine::new(
        request(
            InputSource::Directory(dir.path().join("nope")),
            ImportOptions::default(),
        ),
        &NullLogger,
    )
    .run(&mut session)
    .unwrap_err();
    assert!(matches!(err, PgJsonlError::FileNotFound(_)));
    assert!(session.statements().is_empty());
}
