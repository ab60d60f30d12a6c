// crates/strata-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Behavior of a single SQLite-backed relational store.
// Purpose: Validate path safety, layout versioning, binding, savepoints, and
//          error mapping.
// ============================================================================

//! ## Overview
//! Unit-level tests for [`SqliteStore`]:
//! - Path safety checks (component/directory rejection)
//! - Layout version stamping and rejection
//! - Parameter discovery and named binding
//! - Savepoint lifecycle and rollback
//! - Constraint, read-only, and value-type error mapping

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use proptest::prelude::*;
use rusqlite::Connection;
use strata_core::NamedArgs;
use strata_core::RelationalStore;
use strata_core::StoreError;
use strata_core::Value;
use strata_store_sqlite::SqliteStore;
use strata_store_sqlite::SqliteStoreConfig;
use strata_store_sqlite::SqliteStoreError;
use strata_store_sqlite::SqliteStoreMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_store(dir: &TempDir) -> SqliteStore {
    let config = common::config_in(dir.path());
    SqliteStore::open(&dir.path().join("store.sqlite"), &config).unwrap()
}

fn args(pairs: &[(&str, Value)]) -> NamedArgs {
    pairs.iter().map(|(name, value)| ((*name).to_string(), value.clone())).collect()
}

fn count(store: &mut SqliteStore, table: &str) -> Value {
    let rows = store.query(&format!("SELECT COUNT(*) AS n FROM {table}"), &NamedArgs::new()).unwrap();
    rows.value(0, "n").cloned().unwrap()
}

// ============================================================================
// SECTION: Opening
// ============================================================================

#[test]
fn open_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("store.sqlite");
    let store = SqliteStore::open(&path, &SqliteStoreConfig::new(dir.path())).unwrap();
    assert_eq!(store.path(), path.as_path());
    assert!(path.exists());
}

#[test]
fn open_rejects_directory_path() {
    let dir = TempDir::new().unwrap();
    let err = SqliteStore::open(dir.path(), &SqliteStoreConfig::new(dir.path())).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn open_rejects_overlong_component() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a".repeat(300));
    let err = SqliteStore::open(&path, &SqliteStoreConfig::new(dir.path())).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn open_rejects_unknown_layout_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.sqlite");
    let mut store = SqliteStore::open(&path, &SqliteStoreConfig::new(dir.path())).unwrap();
    store.close().unwrap();

    let raw = Connection::open(&path).unwrap();
    raw.execute_batch("PRAGMA user_version = 7;").unwrap();
    drop(raw);

    let err = SqliteStore::open(&path, &SqliteStoreConfig::new(dir.path())).unwrap_err();
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn delete_journal_mode_opens() {
    let dir = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::new(dir.path());
    config.journal_mode = SqliteStoreMode::Delete;
    let mut store = SqliteStore::open(&dir.path().join("store.sqlite"), &config).unwrap();
    store.execute("CREATE TABLE t (v INTEGER)", &NamedArgs::new()).unwrap();
    assert!(store.table_exists("t").unwrap());
}

// ============================================================================
// SECTION: Statements
// ============================================================================

#[test]
fn prepare_reports_named_parameters_once() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let handle = store.prepare("  SELECT $a AS a, @caller AS c, $a AS again  ").unwrap();
    assert_eq!(handle.parameters(), ["$a".to_string(), "@caller".to_string()]);
    assert_eq!(handle.text(), "SELECT $a AS a, @caller AS c, $a AS again");
}

#[test]
fn prepare_rejects_invalid_sql() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let err = store.prepare("SELEC nothing").unwrap_err();
    assert!(matches!(err, StoreError::Db(_)));
}

#[test]
fn positional_parameters_are_reported_and_refused() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let handle = store.prepare("SELECT ? AS v").unwrap();
    assert_eq!(handle.parameters(), ["?1".to_string()]);
    let err = store.run(&handle, &NamedArgs::new()).unwrap_err();
    assert!(matches!(err, StoreError::Unsupported(_)));
}

#[test]
fn run_binds_by_name_and_ignores_extra_arguments() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let handle = store.prepare("SELECT $a AS a, @caller AS c").unwrap();
    let result = store
        .run(
            &handle,
            &args(&[
                ("$a", Value::Int(7)),
                ("@caller", Value::Null),
                ("@dataset", Value::Text("unused".to_string())),
            ]),
        )
        .unwrap();
    assert_eq!(result.columns, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(result.rows, vec![vec![Value::Int(7), Value::Null]]);
}

#[test]
fn run_fails_for_missing_argument() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let handle = store.prepare("SELECT $a AS a").unwrap();
    assert!(store.run(&handle, &NamedArgs::new()).is_err());
}

#[test]
fn closed_statement_cannot_run() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let handle = store.prepare("SELECT 1 AS one").unwrap();
    store.close_statement(&handle).unwrap();
    assert_eq!(store.run(&handle, &NamedArgs::new()), Err(StoreError::StatementClosed(handle.id())));
    assert_eq!(store.close_statement(&handle), Err(StoreError::StatementClosed(handle.id())));
}

#[test]
fn floating_point_results_are_unsupported() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let err = store.query("SELECT 1.5 AS r", &NamedArgs::new()).unwrap_err();
    assert!(matches!(err, StoreError::Unsupported(_)));
}

#[test]
fn query_rejects_writing_statements() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.execute("CREATE TABLE t (v INTEGER)", &NamedArgs::new()).unwrap();
    let err = store.query("INSERT INTO t (v) VALUES (1)", &NamedArgs::new()).unwrap_err();
    assert!(matches!(err, StoreError::ReadOnly(_)));
    assert_eq!(count(&mut store, "t"), Value::Int(0));
}

#[test]
fn unique_violation_maps_to_constraint() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.execute("CREATE TABLE u (v INTEGER UNIQUE)", &NamedArgs::new()).unwrap();
    let insert = args(&[("$v", Value::Int(1))]);
    store.execute("INSERT INTO u (v) VALUES ($v)", &insert).unwrap();
    let err = store.execute("INSERT INTO u (v) VALUES ($v)", &insert).unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
}

#[test]
fn table_exists_reads_catalog() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    assert!(!store.table_exists("t").unwrap());
    store.execute("CREATE TABLE t (v INTEGER)", &NamedArgs::new()).unwrap();
    assert!(store.table_exists("t").unwrap());
}

// ============================================================================
// SECTION: Savepoints
// ============================================================================

#[test]
fn savepoint_rollback_discards_writes() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.execute("CREATE TABLE t (v INTEGER)", &NamedArgs::new()).unwrap();
    store.begin_savepoint().unwrap();
    store.execute("INSERT INTO t (v) VALUES (1)", &NamedArgs::new()).unwrap();
    store.execute("CREATE TABLE extra (v INTEGER)", &NamedArgs::new()).unwrap();
    store.rollback_savepoint().unwrap();
    assert_eq!(count(&mut store, "t"), Value::Int(0));
    assert!(!store.table_exists("extra").unwrap());
}

#[test]
fn savepoint_release_commits_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.sqlite");
    let config = common::config_in(dir.path());
    let mut store = SqliteStore::open(&path, &config).unwrap();
    store.execute("CREATE TABLE t (v INTEGER)", &NamedArgs::new()).unwrap();
    store.begin_savepoint().unwrap();
    store.execute("INSERT INTO t (v) VALUES (1)", &NamedArgs::new()).unwrap();
    store.release_savepoint().unwrap();
    store.close().unwrap();

    let mut reopened = SqliteStore::open(&path, &config).unwrap();
    assert_eq!(count(&mut reopened, "t"), Value::Int(1));
}

#[test]
fn savepoint_is_single_level() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    assert_eq!(store.release_savepoint(), Err(StoreError::NoSavepoint));
    assert_eq!(store.rollback_savepoint(), Err(StoreError::NoSavepoint));
    store.begin_savepoint().unwrap();
    assert_eq!(store.begin_savepoint(), Err(StoreError::SavepointActive));
    store.release_savepoint().unwrap();
    store.begin_savepoint().unwrap();
    store.rollback_savepoint().unwrap();
}

#[test]
fn statement_releasing_the_savepoint_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.begin_savepoint().unwrap();
    let handle = store.prepare("RELEASE strata_sp").unwrap();
    let err = store.run(&handle, &NamedArgs::new()).unwrap_err();
    assert!(matches!(err, StoreError::Db(_)), "{err:?}");
    assert_eq!(store.release_savepoint(), Err(StoreError::NoSavepoint));
    store.begin_savepoint().unwrap();
    store.rollback_savepoint().unwrap();
}

// ============================================================================
// SECTION: Closing
// ============================================================================

#[test]
fn close_is_idempotent_and_final() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store.close().unwrap();
    store.close().unwrap();
    assert_eq!(store.prepare("SELECT 1").unwrap_err(), StoreError::Closed);
    assert_eq!(store.begin_savepoint(), Err(StoreError::Closed));
}

// ============================================================================
// SECTION: Property Tests
// ============================================================================

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::Int),
        "[a-zA-Z0-9 _]{0,32}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 1 .. 32).prop_map(Value::Blob),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bound_values_are_returned_unchanged(value in value_strategy()) {
        let dir = TempDir::new().unwrap();
        let mut store = SqliteStore::open(
            &dir.path().join("store.sqlite"),
            &SqliteStoreConfig::new(dir.path()),
        )
        .unwrap();
        let result = store.query("SELECT $v AS v", &args(&[("$v", value.clone())])).unwrap();
        prop_assert_eq!(result.rows, vec![vec![value]]);
    }
}
