// crates/strata-core/tests/dataset_runtime.rs
// ============================================================================
// Module: Dataset Runtime Tests
// Description: Declaration, authorization, and execution against a mock store.
// Purpose: Prove the runtime's store interaction contract call by call.
// Dependencies: strata-core
// ============================================================================
//! ## Overview
//! Uses a counting in-memory store so tests can assert which store calls the
//! runtime makes. Rejected calls (authorization, input validation) must make
//! none at all.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use common::CountingStore;
use common::OWNER;
use common::action;
use common::fixture_id;
use common::posts_table;
use strata_core::Dataset;
use strata_core::DatasetInfo;
use strata_core::EngineError;
use strata_core::EngineLimits;
use strata_core::Inputs;
use strata_core::RelationalStore;
use strata_core::Savepoint;
use strata_core::StoreError;
use strata_core::TxContext;
use strata_core::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_dataset(store: &CountingStore, limits: EngineLimits) -> Dataset<CountingStore> {
    let info = DatasetInfo {
        id: fixture_id(),
        name: "blog".to_string(),
        owner: OWNER.to_string(),
    };
    Dataset::open(info, store.clone(), limits).expect("open dataset")
}

fn dataset_with_private_action(store: &CountingStore) -> Dataset<CountingStore> {
    let mut dataset = open_dataset(store, EngineLimits::default());
    dataset
        .create_action(&action(
            "add_post",
            false,
            &["$title"],
            &["INSERT INTO posts (title) VALUES ($title)", "SELECT @caller, @action, @dataset"],
        ))
        .expect("create action");
    dataset
}

fn title(value: &str) -> Inputs {
    Inputs::from([("$title".to_string(), Value::from(value))])
}

// ============================================================================
// SECTION: Access Control
// ============================================================================

/// Verifies private actions reject non-owners without touching the store.
#[test]
fn unauthorized_calls_perform_zero_store_operations() {
    let store = CountingStore::default();
    let mut dataset = dataset_with_private_action(&store);
    let before = store.operations();

    let stranger = TxContext::new("0xstranger");
    let err = dataset.execute(&stranger, "add_post", &title("hi")).unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)), "{err:?}");

    let err = dataset.execute(&TxContext::anonymous(), "add_post", &title("hi")).unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)), "{err:?}");

    let err = dataset.batch_execute(&stranger, "add_post", &[title("a"), title("b")]).unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)), "{err:?}");

    assert_eq!(store.operations(), before);
}

/// Verifies unknown actions and bad inputs are rejected before store access.
#[test]
fn lookup_and_input_failures_perform_zero_store_operations() {
    let store = CountingStore::default();
    let mut dataset = dataset_with_private_action(&store);
    let owner = TxContext::new(OWNER);
    let before = store.operations();

    let err = dataset.execute(&owner, "missing", &Inputs::new()).unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)), "{err:?}");

    let err = dataset.execute(&owner, "add_post", &Inputs::new()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)), "{err:?}");

    let mut unknown = title("hi");
    unknown.insert("body".to_string(), Value::from("text"));
    let err = dataset.execute(&owner, "add_post", &unknown).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)), "{err:?}");

    let mut reserved = title("hi");
    reserved.insert("caller".to_string(), Value::from("0xforged"));
    let err = dataset.execute(&owner, "add_post", &reserved).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)), "{err:?}");

    let mut doubled = title("hi");
    doubled.insert("title".to_string(), Value::from("again"));
    let err = dataset.execute(&owner, "add_post", &doubled).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)), "{err:?}");

    let err = dataset.batch_execute(&owner, "add_post", &[title("ok"), Inputs::new()]).unwrap_err();
    match err {
        EngineError::InvalidInput(message) => assert!(message.contains("record 1"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }

    assert_eq!(store.operations(), before);
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Verifies owners run private actions with contextual variables bound.
#[test]
fn owner_execution_binds_inputs_and_context() {
    let store = CountingStore::default();
    let mut dataset = dataset_with_private_action(&store);
    let releases = store.state.borrow().releases;

    let result = dataset.execute(&TxContext::new(OWNER), "ADD_POST", &title("hello")).unwrap();
    assert_eq!(result.value(0, "statement"), Some(&Value::Int(2)));

    let state = store.state.borrow();
    assert_eq!(state.releases, releases + 1);
    assert_eq!(state.runs.len(), 2);
    let args = &state.runs[0];
    assert_eq!(args.get("$title"), Some(&Value::from("hello")));
    assert_eq!(args.get("@caller"), Some(&Value::from(OWNER)));
    assert_eq!(args.get("@action"), Some(&Value::from("add_post")));
    assert_eq!(args.get("@dataset"), Some(&Value::from(fixture_id().as_str())));
}

/// Verifies anonymous callers of public actions see a null caller.
#[test]
fn public_action_accepts_anonymous_callers() {
    let store = CountingStore::default();
    let mut dataset = open_dataset(&store, EngineLimits::default());
    dataset.create_action(&action("whoami", true, &[], &["SELECT @caller"])).unwrap();

    dataset.execute(&TxContext::anonymous(), "whoami", &Inputs::new()).unwrap();
    dataset.execute(&TxContext::new("0xguest"), "whoami", &Inputs::new()).unwrap();

    let state = store.state.borrow();
    assert_eq!(state.runs[0].get("@caller"), Some(&Value::Null));
    assert_eq!(state.runs[1].get("@caller"), Some(&Value::from("0xguest")));
}

/// Verifies a failing statement rolls back and reports its index.
#[test]
fn failing_statement_rolls_back_with_statement_index() {
    let store = CountingStore::default();
    let mut dataset = dataset_with_private_action(&store);
    store.state.borrow_mut().fail_run_on = Some(2);
    let rollbacks = store.state.borrow().rollbacks;

    let err = dataset.execute(&TxContext::new(OWNER), "add_post", &title("x")).unwrap_err();
    match err {
        EngineError::ExecutionFailed {
            action,
            statement_index,
            ..
        } => {
            assert_eq!(action, "add_post");
            assert_eq!(statement_index, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
    let state = store.state.borrow();
    assert_eq!(state.rollbacks, rollbacks + 1);
    assert!(!state.savepoint_open);
}

/// Verifies batches run every record inside one savepoint.
#[test]
fn batch_runs_all_records_in_one_savepoint() {
    let store = CountingStore::default();
    let limits = EngineLimits {
        max_batch_records: 3,
        ..EngineLimits::default()
    };
    let mut dataset = open_dataset(&store, limits);
    dataset
        .create_action(&action("add", true, &["title"], &["INSERT INTO posts (title) VALUES ($title)"]))
        .unwrap();
    let releases = store.state.borrow().releases;

    let owner = TxContext::new(OWNER);
    dataset.batch_execute(&owner, "add", &[title("a"), title("b"), title("c")]).unwrap();
    {
        let state = store.state.borrow();
        assert_eq!(state.releases, releases + 1);
        let titles: Vec<_> = state.runs.iter().map(|args| args.get("$title").cloned()).collect();
        assert_eq!(titles, vec![
            Some(Value::from("a")),
            Some(Value::from("b")),
            Some(Value::from("c"))
        ]);
    }

    let err = dataset.batch_execute(&owner, "add", &[]).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)), "{err:?}");
    let oversized = vec![title("x"); 4];
    let err = dataset.batch_execute(&owner, "add", &oversized).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)), "{err:?}");
}

// ============================================================================
// SECTION: Declarations
// ============================================================================

/// Verifies DDL and metadata are written inside one committed savepoint.
#[test]
fn create_table_applies_ddl_and_metadata_together() {
    let store = CountingStore::default();
    let mut dataset = open_dataset(&store, EngineLimits::default());
    let releases = store.state.borrow().releases;

    dataset.create_table(&posts_table()).unwrap();
    {
        let state = store.state.borrow();
        assert_eq!(state.releases, releases + 1);
        assert!(state.tables.contains("posts"));
        assert!(state.executed.iter().any(|text| text.starts_with("INSERT INTO \"_metadata\"")));
    }
    assert_eq!(dataset.list_tables(), vec![posts_table().normalize().unwrap()]);
    assert!(dataset.table_exists("POSTS").unwrap());

    let err = dataset.create_table(&posts_table()).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists(_)), "{err:?}");
}

/// Verifies undeclared parameters are rejected and their handles closed.
#[test]
fn create_action_rejects_undeclared_parameters() {
    let store = CountingStore::default();
    let mut dataset = open_dataset(&store, EngineLimits::default());

    for statement in ["SELECT $missing", "SELECT @nobody", "SELECT ?", "SYNTAX ERROR"] {
        let err = dataset
            .create_action(&action("lookup", true, &["known"], &["SELECT $known", statement]))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDeclaration(_)), "{statement}: {err:?}");
        assert!(store.state.borrow().open_statements.is_empty(), "{statement}");
    }
    assert!(dataset.list_actions().is_empty());
}

/// Verifies statements that could end the execution savepoint are rejected
/// before any store call.
#[test]
fn create_action_rejects_transaction_control() {
    let store = CountingStore::default();
    let mut dataset = open_dataset(&store, EngineLimits::default());
    let operations = store.operations();

    for statement in ["RELEASE strata_sp", "  savepoint s", "/* c */ COMMIT", "-- c\nBEGIN", "PRAGMA x"] {
        let err = dataset
            .create_action(&action("escape", true, &[], &["SELECT 1", statement]))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDeclaration(_)), "{statement}: {err:?}");
    }
    assert_eq!(store.operations(), operations);

    dataset
        .create_action(&action("read", true, &[], &["  -- lead\n with t AS (SELECT 1) SELECT * FROM t"]))
        .unwrap();
}

/// Verifies inputs may not shadow reserved variables and names are unique.
#[test]
fn create_action_enforces_names() {
    let store = CountingStore::default();
    let mut dataset = open_dataset(&store, EngineLimits::default());

    let err = dataset.create_action(&action("spoof", true, &["$caller"], &["SELECT 1"])).unwrap_err();
    assert!(matches!(err, EngineError::InvalidDeclaration(_)), "{err:?}");

    dataset.create_action(&action("ping", true, &[], &["SELECT 1"])).unwrap();
    let err = dataset.create_action(&action("PING", true, &[], &["SELECT 2"])).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists(_)), "{err:?}");

    let err = dataset.create_action(&action("empty", true, &[], &[])).unwrap_err();
    assert!(matches!(err, EngineError::InvalidDeclaration(_)), "{err:?}");

    let too_many = vec!["SELECT 1"; 65];
    let err = dataset.create_action(&action("long", true, &[], &too_many)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidDeclaration(_)), "{err:?}");

    assert_eq!(dataset.list_actions().len(), 1);
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

/// Verifies close releases statements, is idempotent, and blocks later use.
#[test]
fn close_is_idempotent_and_final() {
    let store = CountingStore::default();
    let mut dataset = dataset_with_private_action(&store);

    dataset.close().unwrap();
    dataset.close().unwrap();
    assert!(dataset.is_closed());
    {
        let state = store.state.borrow();
        assert!(state.closed);
        assert!(state.open_statements.is_empty());
    }

    let err = dataset.execute(&TxContext::new(OWNER), "add_post", &title("x")).unwrap_err();
    assert!(matches!(err, EngineError::Closed(_)), "{err:?}");
    let err = dataset.create_table(&posts_table()).unwrap_err();
    assert!(matches!(err, EngineError::Closed(_)), "{err:?}");
}

/// Verifies the savepoint guard enforces one savepoint and rolls back on drop.
#[test]
fn savepoint_guard_rolls_back_on_drop() {
    let mut store = CountingStore::default();
    let observer = store.clone();
    {
        let mut savepoint = Savepoint::begin(&mut store).unwrap();
        let err = savepoint.store().begin_savepoint().unwrap_err();
        assert_eq!(err, StoreError::SavepointActive);
    }
    assert_eq!(observer.state.borrow().rollbacks, 1);

    Savepoint::begin(&mut store).unwrap().commit().unwrap();
    assert_eq!(observer.state.borrow().releases, 1);
    assert!(!observer.state.borrow().savepoint_open);
}
