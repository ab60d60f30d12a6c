// crates/strata-core/tests/common/mod.rs
// =============================================================================
// Module: Core Test Helpers
// Description: Counting in-memory relational store for runtime tests.
// Purpose: Observe exactly which store operations the runtime performs.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::rc::Rc;

use strata_core::Action;
use strata_core::Attribute;
use strata_core::Column;
use strata_core::DataType;
use strata_core::DatasetId;
use strata_core::NamedArgs;
use strata_core::RelationalStore;
use strata_core::ResultSet;
use strata_core::StatementHandle;
use strata_core::StoreError;
use strata_core::StoreProvider;
use strata_core::Table;
use strata_core::Value;

// ============================================================================
// SECTION: Counting Store
// ============================================================================

/// Observable state shared between a test and its store.
#[derive(Debug, Default)]
pub struct MockState {
    /// Number of store calls of any kind.
    pub operations: usize,
    /// Tables created through `CREATE TABLE`.
    pub tables: BTreeSet<String>,
    /// Texts passed to `execute`.
    pub executed: Vec<String>,
    /// Arguments passed to `run`, in call order.
    pub runs: Vec<NamedArgs>,
    /// Open statement identifiers.
    pub open_statements: BTreeSet<u64>,
    /// True while a savepoint is open.
    pub savepoint_open: bool,
    /// Released savepoints.
    pub releases: usize,
    /// Rolled back savepoints.
    pub rollbacks: usize,
    /// Statement identifier whose `run` fails.
    pub fail_run_on: Option<u64>,
    /// When set, `release_savepoint` fails and leaves the savepoint open.
    pub fail_release: bool,
    /// Next statement identifier.
    pub next_id: u64,
    /// True once closed.
    pub closed: bool,
}

/// In-memory store that records every call.
#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    /// Shared state.
    pub state: Rc<RefCell<MockState>>,
}

impl CountingStore {
    /// Returns the operation count.
    pub fn operations(&self) -> usize {
        self.state.borrow().operations
    }

    /// Records one operation, failing when closed.
    fn touch(&self) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state.operations += 1;
        if state.closed { Err(StoreError::Closed) } else { Ok(()) }
    }
}

/// Extracts `$name`, `@name`, and `?` parameters in first-occurrence order.
fn scan_parameters(text: &str) -> Vec<String> {
    let mut parameters: Vec<String> = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        if ch == '?' {
            parameters.push("?".to_string());
        }
        if ch == '$' || ch == '@' {
            let mut end = index + 1;
            while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            let parameter: String = chars[index .. end].iter().collect();
            if end > index + 1 && !parameters.contains(&parameter) {
                parameters.push(parameter);
            }
            index = end;
            continue;
        }
        index += 1;
    }
    parameters
}

impl RelationalStore for CountingStore {
    fn prepare(&mut self, text: &str) -> Result<StatementHandle, StoreError> {
        self.touch()?;
        if text.contains("SYNTAX ERROR") {
            return Err(StoreError::Db("near SYNTAX: syntax error".to_string()));
        }
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.open_statements.insert(id);
        Ok(StatementHandle::new(id, text.to_string(), scan_parameters(text)))
    }

    fn run(&mut self, handle: &StatementHandle, args: &NamedArgs) -> Result<ResultSet, StoreError> {
        self.touch()?;
        let mut state = self.state.borrow_mut();
        if !state.open_statements.contains(&handle.id()) {
            return Err(StoreError::StatementClosed(handle.id()));
        }
        if state.fail_run_on == Some(handle.id()) {
            return Err(StoreError::Constraint("UNIQUE constraint failed".to_string()));
        }
        state.runs.push(args.clone());
        let id = i64::try_from(handle.id()).unwrap_or(i64::MAX);
        Ok(ResultSet {
            columns: vec!["statement".to_string()],
            rows: vec![vec![Value::Int(id)]],
        })
    }

    fn close_statement(&mut self, handle: &StatementHandle) -> Result<(), StoreError> {
        self.touch()?;
        if self.state.borrow_mut().open_statements.remove(&handle.id()) {
            Ok(())
        } else {
            Err(StoreError::StatementClosed(handle.id()))
        }
    }

    fn execute(&mut self, text: &str, _args: &NamedArgs) -> Result<(), StoreError> {
        self.touch()?;
        let mut state = self.state.borrow_mut();
        if let Some(rest) = text.strip_prefix("CREATE TABLE \"")
            && let Some((name, _)) = rest.split_once('"')
        {
            state.tables.insert(name.to_string());
        }
        state.executed.push(text.to_string());
        Ok(())
    }

    fn query(&mut self, _text: &str, _args: &NamedArgs) -> Result<ResultSet, StoreError> {
        self.touch()?;
        Ok(ResultSet::default())
    }

    fn begin_savepoint(&mut self) -> Result<(), StoreError> {
        self.touch()?;
        let mut state = self.state.borrow_mut();
        if state.savepoint_open {
            return Err(StoreError::SavepointActive);
        }
        state.savepoint_open = true;
        Ok(())
    }

    fn release_savepoint(&mut self) -> Result<(), StoreError> {
        self.touch()?;
        let mut state = self.state.borrow_mut();
        if !state.savepoint_open {
            return Err(StoreError::NoSavepoint);
        }
        if state.fail_release {
            return Err(StoreError::Io("disk full".to_string()));
        }
        state.savepoint_open = false;
        state.releases += 1;
        Ok(())
    }

    fn rollback_savepoint(&mut self) -> Result<(), StoreError> {
        self.touch()?;
        let mut state = self.state.borrow_mut();
        if !state.savepoint_open {
            return Err(StoreError::NoSavepoint);
        }
        state.savepoint_open = false;
        state.rollbacks += 1;
        Ok(())
    }

    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError> {
        self.touch()?;
        Ok(self.state.borrow().tables.contains(name))
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.touch()?;
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Observable state shared between a test and its provider.
#[derive(Debug, Default)]
pub struct ProviderState {
    /// Stores handed out per dataset, latest open last.
    pub opened: BTreeMap<DatasetId, Vec<CountingStore>>,
    /// Identifiers passed to `delete_dataset`, in call order.
    pub deleted: Vec<DatasetId>,
    /// When set, `delete_dataset` fails.
    pub fail_delete: bool,
}

/// Provider handing out counting stores.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    /// Master store shared with the test.
    pub master: CountingStore,
    /// Shared state.
    pub state: Rc<RefCell<ProviderState>>,
}

impl MockProvider {
    /// Returns how many times `id` was passed to `delete_dataset`.
    pub fn deletes_of(&self, id: &DatasetId) -> usize {
        self.state.borrow().deleted.iter().filter(|deleted| *deleted == id).count()
    }
}

impl StoreProvider for MockProvider {
    type Store = CountingStore;

    fn open_master(&mut self) -> Result<CountingStore, StoreError> {
        Ok(self.master.clone())
    }

    fn open_dataset(&mut self, id: &DatasetId) -> Result<CountingStore, StoreError> {
        let store = CountingStore::default();
        self.state.borrow_mut().opened.entry(id.clone()).or_default().push(store.clone());
        Ok(store)
    }

    fn delete_dataset(&mut self, id: &DatasetId) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        state.deleted.push(id.clone());
        if state.fail_delete { Err(StoreError::Io("permission denied".to_string())) } else { Ok(()) }
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Owner identity used by fixtures.
pub const OWNER: &str = "0xowner";

/// Returns the identifier of the fixture dataset.
pub fn fixture_id() -> DatasetId {
    DatasetId::derive("blog", OWNER)
}

/// Returns a `posts` table with an integer key and a bounded title.
pub fn posts_table() -> Table {
    Table {
        name: "posts".to_string(),
        columns: vec![
            Column::new("id", DataType::Int).with(Attribute::PrimaryKey),
            Column::new("title", DataType::Text)
                .with(Attribute::NotNull)
                .with(Attribute::MaxLength(Value::Int(300))),
        ],
        indexes: Vec::new(),
    }
}

/// Returns an action with the given visibility and statements.
pub fn action(name: &str, public: bool, inputs: &[&str], statements: &[&str]) -> Action {
    Action {
        name: name.to_string(),
        inputs: inputs.iter().map(ToString::to_string).collect(),
        public,
        statements: statements.iter().map(ToString::to_string).collect(),
    }
}
