// crates/strata-core/src/interfaces/mod.rs
// ============================================================================
// Module: Strata Interfaces
// Description: Backend-agnostic interfaces for relational storage.
// Purpose: Define the contract surfaces used by the Strata runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The runtime reaches the relational engine only through [`RelationalStore`]
//! and obtains stores only through [`StoreProvider`]. Implementations must be
//! single-writer, must support exactly one open savepoint per store, and must
//! refuse floating point values rather than convert them.
//!
//! Security posture: statement text is caller supplied; implementations bind
//! every value as a parameter and never interpolate it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::DatasetId;
use crate::core::value::Value;

// ============================================================================
// SECTION: Statement Types
// ============================================================================

/// Named statement arguments keyed by full parameter name, sigil included.
pub type NamedArgs = BTreeMap<String, Value>;

/// Handle to a statement prepared on one store.
///
/// # Invariants
/// - `id` is unique within the store that issued it.
/// - `parameters` lists named parameters in first-occurrence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHandle {
    /// Store-scoped statement identifier.
    id: u64,
    /// Statement text as prepared.
    text: String,
    /// Named parameters with their sigils.
    parameters: Vec<String>,
}

impl StatementHandle {
    /// Creates a handle. Intended for store implementations.
    #[must_use]
    pub const fn new(id: u64, text: String, parameters: Vec<String>) -> Self {
        Self {
            id,
            text,
            parameters,
        }
    }

    /// Returns the store-scoped identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the prepared statement text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the named parameters, sigils included.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }
}

/// Tabular statement result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Rows of values, each aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the result has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the value at `row` for the named column.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let position = self.columns.iter().position(|name| name == column)?;
        self.rows.get(row)?.get(position)
    }

    /// Returns every row as a column-name keyed map.
    #[must_use]
    pub fn records(&self) -> Vec<BTreeMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

// ============================================================================
// SECTION: Relational Store
// ============================================================================

/// Relational store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("relational store io error: {0}")]
    Io(String),
    /// Engine reported an error.
    #[error("relational store error: {0}")]
    Db(String),
    /// Constraint violation (unique, check, not-null, foreign key).
    #[error("relational store constraint violation: {0}")]
    Constraint(String),
    /// A savepoint is already open on this store.
    #[error("relational store savepoint already active")]
    SavepointActive,
    /// No savepoint is open on this store.
    #[error("relational store has no active savepoint")]
    NoSavepoint,
    /// Statement handle is unknown or already closed.
    #[error("relational store statement {0} is closed")]
    StatementClosed(u64),
    /// Read-only entry point received a writing statement.
    #[error("relational store statement is not read-only: {0}")]
    ReadOnly(String),
    /// Value or feature outside the supported set.
    #[error("relational store unsupported: {0}")]
    Unsupported(String),
    /// Store was closed.
    #[error("relational store is closed")]
    Closed,
}

/// Single-writer relational store with savepoint support.
pub trait RelationalStore {
    /// Prepares a statement and reports its named parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the statement does not compile.
    fn prepare(&mut self, text: &str) -> Result<StatementHandle, StoreError>;

    /// Runs a prepared statement with named arguments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when binding or execution fails.
    fn run(&mut self, handle: &StatementHandle, args: &NamedArgs) -> Result<ResultSet, StoreError>;

    /// Releases a prepared statement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StatementClosed`] when the handle is unknown.
    fn close_statement(&mut self, handle: &StatementHandle) -> Result<(), StoreError>;

    /// Executes a one-off statement, discarding rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when execution fails.
    fn execute(&mut self, text: &str, args: &NamedArgs) -> Result<(), StoreError>;

    /// Runs a one-off read-only statement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReadOnly`] for writing statements and
    /// [`StoreError`] when execution fails.
    fn query(&mut self, text: &str, args: &NamedArgs) -> Result<ResultSet, StoreError>;

    /// Opens the store's savepoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SavepointActive`] when one is already open.
    fn begin_savepoint(&mut self) -> Result<(), StoreError>;

    /// Commits the open savepoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoSavepoint`] when none is open.
    fn release_savepoint(&mut self) -> Result<(), StoreError>;

    /// Discards all effects since the open savepoint and closes it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoSavepoint`] when none is open.
    fn rollback_savepoint(&mut self) -> Result<(), StoreError>;

    /// Reports whether a table with the given name exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be read.
    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError>;

    /// Closes the store. Subsequent calls fail with [`StoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the engine refuses to close.
    fn close(&mut self) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Store Provider
// ============================================================================

/// Opens and deletes the stores backing the master directory and datasets.
pub trait StoreProvider {
    /// Store type produced by this provider.
    type Store: RelationalStore;

    /// Opens (creating if needed) the master store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be opened.
    fn open_master(&mut self) -> Result<Self::Store, StoreError>;

    /// Opens (creating if needed) the store of a dataset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be opened.
    fn open_dataset(&mut self, id: &DatasetId) -> Result<Self::Store, StoreError>;

    /// Deletes the backing data of a closed dataset store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the data cannot be removed.
    fn delete_dataset(&mut self, id: &DatasetId) -> Result<(), StoreError>;
}
