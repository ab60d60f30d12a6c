// crates/strata-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Relational Store
// Description: RelationalStore over a single rusqlite connection.
// Purpose: Execute prepared statements and savepoints against one SQLite file.
// Dependencies: strata-core, rusqlite, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`SqliteStore`] owns one connection. Prepared statements live in the
//! connection's statement cache and are addressed by store-scoped handles.
//! The store's single savepoint maps to an outermost `SQLite` savepoint, so
//! releasing it commits and rolling it back leaves the file untouched.
//!
//! Values cross the boundary only as [`Value`]; floating point results are
//! refused rather than converted.
//!
//! Security posture: database contents are untrusted; every argument is
//! bound by name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Statement;
use rusqlite::params;
use rusqlite::types::Value as SqlValue;
use rusqlite::types::ValueRef;
use strata_core::NamedArgs;
use strata_core::RelationalStore;
use strata_core::ResultSet;
use strata_core::StatementHandle;
use strata_core::StoreError;
use strata_core::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::SqliteStoreConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Layout version recorded in `PRAGMA user_version`.
const LAYOUT_VERSION: i64 = 1;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Name of the store's savepoint.
const SAVEPOINT_NAME: &str = "strata_sp";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors raised while opening a store.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store layout version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or path.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::Unsupported(message)
            }
        }
    }
}

/// Maps a `rusqlite` error, keeping constraint violations distinguishable.
fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        StoreError::Constraint(err.to_string())
    } else {
        StoreError::Db(err.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed relational store.
///
/// # Invariants
/// - `savepoint_open` mirrors whether the connection is inside a transaction.
/// - `statements` holds exactly the handles not yet closed.
#[derive(Debug)]
pub struct SqliteStore {
    /// Database file path.
    path: PathBuf,
    /// Open connection; `None` once closed.
    connection: Option<Connection>,
    /// Prepared statement texts by handle identifier.
    statements: BTreeMap<u64, String>,
    /// Next handle identifier.
    next_statement_id: u64,
    /// True while the store's savepoint is open.
    savepoint_open: bool,
}

impl SqliteStore {
    /// Opens (creating if needed) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid or the database
    /// cannot be opened or initialized.
    pub fn open(path: &Path, config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(path)?;
        ensure_parent_dir(path)?;
        let connection = open_connection(path, config)?;
        check_layout_version(&connection)?;
        debug!(path = %path.display(), "sqlite store opened");
        Ok(Self {
            path: path.to_path_buf(),
            connection: Some(connection),
            statements: BTreeMap::new(),
            next_statement_id: 0,
            savepoint_open: false,
        })
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the open connection.
    fn connection(&mut self) -> Result<&mut Connection, StoreError> {
        self.connection.as_mut().ok_or(StoreError::Closed)
    }

    /// Runs a savepoint command and resynchronizes the savepoint flag.
    fn savepoint_command(&mut self, sql: &str) -> Result<(), StoreError> {
        let connection = self.connection.as_mut().ok_or(StoreError::Closed)?;
        let result = connection.execute_batch(sql).map_err(map_sqlite_error);
        self.savepoint_open = !connection.is_autocommit();
        result
    }
}

impl RelationalStore for SqliteStore {
    fn prepare(&mut self, text: &str) -> Result<StatementHandle, StoreError> {
        let text = text.trim();
        let connection = self.connection()?;
        let statement = connection.prepare_cached(text).map_err(map_sqlite_error)?;
        let mut parameters: Vec<String> = Vec::new();
        for index in 1 ..= statement.parameter_count() {
            let name = statement
                .parameter_name(index)
                .map_or_else(|| format!("?{index}"), ToString::to_string);
            if !parameters.contains(&name) {
                parameters.push(name);
            }
        }
        drop(statement);
        self.next_statement_id += 1;
        let id = self.next_statement_id;
        self.statements.insert(id, text.to_string());
        Ok(StatementHandle::new(id, text.to_string(), parameters))
    }

    fn run(&mut self, handle: &StatementHandle, args: &NamedArgs) -> Result<ResultSet, StoreError> {
        let Some(text) = self.statements.get(&handle.id()) else {
            return Err(StoreError::StatementClosed(handle.id()));
        };
        let connection = self.connection.as_mut().ok_or(StoreError::Closed)?;
        let mut statement = connection.prepare_cached(text).map_err(map_sqlite_error)?;
        bind_arguments(&mut statement, args)?;
        let result = collect_rows(&mut statement);
        drop(statement);
        if self.savepoint_open && connection.is_autocommit() {
            self.savepoint_open = false;
            return Err(StoreError::Db("statement ended the open savepoint".to_string()));
        }
        result
    }

    fn close_statement(&mut self, handle: &StatementHandle) -> Result<(), StoreError> {
        self.statements
            .remove(&handle.id())
            .map(|_| ())
            .ok_or(StoreError::StatementClosed(handle.id()))
    }

    fn execute(&mut self, text: &str, args: &NamedArgs) -> Result<(), StoreError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(text.trim()).map_err(map_sqlite_error)?;
        bind_arguments(&mut statement, args)?;
        let mut rows = statement.raw_query();
        while rows.next().map_err(map_sqlite_error)?.is_some() {}
        Ok(())
    }

    fn query(&mut self, text: &str, args: &NamedArgs) -> Result<ResultSet, StoreError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(text.trim()).map_err(map_sqlite_error)?;
        if !statement.readonly() {
            return Err(StoreError::ReadOnly(text.trim().to_string()));
        }
        bind_arguments(&mut statement, args)?;
        collect_rows(&mut statement)
    }

    fn begin_savepoint(&mut self) -> Result<(), StoreError> {
        if self.connection.is_some() && self.savepoint_open {
            return Err(StoreError::SavepointActive);
        }
        self.savepoint_command(&format!("SAVEPOINT {SAVEPOINT_NAME}"))
    }

    fn release_savepoint(&mut self) -> Result<(), StoreError> {
        if self.connection.is_some() && !self.savepoint_open {
            return Err(StoreError::NoSavepoint);
        }
        self.savepoint_command(&format!("RELEASE {SAVEPOINT_NAME}"))
    }

    fn rollback_savepoint(&mut self) -> Result<(), StoreError> {
        if self.connection.is_some() && !self.savepoint_open {
            return Err(StoreError::NoSavepoint);
        }
        self.savepoint_command(&format!(
            "ROLLBACK TO {SAVEPOINT_NAME}; RELEASE {SAVEPOINT_NAME}"
        ))
    }

    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError> {
        let connection = self.connection()?;
        let found: Option<i64> = connection
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite_error)?;
        Ok(found.is_some())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        self.statements.clear();
        self.savepoint_open = false;
        match connection.close() {
            Ok(()) => {
                debug!(path = %self.path.display(), "sqlite store closed");
                Ok(())
            }
            Err((connection, err)) => {
                self.connection = Some(connection);
                Err(map_sqlite_error(err))
            }
        }
    }
}

// ============================================================================
// SECTION: Binding
// ============================================================================

/// Binds every parameter of `statement` by name from `args`.
///
/// Arguments the statement does not reference are ignored.
fn bind_arguments(statement: &mut Statement<'_>, args: &NamedArgs) -> Result<(), StoreError> {
    for index in 1 ..= statement.parameter_count() {
        let Some(name) = statement.parameter_name(index) else {
            return Err(StoreError::Unsupported(format!("positional parameter {index}")));
        };
        let value = args
            .get(name)
            .ok_or_else(|| StoreError::Db(format!("missing argument for {name}")))?;
        statement.raw_bind_parameter(index, to_sql_value(value)).map_err(map_sqlite_error)?;
    }
    Ok(())
}

/// Converts a strata value into a `SQLite` value.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(value) => SqlValue::Integer(*value),
        Value::Text(value) => SqlValue::Text(value.clone()),
        Value::Blob(value) => SqlValue::Blob(value.clone()),
    }
}

/// Converts a `SQLite` cell into a strata value.
fn from_value_ref(value: ValueRef<'_>) -> Result<Value, StoreError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(value) => Ok(Value::Int(value)),
        ValueRef::Real(_) => {
            Err(StoreError::Unsupported("floating point values are not supported".to_string()))
        }
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|err| StoreError::Unsupported(format!("text is not utf-8: {err}"))),
        ValueRef::Blob(bytes) => Ok(Value::Blob(bytes.to_vec())),
    }
}

/// Steps a bound statement to completion and collects its rows.
fn collect_rows(statement: &mut Statement<'_>) -> Result<ResultSet, StoreError> {
    let columns: Vec<String> = statement.column_names().into_iter().map(ToString::to_string).collect();
    let width = columns.len();
    let mut rows = statement.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(map_sqlite_error)? {
        let mut values = Vec::with_capacity(width);
        for index in 0 .. width {
            values.push(from_value_ref(row.get_ref(index).map_err(map_sqlite_error)?)?);
        }
        out.push(values);
    }
    Ok(ResultSet {
        columns,
        rows: out,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
pub(crate) fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies the configured pragmas.
fn open_connection(path: &Path, config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    connection.set_prepared_statement_cache_capacity(config.statement_cache_capacity);
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Stamps new files with the layout version and rejects unknown versions.
fn check_layout_version(connection: &Connection) -> Result<(), SqliteStoreError> {
    let version: i64 = connection
        .query_row("PRAGMA user_version", params![], |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        0 => connection
            .execute_batch(&format!("PRAGMA user_version = {LAYOUT_VERSION};"))
            .map_err(|err| SqliteStoreError::Db(err.to_string())),
        LAYOUT_VERSION => Ok(()),
        other => Err(SqliteStoreError::VersionMismatch(format!(
            "unsupported layout version: {other}"
        ))),
    }
}
