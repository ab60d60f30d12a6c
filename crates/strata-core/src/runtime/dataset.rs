// crates/strata-core/src/runtime/dataset.rs
// ============================================================================
// Module: Strata Dataset
// Description: Per-namespace aggregate of tables, actions, and one store.
// Purpose: Declare schema and execute actions atomically with access control.
// Dependencies: tracing, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! A [`Dataset`] owns one store connection plus in-memory catalogs of the
//! tables and actions recorded in that store's metadata registry. Catalogs
//! are only updated after the savepoint that persisted a declaration has
//! committed, so listings always reflect committed state.
//!
//! Action execution moves through authorization, input validation, running,
//! and committing. Authorization and input validation never touch the store;
//! running and committing happen inside a single savepoint that is rolled
//! back on any failure.
//!
//! Security posture: action inputs and caller identities are untrusted;
//! values are bound as parameters and never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::core::ddl::generate_ddl;
use crate::core::identifiers::DatasetId;
use crate::core::metadata;
use crate::core::metadata::Declaration;
use crate::core::metadata::MetadataKind;
use crate::core::schema::Action;
use crate::core::schema::CONTEXT_SIGIL;
use crate::core::schema::INPUT_SIGIL;
use crate::core::schema::RESERVED_VARIABLES;
use crate::core::schema::Table;
use crate::interfaces::NamedArgs;
use crate::interfaces::RelationalStore;
use crate::interfaces::ResultSet;
use crate::interfaces::StatementHandle;
use crate::interfaces::StoreError;
use crate::runtime::context::Inputs;
use crate::runtime::context::TxContext;
use crate::runtime::context::bind_arguments;
use crate::runtime::context::normalize_inputs;
use crate::runtime::engine::EngineLimits;
use crate::runtime::error::EngineError;
use crate::runtime::error::collect_close_errors;
use crate::runtime::registry::MetadataRegistry;
use crate::runtime::savepoint::Savepoint;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Directory entry describing a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Dataset identifier derived from `name` and `owner`.
    pub id: DatasetId,
    /// Dataset name as declared.
    pub name: String,
    /// Owner identity.
    pub owner: String,
}

/// Action declaration with its prepared statements.
#[derive(Debug)]
struct PreparedAction {
    /// Normalized action declaration.
    action: Action,
    /// Prepared statements, aligned with `action.statements`.
    statements: Vec<StatementHandle>,
}

// ============================================================================
// SECTION: Dataset
// ============================================================================

/// Isolated namespace of tables and actions over one relational store.
///
/// # Invariants
/// - Catalog entries exist only for declarations committed to the store.
/// - Table and action names are unique within their catalog.
/// - After [`Dataset::close`], every operation fails with
///   [`EngineError::Closed`].
#[derive(Debug)]
pub struct Dataset<S: RelationalStore> {
    /// Directory entry.
    info: DatasetInfo,
    /// Backing store.
    store: S,
    /// Metadata registry settings.
    registry: MetadataRegistry,
    /// Engine limits.
    limits: EngineLimits,
    /// Table catalog in creation order.
    tables: Vec<Table>,
    /// Action catalog in creation order.
    actions: Vec<PreparedAction>,
    /// True once the dataset has been closed.
    closed: bool,
}

impl<S: RelationalStore> Dataset<S> {
    /// Opens a dataset over `store`, replaying its persisted declarations.
    ///
    /// The store is closed before an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CorruptMetadata`] when persisted declarations
    /// cannot be decoded or re-prepared, and [`EngineError::Store`] when the
    /// store fails.
    pub fn open(info: DatasetInfo, store: S, limits: EngineLimits) -> Result<Self, EngineError> {
        let mut dataset = Self {
            info,
            store,
            registry: MetadataRegistry::new(limits.max_metadata_bytes),
            limits,
            tables: Vec::new(),
            actions: Vec::new(),
            closed: false,
        };
        if let Err(err) = dataset.rehydrate() {
            if let Err(close) = dataset.close() {
                error!(dataset = %dataset.info.id, error = %close, "dataset close after failed open failed");
            }
            return Err(err);
        }
        Ok(dataset)
    }

    /// Rebuilds both catalogs from the metadata registry.
    fn rehydrate(&mut self) -> Result<(), EngineError> {
        self.registry.ensure(&mut self.store)?;
        for record in self.registry.list(&mut self.store, MetadataKind::Table)? {
            let Declaration::Table(table) = self.registry.decode(&record)? else {
                return Err(EngineError::CorruptMetadata(format!(
                    "table record {} decoded to another kind",
                    record.name
                )));
            };
            if !self.store.table_exists(&table.name)? {
                return Err(EngineError::CorruptMetadata(format!(
                    "table {} is registered but missing from the store",
                    table.name
                )));
            }
            self.tables.push(table);
        }
        for record in self.registry.list(&mut self.store, MetadataKind::Action)? {
            let Declaration::Action(action) = self.registry.decode(&record)? else {
                return Err(EngineError::CorruptMetadata(format!(
                    "action record {} decoded to another kind",
                    record.name
                )));
            };
            let statements = prepare_action(&mut self.store, &action).map_err(|err| {
                EngineError::CorruptMetadata(format!("action {}: {err}", action.name))
            })?;
            self.actions.push(PreparedAction {
                action,
                statements,
            });
        }
        debug!(
            dataset = %self.info.id,
            tables = self.tables.len(),
            actions = self.actions.len(),
            "dataset rehydrated"
        );
        Ok(())
    }

    /// Returns the directory entry.
    #[must_use]
    pub const fn info(&self) -> &DatasetInfo {
        &self.info
    }

    /// Returns the dataset identifier.
    #[must_use]
    pub const fn id(&self) -> &DatasetId {
        &self.info.id
    }

    /// Returns the dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Returns the owner identity.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.info.owner
    }

    /// Returns true once the dataset has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    /// Declares a table: applies its DDL and records its metadata atomically.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDeclaration`] when the table is invalid,
    /// [`EngineError::AlreadyExists`] when the name is taken, and
    /// [`EngineError::Store`] when applying or persisting fails. No effects
    /// remain after any failure.
    pub fn create_table(&mut self, table: &Table) -> Result<(), EngineError> {
        self.ensure_open()?;
        let table = table.normalize()?;
        if self.tables.iter().any(|existing| existing.name == table.name)
            || self.registry.contains(&mut self.store, &table.name, MetadataKind::Table)?
            || self.store.table_exists(&table.name)?
        {
            return Err(EngineError::AlreadyExists(format!("table {}", table.name)));
        }
        let statements = generate_ddl(&table)?;
        let record = metadata::encode_table(&table)?;

        let mut savepoint = Savepoint::begin(&mut self.store)?;
        for statement in &statements {
            savepoint.store().execute(statement, &NamedArgs::new())?;
        }
        self.registry.store(savepoint.store(), &record)?;
        savepoint.commit()?;

        debug!(dataset = %self.info.id, table = %table.name, "table created");
        self.tables.push(table);
        Ok(())
    }

    /// Declares an action: prepares its statements and records its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDeclaration`] when the action is invalid
    /// or a statement fails to prepare or references an unknown parameter,
    /// [`EngineError::AlreadyExists`] when the name is taken, and
    /// [`EngineError::Store`] when persisting fails.
    pub fn create_action(&mut self, action: &Action) -> Result<(), EngineError> {
        self.ensure_open()?;
        let action = action.normalize(self.limits.max_statements_per_action)?;
        if self.actions.iter().any(|existing| existing.action.name == action.name)
            || self.registry.contains(&mut self.store, &action.name, MetadataKind::Action)?
        {
            return Err(EngineError::AlreadyExists(format!("action {}", action.name)));
        }
        let statements = prepare_action(&mut self.store, &action)?;
        if let Err(err) = self.persist_action(&action) {
            close_statements(&mut self.store, &statements);
            return Err(err);
        }

        debug!(
            dataset = %self.info.id,
            action = %action.name,
            statements = statements.len(),
            "action created"
        );
        self.actions.push(PreparedAction {
            action,
            statements,
        });
        Ok(())
    }

    /// Records an action declaration inside a savepoint.
    fn persist_action(&mut self, action: &Action) -> Result<(), EngineError> {
        let record = metadata::encode_action(action)?;
        let mut savepoint = Savepoint::begin(&mut self.store)?;
        self.registry.store(savepoint.store(), &record)?;
        savepoint.commit()?;
        Ok(())
    }

    /// Returns the table catalog in creation order.
    #[must_use]
    pub fn list_tables(&self) -> Vec<Table> {
        self.tables.clone()
    }

    /// Returns the action catalog in creation order.
    #[must_use]
    pub fn list_actions(&self) -> Vec<Action> {
        self.actions.iter().map(|prepared| prepared.action.clone()).collect()
    }

    /// Asks the store whether a table exists.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Closed`] after close and [`EngineError::Store`]
    /// when the store fails.
    pub fn table_exists(&mut self, name: &str) -> Result<bool, EngineError> {
        self.ensure_open()?;
        Ok(self.store.table_exists(&name.to_lowercase())?)
    }

    /// Runs a read-only statement against committed state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] for statements that write and
    /// [`EngineError::Store`] when the store fails.
    pub fn query(&mut self, sql: &str, args: &NamedArgs) -> Result<ResultSet, EngineError> {
        self.ensure_open()?;
        self.store.query(sql, args).map_err(|err| match err {
            StoreError::ReadOnly(message) => {
                EngineError::InvalidInput(format!("query must be read-only: {message}"))
            }
            other => EngineError::Store(other),
        })
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Executes an action atomically and returns its last statement's rows.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for unknown actions,
    /// [`EngineError::Unauthorized`] when a private action is called by
    /// someone other than the owner, [`EngineError::InvalidInput`] for bad
    /// inputs, and [`EngineError::ExecutionFailed`] when a statement or the
    /// commit fails. Only execution failures reach the store, and they are
    /// rolled back.
    pub fn execute(
        &mut self,
        ctx: &TxContext,
        action_name: &str,
        inputs: &Inputs,
    ) -> Result<ResultSet, EngineError> {
        self.ensure_open()?;
        let index = self.authorize(ctx, action_name)?;
        let record = normalize_inputs(&self.prepared(index)?.action, inputs)?;
        self.run_records(ctx, index, std::slice::from_ref(&record))
    }

    /// Executes an action once per record inside a single savepoint.
    ///
    /// Returns the last record's result. Any failure rolls back every record.
    ///
    /// # Errors
    ///
    /// As [`Dataset::execute`]; additionally returns
    /// [`EngineError::InvalidInput`] for empty or oversized batches.
    pub fn batch_execute(
        &mut self,
        ctx: &TxContext,
        action_name: &str,
        records: &[Inputs],
    ) -> Result<ResultSet, EngineError> {
        self.ensure_open()?;
        let index = self.authorize(ctx, action_name)?;
        if records.is_empty() {
            return Err(EngineError::InvalidInput("batch has no records".to_string()));
        }
        if records.len() > self.limits.max_batch_records {
            return Err(EngineError::InvalidInput(format!(
                "batch has {} records, limit is {}",
                records.len(),
                self.limits.max_batch_records
            )));
        }
        let action = &self.prepared(index)?.action;
        let normalized = records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                normalize_inputs(action, record).map_err(|err| match err {
                    EngineError::InvalidInput(message) => {
                        EngineError::InvalidInput(format!("record {position}: {message}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.run_records(ctx, index, &normalized)
    }

    /// Resolves an action and checks the caller may run it.
    ///
    /// Performs no store access.
    fn authorize(&self, ctx: &TxContext, action_name: &str) -> Result<usize, EngineError> {
        let name = action_name.to_lowercase();
        let index = self
            .actions
            .iter()
            .position(|prepared| prepared.action.name == name)
            .ok_or_else(|| EngineError::NotFound(format!("action {name}")))?;
        let action = &self.prepared(index)?.action;
        if !action.public && (ctx.is_anonymous() || ctx.caller != self.info.owner) {
            warn!(dataset = %self.info.id, action = %name, "unauthorized action call");
            return Err(EngineError::Unauthorized(format!(
                "action {name} is private to the dataset owner"
            )));
        }
        Ok(index)
    }

    /// Returns the prepared action at `index`.
    fn prepared(&self, index: usize) -> Result<&PreparedAction, EngineError> {
        self.actions
            .get(index)
            .ok_or_else(|| EngineError::NotFound(format!("action index {index}")))
    }

    /// Runs every record through the action's statements in one savepoint.
    fn run_records(
        &mut self,
        ctx: &TxContext,
        index: usize,
        records: &[Inputs],
    ) -> Result<ResultSet, EngineError> {
        let Some(prepared) = self.actions.get(index) else {
            return Err(EngineError::NotFound(format!("action index {index}")));
        };
        let action = &prepared.action;
        let dataset = &self.info.id;
        let batched = records.len() > 1;
        let failure = |statement_index: usize, record: usize, err: &StoreError| {
            warn!(
                dataset = %dataset,
                action = %action.name,
                statement_index,
                record,
                error = %err,
                "action execution failed"
            );
            let message = if batched { format!("record {record}: {err}") } else { err.to_string() };
            EngineError::ExecutionFailed {
                action: action.name.clone(),
                statement_index,
                message,
            }
        };

        let mut savepoint = Savepoint::begin(&mut self.store).map_err(|err| failure(0, 0, &err))?;
        let mut result = ResultSet::default();
        for (record, inputs) in records.iter().enumerate() {
            let args = bind_arguments(ctx, action, dataset, inputs);
            for (statement_index, handle) in prepared.statements.iter().enumerate() {
                result = savepoint
                    .store()
                    .run(handle, &args)
                    .map_err(|err| failure(statement_index, record, &err))?;
            }
        }
        let last_statement = prepared.statements.len().saturating_sub(1);
        let last_record = records.len().saturating_sub(1);
        savepoint.commit().map_err(|err| failure(last_statement, last_record, &err))?;
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Closes every prepared statement and then the store.
    ///
    /// Idempotent. Every close is attempted; failures are reported together.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when any close fails.
    pub fn close(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut errors = Vec::new();
        for prepared in self.actions.drain(..) {
            for handle in &prepared.statements {
                if let Err(err) = self.store.close_statement(handle) {
                    errors.push(err);
                }
            }
        }
        self.tables.clear();
        if let Err(err) = self.store.close() {
            errors.push(err);
        }
        collect_close_errors(errors)
    }

    /// Fails when the dataset has been closed.
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Closed(format!("dataset {}", self.info.id)));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Statement Preparation
// ============================================================================

/// Prepares every statement of an action and checks its named parameters.
///
/// Handles prepared before a failure are closed before returning.
fn prepare_action<S: RelationalStore>(
    store: &mut S,
    action: &Action,
) -> Result<Vec<StatementHandle>, EngineError> {
    let mut handles = Vec::with_capacity(action.statements.len());
    for (position, text) in action.statements.iter().enumerate() {
        let handle = match store.prepare(text) {
            Ok(handle) => handle,
            Err(err) => {
                close_statements(store, &handles);
                return Err(EngineError::InvalidDeclaration(format!(
                    "action {} statement {position}: {err}",
                    action.name
                )));
            }
        };
        let unknown = handle.parameters().iter().find(|parameter| !parameter_declared(action, parameter));
        if let Some(parameter) = unknown {
            let message = format!(
                "action {} statement {position} uses undeclared parameter {parameter}",
                action.name
            );
            handles.push(handle);
            close_statements(store, &handles);
            return Err(EngineError::InvalidDeclaration(message));
        }
        handles.push(handle);
    }
    Ok(handles)
}

/// Returns true when a statement parameter resolves to an input or a
/// reserved variable.
fn parameter_declared(action: &Action, parameter: &str) -> bool {
    if let Some(name) = parameter.strip_prefix(INPUT_SIGIL) {
        return action.declares_input(name);
    }
    if let Some(name) = parameter.strip_prefix(CONTEXT_SIGIL) {
        return RESERVED_VARIABLES.contains(&name);
    }
    false
}

/// Closes statement handles, logging failures.
fn close_statements<S: RelationalStore>(store: &mut S, handles: &[StatementHandle]) {
    for handle in handles {
        if let Err(err) = store.close_statement(handle) {
            error!(statement = handle.id(), error = %err, "statement close failed");
        }
    }
}
