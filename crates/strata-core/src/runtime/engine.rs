// crates/strata-core/src/runtime/engine.rs
// ============================================================================
// Module: Strata Engine
// Description: Registry of open datasets and the persisted dataset directory.
// Purpose: Own dataset lifecycle from identifier derivation to deletion.
// Dependencies: tracing, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The [`Engine`] owns the master store and every open [`Dataset`]. The
//! master store hosts the dataset directory, itself an ordinary declared
//! table compiled by the DDL generator and recorded in the master store's
//! metadata registry. Opening the engine replays the directory in insertion
//! order; any inconsistency is fatal.
//!
//! Security posture: dataset names and owners are untrusted; identifiers are
//! recomputed on load and compared against what was persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::ddl::generate_ddl;
use crate::core::identifiers::DatasetId;
use crate::core::metadata;
use crate::core::metadata::Declaration;
use crate::core::metadata::MetadataKind;
use crate::core::schema::Attribute;
use crate::core::schema::Column;
use crate::core::schema::Index;
use crate::core::schema::IndexKind;
use crate::core::schema::Table;
use crate::core::schema::normalize_identifier;
use crate::core::value::DataType;
use crate::core::value::Value;
use crate::interfaces::NamedArgs;
use crate::interfaces::RelationalStore;
use crate::interfaces::StoreError;
use crate::interfaces::StoreProvider;
use crate::runtime::context::TxContext;
use crate::runtime::dataset::Dataset;
use crate::runtime::dataset::DatasetInfo;
use crate::runtime::error::EngineError;
use crate::runtime::error::collect_close_errors;
use crate::runtime::registry::DEFAULT_MAX_METADATA_BYTES;
use crate::runtime::registry::MetadataRegistry;
use crate::runtime::savepoint::Savepoint;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory table in the master store.
pub const DIRECTORY_TABLE: &str = "_datasets";

/// Default statement limit per action.
pub const DEFAULT_MAX_STATEMENTS_PER_ACTION: usize = 64;

/// Default record limit per batch.
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 1024;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Resource limits applied by the engine and its datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Maximum statements in one action.
    pub max_statements_per_action: usize,
    /// Maximum records in one batch execution.
    pub max_batch_records: usize,
    /// Maximum metadata payload size in bytes.
    pub max_metadata_bytes: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_statements_per_action: DEFAULT_MAX_STATEMENTS_PER_ACTION,
            max_batch_records: DEFAULT_MAX_BATCH_RECORDS,
            max_metadata_bytes: DEFAULT_MAX_METADATA_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Top-level registry of datasets.
///
/// # Invariants
/// - `directory` and `datasets` hold exactly the same identifiers.
/// - `directory` is in directory insertion order.
pub struct Engine<P: StoreProvider> {
    /// Store provider.
    provider: P,
    /// Master store hosting the directory.
    master: P::Store,
    /// Master metadata registry.
    registry: MetadataRegistry,
    /// Limits passed to every dataset.
    limits: EngineLimits,
    /// Directory snapshot in insertion order.
    directory: Vec<DatasetInfo>,
    /// Open datasets.
    datasets: BTreeMap<DatasetId, Dataset<P::Store>>,
    /// True once the engine has been closed.
    closed: bool,
}

impl<P: StoreProvider> Engine<P> {
    /// Opens the engine: installs the directory if needed and reopens every
    /// listed dataset.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CorruptMetadata`] when the directory or any
    /// dataset's metadata is inconsistent, and [`EngineError::Store`] when a
    /// store cannot be opened. Stores opened before the failure are closed.
    pub fn open(mut provider: P, limits: EngineLimits) -> Result<Self, EngineError> {
        let master = provider.open_master()?;
        let mut engine = Self {
            provider,
            master,
            registry: MetadataRegistry::new(limits.max_metadata_bytes),
            limits,
            directory: Vec::new(),
            datasets: BTreeMap::new(),
            closed: false,
        };
        if let Err(err) = engine.load() {
            if let Err(close) = engine.close() {
                error!(error = %close, "engine close after failed open failed");
            }
            return Err(err);
        }
        info!(datasets = engine.directory.len(), "engine opened");
        Ok(engine)
    }

    /// Installs the directory and rehydrates every listed dataset.
    fn load(&mut self) -> Result<(), EngineError> {
        install_directory(&mut self.master, self.registry)?;
        for entry in read_directory(&mut self.master)? {
            let store = self.provider.open_dataset(&entry.id)?;
            let dataset = Dataset::open(entry.clone(), store, self.limits)?;
            self.datasets.insert(entry.id.clone(), dataset);
            self.directory.push(entry);
        }
        Ok(())
    }

    /// Creates a dataset and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDeclaration`] for invalid names,
    /// [`EngineError::InvalidInput`] for an empty owner,
    /// [`EngineError::AlreadyExists`] when the identifier is taken, and
    /// [`EngineError::Store`] when a store fails. A failed create leaves no
    /// directory row and no backing data.
    pub fn create_dataset(&mut self, name: &str, owner: &str) -> Result<DatasetId, EngineError> {
        self.ensure_open()?;
        let name = normalize_identifier("dataset", name)?;
        if owner.is_empty() {
            return Err(EngineError::InvalidInput("dataset owner must not be empty".to_string()));
        }
        let id = DatasetId::derive(&name, owner);
        if self.datasets.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("dataset {id}")));
        }
        let entry = DatasetInfo {
            id: id.clone(),
            name,
            owner: owner.to_string(),
        };

        // Data under an unlisted identifier is left over from an interrupted create.
        self.provider.delete_dataset(&id)?;
        let store = self.provider.open_dataset(&id)?;
        let mut dataset = match Dataset::open(entry.clone(), store, self.limits) {
            Ok(dataset) => dataset,
            Err(err) => {
                self.discard_data(&id);
                return Err(err);
            }
        };
        if let Err(err) = insert_directory_row(&mut self.master, &entry) {
            if let Err(close) = dataset.close() {
                error!(dataset = %id, error = %close, "dataset close after failed create failed");
            }
            self.discard_data(&id);
            return Err(err);
        }

        info!(dataset = %id, name = %entry.name, owner = %entry.owner, "dataset created");
        self.datasets.insert(id.clone(), dataset);
        self.directory.push(entry);
        Ok(id)
    }

    /// Deletes backing data, logging failures.
    fn discard_data(&mut self, id: &DatasetId) {
        if let Err(err) = self.provider.delete_dataset(id) {
            error!(dataset = %id, error = %err, "dataset data cleanup failed");
        }
    }

    /// Returns an open dataset.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the identifier is unknown.
    pub fn get_dataset(&self, id: &DatasetId) -> Result<&Dataset<P::Store>, EngineError> {
        self.ensure_open()?;
        self.datasets.get(id).ok_or_else(|| EngineError::NotFound(format!("dataset {id}")))
    }

    /// Returns an open dataset for mutation and execution.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the identifier is unknown.
    pub fn get_dataset_mut(&mut self, id: &DatasetId) -> Result<&mut Dataset<P::Store>, EngineError> {
        self.ensure_open()?;
        self.datasets.get_mut(id).ok_or_else(|| EngineError::NotFound(format!("dataset {id}")))
    }

    /// Returns the directory in insertion order.
    #[must_use]
    pub fn list_datasets(&self) -> Vec<DatasetInfo> {
        self.directory.clone()
    }

    /// Deletes a dataset owned by the caller.
    ///
    /// The directory row is removed and committed before the backing data is
    /// deleted, so a dataset is never listed without its data. Data left
    /// behind by a failed deletion is cleared by the next create of the same
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the identifier is unknown,
    /// [`EngineError::Unauthorized`] unless the caller owns the dataset, and
    /// [`EngineError::Store`] when the directory or backing data cannot be
    /// updated. When the directory update fails, the dataset is reopened and
    /// stays listed. When only the backing data cannot be deleted, the
    /// dataset is already gone from the directory.
    pub fn delete_dataset(&mut self, ctx: &TxContext, id: &DatasetId) -> Result<(), EngineError> {
        self.ensure_open()?;
        let Some(entry) = self.directory.iter().find(|entry| &entry.id == id).cloned() else {
            return Err(EngineError::NotFound(format!("dataset {id}")));
        };
        if ctx.is_anonymous() || ctx.caller != entry.owner {
            warn!(dataset = %id, "unauthorized dataset delete");
            return Err(EngineError::Unauthorized(format!(
                "dataset {id} may only be deleted by its owner"
            )));
        }

        let mut savepoint = Savepoint::begin(&mut self.master)?;
        let args = NamedArgs::from([("$dbid".to_string(), Value::Text(id.as_str().to_string()))]);
        savepoint.store().execute("DELETE FROM \"_datasets\" WHERE \"dbid\" = $dbid", &args)?;
        if let Some(mut dataset) = self.datasets.remove(id)
            && let Err(err) = dataset.close()
        {
            error!(dataset = %id, error = %err, "dataset close during delete failed");
        }
        if let Err(err) = savepoint.commit() {
            self.reopen_dataset(entry);
            return Err(EngineError::Store(err));
        }
        self.directory.retain(|entry| &entry.id != id);
        info!(dataset = %id, "dataset deleted");

        self.provider.delete_dataset(id).map_err(|err| {
            error!(dataset = %id, error = %err, "dataset data cleanup after delete failed");
            EngineError::Store(err)
        })
    }

    /// Reopens a dataset whose deletion was abandoned, logging failures.
    fn reopen_dataset(&mut self, entry: DatasetInfo) {
        let id = entry.id.clone();
        let reopened = self
            .provider
            .open_dataset(&id)
            .map_err(EngineError::from)
            .and_then(|store| Dataset::open(entry, store, self.limits));
        match reopened {
            Ok(dataset) => {
                self.datasets.insert(id, dataset);
            }
            Err(err) => {
                error!(dataset = %id, error = %err, "dataset reopen after failed delete failed");
            }
        }
    }

    /// Closes every dataset and then the master store.
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
        for (_, mut dataset) in std::mem::take(&mut self.datasets) {
            if let Err(err) = dataset.close() {
                errors.push(err);
            }
        }
        self.directory.clear();
        if let Err(err) = self.master.close() {
            errors.push(EngineError::Store(err));
        }
        collect_close_errors(errors)
    }

    /// Fails when the engine has been closed.
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Closed("engine".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Directory
// ============================================================================

/// Returns the declaration of the directory table.
fn directory_table() -> Table {
    Table {
        name: DIRECTORY_TABLE.to_string(),
        columns: vec![
            Column::new("dbid", DataType::Text).with(Attribute::PrimaryKey),
            Column::new("name", DataType::Text).with(Attribute::NotNull),
            Column::new("owner", DataType::Text).with(Attribute::NotNull),
        ],
        indexes: vec![Index {
            name: "_datasets_owner_name".to_string(),
            columns: vec!["owner".to_string(), "name".to_string()],
            kind: IndexKind::UniqueBTree,
        }],
    }
}

/// Creates and registers the directory table, or verifies the registered one.
fn install_directory<S: RelationalStore>(
    master: &mut S,
    registry: MetadataRegistry,
) -> Result<(), EngineError> {
    let expected = directory_table();
    registry.ensure(master)?;
    let registered =
        registry.list(master, MetadataKind::Table)?.into_iter().find(|record| record.name == DIRECTORY_TABLE);
    if let Some(record) = registered {
        return match registry.decode(&record)? {
            Declaration::Table(table) if table == expected => Ok(()),
            _ => Err(EngineError::CorruptMetadata("dataset directory declaration differs".to_string())),
        };
    }
    if master.table_exists(DIRECTORY_TABLE)? {
        return Err(EngineError::CorruptMetadata(
            "dataset directory exists without metadata".to_string(),
        ));
    }
    let statements = generate_ddl(&expected)?;
    let record = metadata::encode_table(&expected)?;
    let mut savepoint = Savepoint::begin(master)?;
    for statement in &statements {
        savepoint.store().execute(statement, &NamedArgs::new())?;
    }
    registry.store(savepoint.store(), &record)?;
    savepoint.commit()?;
    Ok(())
}

/// Reads directory rows in insertion order, verifying each identifier.
fn read_directory<S: RelationalStore>(master: &mut S) -> Result<Vec<DatasetInfo>, EngineError> {
    let rows = master.query(
        "SELECT \"dbid\", \"name\", \"owner\" FROM \"_datasets\" ORDER BY rowid",
        &NamedArgs::new(),
    )?;
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows.rows {
        let [Value::Text(dbid), Value::Text(name), Value::Text(owner)] = row.as_slice() else {
            return Err(EngineError::CorruptMetadata("malformed dataset directory row".to_string()));
        };
        let id = DatasetId::derive(name, owner);
        if id.as_str() != dbid {
            return Err(EngineError::CorruptMetadata(format!(
                "dataset directory row {dbid} does not match its name and owner"
            )));
        }
        entries.push(DatasetInfo {
            id,
            name: name.clone(),
            owner: owner.clone(),
        });
    }
    Ok(entries)
}

/// Inserts a directory row inside a master savepoint.
fn insert_directory_row<S: RelationalStore>(
    master: &mut S,
    entry: &DatasetInfo,
) -> Result<(), EngineError> {
    let args = NamedArgs::from([
        ("$dbid".to_string(), Value::Text(entry.id.as_str().to_string())),
        ("$name".to_string(), Value::Text(entry.name.clone())),
        ("$owner".to_string(), Value::Text(entry.owner.clone())),
    ]);
    let mut savepoint = Savepoint::begin(master)?;
    savepoint
        .store()
        .execute(
            "INSERT INTO \"_datasets\" (\"dbid\", \"name\", \"owner\") VALUES ($dbid, $name, $owner)",
            &args,
        )
        .map_err(|err| match err {
            StoreError::Constraint(message) => {
                EngineError::AlreadyExists(format!("dataset {}: {message}", entry.id))
            }
            other => EngineError::Store(other),
        })?;
    savepoint.commit()?;
    Ok(())
}
