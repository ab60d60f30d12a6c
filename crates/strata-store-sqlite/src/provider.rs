// crates/strata-store-sqlite/src/provider.rs
// ============================================================================
// Module: SQLite Store Provider
// Description: Maps the master directory and datasets onto SQLite files.
// Purpose: Give the engine a durable StoreProvider rooted at a data directory.
// Dependencies: strata-core, tracing
// ============================================================================

//! ## Overview
//! Layout under the configured data directory:
//!
//! ```text
//! <data_dir>/master.sqlite
//! <data_dir>/datasets/<dataset id>.sqlite
//! ```
//!
//! Dataset identifiers are fixed-length lowercase hex with a one letter
//! prefix, so they are always safe file names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::ErrorKind;
use std::path::PathBuf;

use strata_core::DatasetId;
use strata_core::Engine;
use strata_core::EngineError;
use strata_core::EngineLimits;
use strata_core::StoreError;
use strata_core::StoreProvider;
use tracing::debug;

use crate::config::SqliteStoreConfig;
use crate::store::SqliteStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File name of the master store.
const MASTER_FILE_NAME: &str = "master.sqlite";
/// Directory holding dataset stores.
const DATASETS_DIR_NAME: &str = "datasets";
/// Extension of dataset store files.
const DATASET_FILE_EXTENSION: &str = "sqlite";
/// Sidecar suffixes `SQLite` may leave next to a database file.
const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Engine over `SQLite` stores.
pub type SqliteEngine = Engine<SqliteStoreProvider>;

/// Store provider rooted at a data directory.
#[derive(Debug, Clone)]
pub struct SqliteStoreProvider {
    /// Store configuration shared by every opened store.
    config: SqliteStoreConfig,
}

impl SqliteStoreProvider {
    /// Creates a provider for the given configuration.
    #[must_use]
    pub const fn new(config: SqliteStoreConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the provider configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns the path of the master store.
    #[must_use]
    pub fn master_path(&self) -> PathBuf {
        self.config.data_dir.join(MASTER_FILE_NAME)
    }

    /// Returns the path of a dataset store.
    #[must_use]
    pub fn dataset_path(&self, id: &DatasetId) -> PathBuf {
        self.config
            .data_dir
            .join(DATASETS_DIR_NAME)
            .join(format!("{}.{DATASET_FILE_EXTENSION}", id.as_str()))
    }
}

impl StoreProvider for SqliteStoreProvider {
    type Store = SqliteStore;

    fn open_master(&mut self) -> Result<SqliteStore, StoreError> {
        SqliteStore::open(&self.master_path(), &self.config).map_err(StoreError::from)
    }

    fn open_dataset(&mut self, id: &DatasetId) -> Result<SqliteStore, StoreError> {
        SqliteStore::open(&self.dataset_path(id), &self.config).map_err(StoreError::from)
    }

    fn delete_dataset(&mut self, id: &DatasetId) -> Result<(), StoreError> {
        let path = self.dataset_path(id);
        remove_if_present(&path)?;
        for suffix in SIDECAR_SUFFIXES {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            remove_if_present(&PathBuf::from(sidecar))?;
        }
        debug!(dataset = %id, "dataset files removed");
        Ok(())
    }
}

/// Removes a file, treating absence as success.
fn remove_if_present(path: &std::path::Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Io(format!("{}: {err}", path.display()))),
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Opens an engine over the `SQLite` data directory in `config`.
///
/// # Errors
///
/// Returns [`EngineError`] when the master store cannot be opened or its
/// directory fails to load.
pub fn open_engine(config: SqliteStoreConfig, limits: EngineLimits) -> Result<SqliteEngine, EngineError> {
    Engine::open(SqliteStoreProvider::new(config), limits)
}
