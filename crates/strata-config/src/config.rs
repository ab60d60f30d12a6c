// crates/strata-config/src/config.rs
// ============================================================================
// Module: Strata Configuration
// Description: Configuration loading and validation for Strata engines.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: strata-core, strata-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and defaults to the engine's built-in values;
//! anything present is validated and out-of-range values fail closed.
//!
//! ```toml
//! [storage]
//! data_dir = "strata-data"
//! journal_mode = "wal"
//!
//! [limits]
//! max_batch_records = 512
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use strata_core::EngineLimits;
use strata_core::runtime::engine::DEFAULT_MAX_BATCH_RECORDS;
use strata_core::runtime::engine::DEFAULT_MAX_STATEMENTS_PER_ACTION;
use strata_core::runtime::registry::DEFAULT_MAX_METADATA_BYTES;
use strata_store_sqlite::SqliteStoreConfig;
use strata_store_sqlite::SqliteStoreMode;
use strata_store_sqlite::SqliteSyncMode;
use strata_store_sqlite::config::DEFAULT_BUSY_TIMEOUT_MS;
use strata_store_sqlite::config::DEFAULT_DATA_DIR;
use strata_store_sqlite::config::DEFAULT_STATEMENT_CACHE_CAPACITY;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "strata.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "STRATA_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum busy timeout in milliseconds.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Maximum prepared statement cache capacity.
pub(crate) const MAX_STATEMENT_CACHE_CAPACITY: usize = 4_096;
/// Maximum statements per action.
pub(crate) const MAX_STATEMENTS_PER_ACTION: usize = 1_024;
/// Maximum records per batch.
pub(crate) const MAX_BATCH_RECORDS: usize = 65_536;
/// Minimum metadata payload limit in bytes.
pub(crate) const MIN_METADATA_BYTES: usize = 1024;
/// Maximum metadata payload limit in bytes.
pub(crate) const MAX_METADATA_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Strata configuration root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrataConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Engine limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl StrataConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: `path`, then `STRATA_CONFIG`, then `strata.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.limits.validate()
    }

    /// Returns the `SQLite` store configuration.
    #[must_use]
    pub fn store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            data_dir: self.storage.data_dir.clone(),
            busy_timeout_ms: self.storage.busy_timeout_ms,
            journal_mode: self.storage.journal_mode,
            sync_mode: self.storage.sync_mode,
            statement_cache_capacity: self.storage.statement_cache_capacity,
        }
    }

    /// Returns the engine limits.
    #[must_use]
    pub const fn engine_limits(&self) -> EngineLimits {
        EngineLimits {
            max_statements_per_action: self.limits.max_statements_per_action,
            max_batch_records: self.limits.max_batch_records,
            max_metadata_bytes: self.limits.max_metadata_bytes,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the master store and dataset stores.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Prepared statement cache capacity per store.
    #[serde(default = "default_statement_cache_capacity")]
    pub statement_cache_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            statement_cache_capacity: default_statement_cache_capacity(),
        }
    }
}

impl StorageConfig {
    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_data_dir(&self.data_dir)?;
        if !(1 ..= MAX_BUSY_TIMEOUT_MS).contains(&self.busy_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "storage.busy_timeout_ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        if !(1 ..= MAX_STATEMENT_CACHE_CAPACITY).contains(&self.statement_cache_capacity) {
            return Err(ConfigError::Invalid(format!(
                "storage.statement_cache_capacity must be between 1 and \
                 {MAX_STATEMENT_CACHE_CAPACITY}"
            )));
        }
        Ok(())
    }
}

/// Engine limit configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitsConfig {
    /// Maximum statements in one action.
    #[serde(default = "default_max_statements_per_action")]
    pub max_statements_per_action: usize,
    /// Maximum records in one batch execution.
    #[serde(default = "default_max_batch_records")]
    pub max_batch_records: usize,
    /// Maximum encoded size of one metadata payload in bytes.
    #[serde(default = "default_max_metadata_bytes")]
    pub max_metadata_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_statements_per_action: default_max_statements_per_action(),
            max_batch_records: default_max_batch_records(),
            max_metadata_bytes: default_max_metadata_bytes(),
        }
    }
}

impl LimitsConfig {
    /// Validates limit ranges.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range(
            "limits.max_statements_per_action",
            self.max_statements_per_action,
            1,
            MAX_STATEMENTS_PER_ACTION,
        )?;
        validate_range("limits.max_batch_records", self.max_batch_records, 1, MAX_BATCH_RECORDS)?;
        validate_range(
            "limits.max_metadata_bytes",
            self.max_metadata_bytes,
            MIN_METADATA_BYTES,
            MAX_METADATA_BYTES,
        )
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default data directory.
fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

/// Default busy timeout in milliseconds.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default prepared statement cache capacity.
const fn default_statement_cache_capacity() -> usize {
    DEFAULT_STATEMENT_CACHE_CAPACITY
}

/// Default statements per action.
const fn default_max_statements_per_action() -> usize {
    DEFAULT_MAX_STATEMENTS_PER_ACTION
}

/// Default records per batch.
const fn default_max_batch_records() -> usize {
    DEFAULT_MAX_BATCH_RECORDS
}

/// Default metadata payload limit.
const fn default_max_metadata_bytes() -> usize {
    DEFAULT_MAX_METADATA_BYTES
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates the storage data directory.
fn validate_data_dir(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.data_dir must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("storage.data_dir exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("storage.data_dir component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates that `value` lies within `[min, max]`.
fn validate_range(field: &str, value: usize, min: usize, max: usize) -> Result<(), ConfigError> {
    if !(min ..= max).contains(&value) {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}
