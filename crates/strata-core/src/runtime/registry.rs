// crates/strata-core/src/runtime/registry.rs
// ============================================================================
// Module: Strata Metadata Registry
// Description: Persistence of declaration metadata inside each store.
// Purpose: Record and reload table and action declarations atomically with DDL.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The registry keeps one row per declaration in the reserved `_metadata`
//! table of the store it describes, keyed by `(name, kind)`. Rows are listed
//! in insertion order so replay recreates catalogs in creation order. The
//! registry never opens its own savepoint; callers write through a
//! [`crate::runtime::Savepoint`] so metadata commits with the DDL it records.
//!
//! Security posture: stored payloads are treated as untrusted on load and
//! are size-bounded before decoding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::metadata;
use crate::core::metadata::Declaration;
use crate::core::metadata::MetadataKind;
use crate::core::metadata::MetadataRecord;
use crate::core::value::Value;
use crate::interfaces::NamedArgs;
use crate::interfaces::RelationalStore;
use crate::interfaces::StoreError;
use crate::runtime::error::EngineError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved metadata table name.
pub const METADATA_TABLE: &str = "_metadata";

/// DDL for the metadata table.
const METADATA_DDL: &str = "CREATE TABLE \"_metadata\" (\"name\" TEXT NOT NULL, \"kind\" TEXT NOT \
                            NULL, \"version\" INTEGER NOT NULL, \"data\" BLOB NOT NULL, UNIQUE \
                            (\"name\", \"kind\"))";

/// Default maximum payload size in bytes.
pub const DEFAULT_MAX_METADATA_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Versioned declaration catalog stored in `_metadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataRegistry {
    /// Maximum accepted payload size in bytes.
    max_metadata_bytes: usize,
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_METADATA_BYTES)
    }
}

impl MetadataRegistry {
    /// Creates a registry with the given payload size limit.
    #[must_use]
    pub const fn new(max_metadata_bytes: usize) -> Self {
        Self {
            max_metadata_bytes,
        }
    }

    /// Creates the metadata table when it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the store cannot be inspected or
    /// updated.
    pub fn ensure<S: RelationalStore + ?Sized>(&self, store: &mut S) -> Result<(), EngineError> {
        if !store.table_exists(METADATA_TABLE)? {
            store.execute(METADATA_DDL, &NamedArgs::new())?;
        }
        Ok(())
    }

    /// Inserts a record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyExists`] when `(name, kind)` is present,
    /// [`EngineError::InvalidDeclaration`] when the payload is oversized, and
    /// [`EngineError::Store`] for other store failures.
    pub fn store<S: RelationalStore + ?Sized>(
        &self,
        store: &mut S,
        record: &MetadataRecord,
    ) -> Result<(), EngineError> {
        if record.payload.len() > self.max_metadata_bytes {
            return Err(EngineError::InvalidDeclaration(format!(
                "{} {} metadata is {} bytes, limit is {}",
                record.kind,
                record.name,
                record.payload.len(),
                self.max_metadata_bytes
            )));
        }
        let args = NamedArgs::from([
            ("$name".to_string(), Value::Text(record.name.clone())),
            ("$kind".to_string(), Value::Text(record.kind.as_str().to_string())),
            ("$version".to_string(), Value::Int(record.version)),
            ("$data".to_string(), Value::Blob(record.payload.clone())),
        ]);
        store
            .execute(
                "INSERT INTO \"_metadata\" (\"name\", \"kind\", \"version\", \"data\") VALUES \
                 ($name, $kind, $version, $data)",
                &args,
            )
            .map_err(|err| match err {
                StoreError::Constraint(_) => EngineError::AlreadyExists(format!(
                    "{} {} is already registered",
                    record.kind, record.name
                )),
                other => EngineError::Store(other),
            })
    }

    /// Reports whether a record with `(name, kind)` exists.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the query fails.
    pub fn contains<S: RelationalStore + ?Sized>(
        &self,
        store: &mut S,
        name: &str,
        kind: MetadataKind,
    ) -> Result<bool, EngineError> {
        let args = NamedArgs::from([
            ("$name".to_string(), Value::Text(name.to_string())),
            ("$kind".to_string(), Value::Text(kind.as_str().to_string())),
        ]);
        let rows = store.query(
            "SELECT 1 FROM \"_metadata\" WHERE \"name\" = $name AND \"kind\" = $kind",
            &args,
        )?;
        Ok(!rows.is_empty())
    }

    /// Lists records of `kind` in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CorruptMetadata`] when a row is malformed or
    /// oversized, and [`EngineError::Store`] when the query fails.
    pub fn list<S: RelationalStore + ?Sized>(
        &self,
        store: &mut S,
        kind: MetadataKind,
    ) -> Result<Vec<MetadataRecord>, EngineError> {
        let args = NamedArgs::from([("$kind".to_string(), Value::Text(kind.as_str().to_string()))]);
        let rows = store.query(
            "SELECT \"name\", \"version\", \"data\" FROM \"_metadata\" WHERE \"kind\" = $kind \
             ORDER BY rowid",
            &args,
        )?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows.rows {
            let record = match row.as_slice() {
                [Value::Text(name), Value::Int(version), Value::Blob(payload)] => MetadataRecord {
                    name: name.clone(),
                    kind,
                    version: *version,
                    payload: payload.clone(),
                },
                _ => {
                    return Err(EngineError::CorruptMetadata(format!(
                        "malformed {kind} metadata row"
                    )));
                }
            };
            if record.payload.len() > self.max_metadata_bytes {
                return Err(EngineError::CorruptMetadata(format!(
                    "{kind} {} metadata exceeds {} bytes",
                    record.name, self.max_metadata_bytes
                )));
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Decodes a stored record into its current declaration form.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CorruptMetadata`] when decoding fails.
    pub fn decode(&self, record: &MetadataRecord) -> Result<Declaration, EngineError> {
        metadata::decode(record).map_err(EngineError::from)
    }
}
