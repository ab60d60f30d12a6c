// crates/strata-core/src/core/metadata.rs
// ============================================================================
// Module: Strata Metadata Codec
// Description: Versioned, canonical encoding of table and action declarations.
// Purpose: Persist declarations so every replica can rebuild identical state.
// Dependencies: serde, serde_json, crate::core::{hashing, schema}
// ============================================================================

//! ## Overview
//! Declarations are stored as [`MetadataRecord`]s: a name, a kind, a format
//! version, and a canonical JSON payload. Encoding always writes the latest
//! version. Decoding dispatches on kind and version through closed sum types,
//! migrating older payloads forward; anything unrecognized is corrupt.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::canonical_json_bytes;
use crate::core::schema::Action;
use crate::core::schema::Attribute;
use crate::core::schema::AttributeKind;
use crate::core::schema::Column;
use crate::core::schema::Index;
use crate::core::schema::Table;
use crate::core::value::DataType;
use crate::core::value::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current table payload version.
pub const TABLE_PAYLOAD_VERSION: i64 = 2;

/// Current action payload version.
pub const ACTION_PAYLOAD_VERSION: i64 = 1;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Kind of a persisted declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    /// Table declaration.
    Table,
    /// Action declaration.
    Action,
}

impl MetadataKind {
    /// Returns the stable label stored in the `kind` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Action => "action",
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted declaration row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Declaration name.
    pub name: String,
    /// Declaration kind.
    pub kind: MetadataKind,
    /// Payload format version.
    pub version: i64,
    /// Canonical JSON payload bytes.
    pub payload: Vec<u8>,
}

/// Decoded declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// Table declaration.
    Table(Table),
    /// Action declaration.
    Action(Action),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Metadata codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// Stored record cannot be decoded.
    #[error("corrupt metadata: {0}")]
    Corrupt(String),
    /// Declaration cannot be encoded.
    #[error("metadata encoding failed: {0}")]
    Encode(String),
}

// ============================================================================
// SECTION: Versioned Payloads
// ============================================================================

/// Legacy column attribute with a stringly-typed argument.
#[derive(Debug, Clone, Deserialize)]
struct AttributeV1 {
    /// Attribute discriminant.
    kind: AttributeKind,
    /// Attribute argument as text, absent for flag attributes.
    value: Option<String>,
}

/// Legacy column declaration.
#[derive(Debug, Clone, Deserialize)]
struct ColumnV1 {
    /// Column name.
    name: String,
    /// Column data type.
    data_type: DataType,
    /// Legacy attributes.
    attributes: Vec<AttributeV1>,
}

/// Legacy table declaration.
#[derive(Debug, Clone, Deserialize)]
struct TableV1 {
    /// Table name.
    name: String,
    /// Legacy columns.
    columns: Vec<ColumnV1>,
    /// Index declarations, unchanged since version 1.
    indexes: Vec<Index>,
}

/// Table payload versions.
enum TablePayload {
    /// Attribute arguments stored as optional strings.
    V1(TableV1),
    /// Attribute arguments stored as typed values.
    V2(Table),
}

impl TablePayload {
    /// Parses the payload for a stored version.
    fn decode(version: i64, bytes: &[u8]) -> Result<Self, MetadataError> {
        match version {
            1 => serde_json::from_slice(bytes).map(Self::V1).map_err(corrupt),
            2 => serde_json::from_slice(bytes).map(Self::V2).map_err(corrupt),
            other => Err(MetadataError::Corrupt(format!("unknown table payload version {other}"))),
        }
    }

    /// Migrates the payload to the current table declaration.
    fn into_latest(self) -> Result<Table, MetadataError> {
        match self {
            Self::V2(table) => Ok(table),
            Self::V1(legacy) => migrate_table_v1(legacy),
        }
    }
}

/// Action payload versions.
enum ActionPayload {
    /// Initial action layout.
    V1(Action),
}

impl ActionPayload {
    /// Parses the payload for a stored version.
    fn decode(version: i64, bytes: &[u8]) -> Result<Self, MetadataError> {
        match version {
            1 => serde_json::from_slice(bytes).map(Self::V1).map_err(corrupt),
            other => Err(MetadataError::Corrupt(format!("unknown action payload version {other}"))),
        }
    }

    /// Returns the current action declaration.
    fn into_latest(self) -> Action {
        match self {
            Self::V1(action) => action,
        }
    }
}

/// Rebuilds a typed table from a version 1 payload.
///
/// Text arguments are re-coerced through table normalization.
fn migrate_table_v1(legacy: TableV1) -> Result<Table, MetadataError> {
    let mut columns = Vec::with_capacity(legacy.columns.len());
    for column in legacy.columns {
        let mut attributes = Vec::with_capacity(column.attributes.len());
        for attribute in column.attributes {
            attributes.push(migrate_attribute_v1(&column.name, attribute)?);
        }
        columns.push(Column {
            name: column.name,
            data_type: column.data_type,
            attributes,
        });
    }
    let table = Table {
        name: legacy.name,
        columns,
        indexes: legacy.indexes,
    };
    table.normalize().map_err(|err| MetadataError::Corrupt(format!("legacy table: {err}")))
}

/// Converts one legacy attribute.
fn migrate_attribute_v1(column: &str, attribute: AttributeV1) -> Result<Attribute, MetadataError> {
    let text = attribute.value.map_or(Value::Null, Value::Text);
    let requires_value = |value: Value| {
        if value.is_null() {
            Err(MetadataError::Corrupt(format!(
                "legacy {} attribute on {column} has no value",
                attribute.kind
            )))
        } else {
            Ok(value)
        }
    };
    Ok(match attribute.kind {
        AttributeKind::PrimaryKey => Attribute::PrimaryKey,
        AttributeKind::Unique => Attribute::Unique,
        AttributeKind::NotNull => Attribute::NotNull,
        AttributeKind::Default => Attribute::Default(text),
        AttributeKind::Min => Attribute::Min(requires_value(text)?),
        AttributeKind::Max => Attribute::Max(requires_value(text)?),
        AttributeKind::MinLength => Attribute::MinLength(requires_value(text)?),
        AttributeKind::MaxLength => Attribute::MaxLength(requires_value(text)?),
    })
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Encodes a table declaration at the current version.
///
/// # Errors
///
/// Returns [`MetadataError::Encode`] when canonicalization fails.
pub fn encode_table(table: &Table) -> Result<MetadataRecord, MetadataError> {
    Ok(MetadataRecord {
        name: table.name.clone(),
        kind: MetadataKind::Table,
        version: TABLE_PAYLOAD_VERSION,
        payload: canonical_json_bytes(table).map_err(|err| MetadataError::Encode(err.to_string()))?,
    })
}

/// Encodes an action declaration at the current version.
///
/// # Errors
///
/// Returns [`MetadataError::Encode`] when canonicalization fails.
pub fn encode_action(action: &Action) -> Result<MetadataRecord, MetadataError> {
    Ok(MetadataRecord {
        name: action.name.clone(),
        kind: MetadataKind::Action,
        version: ACTION_PAYLOAD_VERSION,
        payload: canonical_json_bytes(action)
            .map_err(|err| MetadataError::Encode(err.to_string()))?,
    })
}

/// Decodes a stored record into its current declaration form.
///
/// # Errors
///
/// Returns [`MetadataError::Corrupt`] when the version is unknown, the payload
/// does not parse, a legacy payload cannot be migrated, or the payload names a
/// different declaration than the record.
pub fn decode(record: &MetadataRecord) -> Result<Declaration, MetadataError> {
    let (declaration, name) = match record.kind {
        MetadataKind::Table => {
            let table = TablePayload::decode(record.version, &record.payload)?.into_latest()?;
            let name = table.name.clone();
            (Declaration::Table(table), name)
        }
        MetadataKind::Action => {
            let action = ActionPayload::decode(record.version, &record.payload)?.into_latest();
            let name = action.name.clone();
            (Declaration::Action(action), name)
        }
    };
    if name != record.name {
        return Err(MetadataError::Corrupt(format!(
            "{} record {} holds payload for {name}",
            record.kind, record.name
        )));
    }
    Ok(declaration)
}

/// Maps a payload parse failure to a corruption error.
fn corrupt(err: serde_json::Error) -> MetadataError {
    MetadataError::Corrupt(err.to_string())
}
