// crates/strata-core/src/core/value.rs
// ============================================================================
// Module: Strata Values
// Description: Closed scalar value set and column data types.
// Purpose: Define the deterministic values that cross the store boundary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`Value`] is the only currency exchanged with the relational store: action
//! inputs, bound parameters, attribute literals, and result cells. The set is
//! closed and excludes floating point so that every replica computes the same
//! bytes. Coercion into a [`DataType`] is defined per variant and is applied
//! exactly once, when a table is declared.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Data Types
// ============================================================================

/// Column data types supported by table declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Column that only ever holds `NULL`.
    Null,
    /// UTF-8 text column.
    Text,
    /// 64-bit signed integer column.
    Int,
}

impl DataType {
    /// Returns the `SQL` type name emitted in DDL.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Text => "TEXT",
            Self::Int => "INTEGER",
        }
    }

    /// Returns a stable label for the data type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text => "text",
            Self::Int => "int",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when coercing or converting values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Value cannot be represented in the requested type.
    #[error("cannot coerce {found} value to {expected}")]
    Coercion {
        /// Requested data type label.
        expected: &'static str,
        /// Label of the value that was supplied.
        found: &'static str,
    },
}

// ============================================================================
// SECTION: Values
// ============================================================================

/// Scalar value exchanged with the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Int(i64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns a stable label for the value variant.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Returns true when the value is `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Coerces the value into the given column type.
    ///
    /// `NULL` is never coerced implicitly; callers decide whether a null
    /// literal is acceptable for the column.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Coercion`] when the value has no representation
    /// in `data_type`.
    pub fn coerce_to(&self, data_type: DataType) -> Result<Self, ValueError> {
        match data_type {
            DataType::Null => match self {
                Self::Null => Ok(Self::Null),
                other => Err(coercion_error(DataType::Null.as_str(), other)),
            },
            DataType::Int => self.coerce_int().map(Self::Int),
            DataType::Text => match self {
                Self::Text(value) => Ok(Self::Text(value.clone())),
                Self::Int(value) => Ok(Self::Text(value.to_string())),
                other => Err(coercion_error(DataType::Text.as_str(), other)),
            },
        }
    }

    /// Coerces the value into a 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Coercion`] when the value is not an integer or a
    /// text value holding a base-10 integer.
    pub fn coerce_int(&self) -> Result<i64, ValueError> {
        match self {
            Self::Int(value) => Ok(*value),
            Self::Text(value) => {
                value.trim().parse::<i64>().map_err(|_| coercion_error("int", self))
            }
            other => Err(coercion_error("int", other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(value) => value.fmt(f),
            Self::Text(value) => value.fmt(f),
            Self::Blob(value) => write!(f, "<{} bytes>", value.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Builds a coercion error for the provided target label and value.
const fn coercion_error(expected: &'static str, found: &Value) -> ValueError {
    ValueError::Coercion {
        expected,
        found: found.type_name(),
    }
}
