// crates/strata-core/src/core/identifiers.rs
// ============================================================================
// Module: Strata Identifiers
// Description: Content-derived dataset identifiers.
// Purpose: Give every replica the same identifier for the same declaration.
// Dependencies: serde, crate::core::hashing
// ============================================================================

//! ## Overview
//! A [`DatasetId`] is derived from a dataset name and its owner with a
//! one-way hash. The name is lowercased before hashing so that dataset names
//! are case-insensitive, while owner identities are hashed verbatim. The
//! string form is `x` followed by the lowercase hex SHA-224 digest, which is
//! also a valid bare SQL identifier and file stem.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::hash_bytes;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Leading character of every dataset identifier.
pub const DATASET_ID_PREFIX: char = 'x';

/// Length of a dataset identifier string (prefix plus 56 hex characters).
pub const DATASET_ID_LENGTH: usize = 57;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when parsing identifiers from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier did not match the canonical format.
    #[error("invalid dataset id: {0}")]
    InvalidDatasetId(String),
}

// ============================================================================
// SECTION: Dataset Identifier
// ============================================================================

/// Deterministic dataset identifier.
///
/// # Invariants
/// - Identical `(name, owner)` pairs always derive identical identifiers.
/// - The string form is exactly [`DATASET_ID_LENGTH`] characters.
/// - Deserialization validates through [`DatasetId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetId(String);

impl DatasetId {
    /// Derives the identifier for a dataset name and owner.
    #[must_use]
    pub fn derive(name: &str, owner: &str) -> Self {
        let mut material = name.to_lowercase().into_bytes();
        material.extend_from_slice(owner.as_bytes());
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &material);
        Self(format!("{DATASET_ID_PREFIX}{}", digest.value))
    }

    /// Parses an identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidDatasetId`] when the value is not a
    /// canonical dataset identifier.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let mut chars = value.chars();
        let well_formed = value.len() == DATASET_ID_LENGTH
            && chars.next() == Some(DATASET_ID_PREFIX)
            && chars.all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch));
        if !well_formed {
            return Err(IdentifierError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DatasetId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DatasetId> for String {
    fn from(id: DatasetId) -> Self {
        id.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
