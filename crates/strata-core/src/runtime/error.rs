// crates/strata-core/src/runtime/error.rs
// ============================================================================
// Module: Strata Engine Errors
// Description: Error taxonomy for dataset and engine operations.
// Purpose: Give callers stable, programmatic failure categories.
// Dependencies: thiserror, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Every public runtime operation returns [`EngineError`]. Declaration
//! failures never leave store mutations behind, execution failures are rolled
//! back before they surface, and infrastructure failures outside action
//! execution surface as [`EngineError::Store`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::IdentifierError;
use crate::core::metadata::MetadataError;
use crate::core::schema::DeclarationError;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dataset engine errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Dataset, table, or action does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Dataset, table, or action already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// Caller is not permitted to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Table or action declaration was rejected.
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
    /// Execution inputs were rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// An action statement failed and the action was rolled back.
    #[error("action {action} failed at statement {statement_index}: {message}")]
    ExecutionFailed {
        /// Action name.
        action: String,
        /// Zero-based index of the failing statement.
        statement_index: usize,
        /// Failure description.
        message: String,
    },
    /// Persisted metadata cannot be decoded or is inconsistent.
    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),
    /// Store failure outside action execution.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Dataset or engine was closed.
    #[error("closed: {0}")]
    Closed(String),
}

impl From<DeclarationError> for EngineError {
    fn from(err: DeclarationError) -> Self {
        Self::InvalidDeclaration(err.to_string())
    }
}

impl From<IdentifierError> for EngineError {
    fn from(err: IdentifierError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<MetadataError> for EngineError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Corrupt(message) => Self::CorruptMetadata(message),
            MetadataError::Encode(message) => Self::InvalidDeclaration(message),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Folds errors gathered while closing resources into one result.
pub(crate) fn collect_close_errors<E: Into<EngineError>>(mut errors: Vec<E>) -> Result<(), EngineError> {
    if errors.len() > 1 {
        let joined = errors
            .into_iter()
            .map(|err| {
                let err: EngineError = err.into();
                err.to_string()
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(EngineError::Store(StoreError::Io(joined)));
    }
    errors.pop().map_or(Ok(()), |err| Err(err.into()))
}
