// crates/strata-core/src/lib.rs
// ============================================================================
// Module: Strata Core Library
// Description: Public API surface for the Strata dataset engine core.
// Purpose: Expose the data model, store interfaces, and runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Strata core is the deterministic dataset execution layer of a replicated
//! database. Each dataset is an isolated namespace of tables and actions,
//! addressed by an identifier derived from its name and owner. The core
//! compiles table declarations into DDL, persists versioned declaration
//! metadata inside the store it describes, and executes actions atomically
//! under savepoints with owner-based access control.
//!
//! The relational engine is reached only through [`RelationalStore`] and
//! [`StoreProvider`], so the core is backend-agnostic.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::NamedArgs;
pub use interfaces::RelationalStore;
pub use interfaces::ResultSet;
pub use interfaces::StatementHandle;
pub use interfaces::StoreError;
pub use interfaces::StoreProvider;
pub use runtime::DIRECTORY_TABLE;
pub use runtime::Dataset;
pub use runtime::DatasetInfo;
pub use runtime::Engine;
pub use runtime::EngineError;
pub use runtime::EngineLimits;
pub use runtime::Inputs;
pub use runtime::METADATA_TABLE;
pub use runtime::MetadataRegistry;
pub use runtime::Savepoint;
pub use runtime::TxContext;
