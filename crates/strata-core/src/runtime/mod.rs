// crates/strata-core/src/runtime/mod.rs
// ============================================================================
// Module: Strata Runtime
// Description: Dataset lifecycle, declaration, and atomic action execution.
// Purpose: Drive relational stores through the dataset engine contract.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! Runtime modules implement the engine, the per-dataset aggregate, the
//! metadata registry, and the savepoint guard. Every mutation flows through
//! a [`Savepoint`] so that declarations and executions are all-or-nothing.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod context;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod registry;
pub mod savepoint;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::Inputs;
pub use context::TxContext;
pub use dataset::Dataset;
pub use dataset::DatasetInfo;
pub use engine::DIRECTORY_TABLE;
pub use engine::Engine;
pub use engine::EngineLimits;
pub use error::EngineError;
pub use registry::METADATA_TABLE;
pub use registry::MetadataRegistry;
pub use savepoint::Savepoint;
