// crates/strata-store-sqlite/src/lib.rs
// ============================================================================
// Module: Strata SQLite Store
// Description: SQLite-backed relational stores for the Strata engine.
// Purpose: Provide durable single-writer storage for datasets and the directory.
// Dependencies: strata-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate implements [`strata_core::RelationalStore`] over one `SQLite`
//! connection per store and [`strata_core::StoreProvider`] over a data
//! directory holding `master.sqlite` and one file per dataset under
//! `datasets/`. [`open_engine`] wires both into a ready engine.
//!
//! Security posture: statement text and arguments are untrusted; arguments
//! are always bound, never interpolated.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod provider;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::SqliteStoreConfig;
pub use config::SqliteStoreMode;
pub use config::SqliteSyncMode;
pub use provider::SqliteEngine;
pub use provider::SqliteStoreProvider;
pub use provider::open_engine;
pub use store::SqliteStore;
pub use store::SqliteStoreError;
