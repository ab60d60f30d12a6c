// crates/strata-config/src/lib.rs
// ============================================================================
// Module: Strata Config Library
// Description: Canonical config model and validation for Strata.
// Purpose: Single source of truth for strata.toml semantics.
// Dependencies: strata-core, strata-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `strata-config` defines the configuration model for a Strata engine. It
//! parses `strata.toml`, validates it fail-closed, and produces the
//! [`strata_store_sqlite::SqliteStoreConfig`] and
//! [`strata_core::EngineLimits`] used to open an engine.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
