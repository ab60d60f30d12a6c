// crates/strata-core/src/core/mod.rs
// ============================================================================
// Module: Strata Core Types
// Description: Canonical dataset schema, value, and metadata structures.
// Purpose: Provide stable, serializable types shared by every replica.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Strata core types define table and action declarations, the closed scalar
//! value set, dataset identifiers, the DDL generator, and the versioned
//! metadata codec. These types are the canonical source of truth for what a
//! replica persists and replays.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod ddl;
pub mod hashing;
pub mod identifiers;
pub mod metadata;
pub mod schema;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ddl::generate_ddl;
pub use ddl::quote_identifier;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::DATASET_ID_LENGTH;
pub use identifiers::DatasetId;
pub use identifiers::IdentifierError;
pub use metadata::ACTION_PAYLOAD_VERSION;
pub use metadata::Declaration;
pub use metadata::MetadataError;
pub use metadata::MetadataKind;
pub use metadata::MetadataRecord;
pub use metadata::TABLE_PAYLOAD_VERSION;
pub use schema::Action;
pub use schema::Attribute;
pub use schema::AttributeKind;
pub use schema::CONTEXT_SIGIL;
pub use schema::Column;
pub use schema::DeclarationError;
pub use schema::Index;
pub use schema::INPUT_SIGIL;
pub use schema::IndexKind;
pub use schema::MAX_IDENTIFIER_LENGTH;
pub use schema::RESERVED_VARIABLES;
pub use schema::Table;
pub use value::DataType;
pub use value::Value;
pub use value::ValueError;
