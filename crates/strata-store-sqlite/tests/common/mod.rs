// crates/strata-store-sqlite/tests/common/mod.rs
// =============================================================================
// Module: SQLite Test Helpers
// Description: Shared fixtures for SQLite store and engine tests.
// Purpose: Build temp-dir configs and blog declarations.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::path::Path;

use strata_core::Action;
use strata_core::Attribute;
use strata_core::Column;
use strata_core::DataType;
use strata_core::Inputs;
use strata_core::Table;
use strata_core::TxContext;
use strata_core::Value;
use strata_store_sqlite::SqliteStoreConfig;

/// Owner used by engine fixtures.
pub const OWNER: &str = "0xowner";

/// Returns a store config rooted under `dir`.
pub fn config_in(dir: &Path) -> SqliteStoreConfig {
    SqliteStoreConfig::new(dir.join("data"))
}

/// Returns the owner's transaction context.
pub fn owner_ctx() -> TxContext {
    TxContext::new(OWNER)
}

/// Returns the blog `posts` table.
pub fn posts_table() -> Table {
    Table {
        name: "posts".to_string(),
        columns: vec![
            Column::new("id", DataType::Int).with(Attribute::PrimaryKey),
            Column::new("title", DataType::Text)
                .with(Attribute::NotNull)
                .with(Attribute::MaxLength(Value::Int(300))),
        ],
        indexes: Vec::new(),
    }
}

/// Returns an action with the given visibility and statements.
pub fn action(name: &str, public: bool, inputs: &[&str], statements: &[&str]) -> Action {
    Action {
        name: name.to_string(),
        inputs: inputs.iter().map(ToString::to_string).collect(),
        public,
        statements: statements.iter().map(ToString::to_string).collect(),
    }
}

/// Returns the private `add_post` action that assigns the next id.
pub fn add_post() -> Action {
    action(
        "add_post",
        false,
        &["$title"],
        &["INSERT INTO posts (id, title) VALUES ((SELECT COALESCE(MAX(id), 0) + 1 FROM posts), \
           $title) RETURNING id, title"],
    )
}

/// Returns single-input arguments.
pub fn title(value: &str) -> Inputs {
    Inputs::from([("title".to_string(), Value::Text(value.to_string()))])
}
