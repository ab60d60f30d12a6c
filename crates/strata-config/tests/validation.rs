//! Storage and limit validation tests for strata-config.
// crates/strata-config/tests/validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate storage and engine limit constraints.
// Purpose: Ensure out-of-range configuration fails closed.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::PathBuf;

use strata_config::ConfigError;
use strata_config::StrataConfig;
use strata_core::EngineLimits;
use strata_store_sqlite::SqliteStoreConfig;
use strata_store_sqlite::SqliteStoreMode;
use strata_store_sqlite::SqliteSyncMode;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

fn minimal_config() -> Result<StrataConfig, String> {
    StrataConfig::from_toml("").map_err(|err| err.to_string())
}

#[test]
fn empty_config_matches_engine_defaults() -> TestResult {
    let config = minimal_config()?;
    if config.engine_limits() != EngineLimits::default() {
        return Err("default limits differ from engine defaults".to_string());
    }
    if config.store_config() != SqliteStoreConfig::default() {
        return Err("default storage differs from store defaults".to_string());
    }
    Ok(())
}

#[test]
fn sections_override_defaults() -> TestResult {
    let config = StrataConfig::from_toml(
        r#"
[storage]
data_dir = "/var/lib/strata"
busy_timeout_ms = 250
journal_mode = "delete"
sync_mode = "normal"
statement_cache_capacity = 16

[limits]
max_statements_per_action = 8
max_batch_records = 32
max_metadata_bytes = 4096
"#,
    )
    .map_err(|err| err.to_string())?;
    let store = config.store_config();
    let expected = SqliteStoreConfig {
        data_dir: PathBuf::from("/var/lib/strata"),
        busy_timeout_ms: 250,
        journal_mode: SqliteStoreMode::Delete,
        sync_mode: SqliteSyncMode::Normal,
        statement_cache_capacity: 16,
    };
    if store != expected {
        return Err(format!("unexpected store config {store:?}"));
    }
    let limits = config.engine_limits();
    if limits.max_statements_per_action != 8
        || limits.max_batch_records != 32
        || limits.max_metadata_bytes != 4096
    {
        return Err(format!("unexpected limits {limits:?}"));
    }
    Ok(())
}

#[test]
fn unknown_journal_mode_is_a_parse_error() -> TestResult {
    match StrataConfig::from_toml("[storage]\njournal_mode = \"memory\"\n") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn storage_rejects_empty_data_dir() -> TestResult {
    let mut config = minimal_config()?;
    config.storage.data_dir = PathBuf::from("  ");
    assert_invalid(config.validate(), "storage.data_dir must be non-empty")
}

#[test]
fn storage_rejects_long_data_dir_component() -> TestResult {
    let mut config = minimal_config()?;
    config.storage.data_dir = PathBuf::from("a".repeat(256));
    assert_invalid(config.validate(), "storage.data_dir component too long")
}

#[test]
fn storage_rejects_zero_busy_timeout() -> TestResult {
    let mut config = minimal_config()?;
    config.storage.busy_timeout_ms = 0;
    assert_invalid(config.validate(), "storage.busy_timeout_ms")
}

#[test]
fn storage_rejects_oversized_statement_cache() -> TestResult {
    let mut config = minimal_config()?;
    config.storage.statement_cache_capacity = 1_000_000;
    assert_invalid(config.validate(), "storage.statement_cache_capacity")
}

#[test]
fn limits_reject_zero_statements() -> TestResult {
    let mut config = minimal_config()?;
    config.limits.max_statements_per_action = 0;
    assert_invalid(config.validate(), "limits.max_statements_per_action")
}

#[test]
fn limits_reject_zero_batch() -> TestResult {
    let mut config = minimal_config()?;
    config.limits.max_batch_records = 0;
    assert_invalid(config.validate(), "limits.max_batch_records")
}

#[test]
fn limits_reject_tiny_metadata_bound() -> TestResult {
    let mut config = minimal_config()?;
    config.limits.max_metadata_bytes = 16;
    assert_invalid(config.validate(), "limits.max_metadata_bytes")
}

#[test]
fn invalid_values_fail_at_parse_time() -> TestResult {
    match StrataConfig::from_toml("[limits]\nmax_batch_records = 0\n") {
        Err(ConfigError::Invalid(message)) if message.contains("limits.max_batch_records") => Ok(()),
        other => Err(format!("expected invalid config, got {other:?}")),
    }
}
