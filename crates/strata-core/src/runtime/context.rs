// crates/strata-core/src/runtime/context.rs
// ============================================================================
// Module: Strata Execution Context
// Description: Caller identity and action input handling.
// Purpose: Validate inputs and assemble statement arguments for execution.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! A [`TxContext`] carries the already-authenticated caller identity. Action
//! inputs arrive as [`Inputs`] keyed with or without the `$` sigil; they are
//! checked against the action declaration before any store access, then
//! merged with the reserved contextual variables into [`NamedArgs`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DatasetId;
use crate::core::schema::Action;
use crate::core::schema::CONTEXT_SIGIL;
use crate::core::schema::INPUT_SIGIL;
use crate::core::schema::RESERVED_VARIABLES;
use crate::core::value::Value;
use crate::interfaces::NamedArgs;
use crate::runtime::error::EngineError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Action inputs keyed by input name, with or without the `$` sigil.
pub type Inputs = BTreeMap<String, Value>;

/// Transaction context supplied by the caller.
///
/// # Invariants
/// - `caller` is authenticated upstream; an empty caller is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxContext {
    /// Caller identity.
    pub caller: String,
}

impl TxContext {
    /// Creates a context for the given caller.
    #[must_use]
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
        }
    }

    /// Creates an anonymous context.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns true when the caller is anonymous.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.caller.is_empty()
    }
}

// ============================================================================
// SECTION: Input Handling
// ============================================================================

/// Validates inputs against an action and strips sigils from their keys.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] when a key is reserved, undeclared,
/// repeated after normalization, or a declared input is missing.
pub fn normalize_inputs(action: &Action, inputs: &Inputs) -> Result<Inputs, EngineError> {
    let mut normalized = Inputs::new();
    for (key, value) in inputs {
        let name = key.strip_prefix(INPUT_SIGIL).unwrap_or(key);
        if RESERVED_VARIABLES.contains(&name) {
            return Err(EngineError::InvalidInput(format!("input {name} is reserved")));
        }
        if !action.declares_input(name) {
            return Err(EngineError::InvalidInput(format!(
                "action {} does not declare input {name}",
                action.name
            )));
        }
        if normalized.insert(name.to_string(), value.clone()).is_some() {
            return Err(EngineError::InvalidInput(format!("input {name} supplied twice")));
        }
    }
    if let Some(missing) = action.inputs.iter().find(|input| !normalized.contains_key(*input)) {
        return Err(EngineError::InvalidInput(format!(
            "action {} requires input {missing}",
            action.name
        )));
    }
    Ok(normalized)
}

/// Builds statement arguments from normalized inputs and the context.
#[must_use]
pub fn bind_arguments(
    ctx: &TxContext,
    action: &Action,
    dataset: &DatasetId,
    inputs: &Inputs,
) -> NamedArgs {
    let mut args: NamedArgs = inputs
        .iter()
        .map(|(name, value)| (format!("{INPUT_SIGIL}{name}"), value.clone()))
        .collect();
    let caller = if ctx.is_anonymous() { Value::Null } else { Value::Text(ctx.caller.clone()) };
    let context = [
        ("caller", caller),
        ("action", Value::Text(action.name.clone())),
        ("dataset", Value::Text(dataset.as_str().to_string())),
    ];
    for (name, value) in context {
        args.insert(format!("{CONTEXT_SIGIL}{name}"), value);
    }
    args
}
