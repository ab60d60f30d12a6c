// crates/strata-core/src/core/schema.rs
// ============================================================================
// Module: Strata Schema
// Description: Table, column, index, and action declarations.
// Purpose: Normalize user declarations into their canonical, coerced form.
// Dependencies: serde, thiserror, crate::core::value
// ============================================================================

//! ## Overview
//! Declarations arrive from untrusted callers and are normalized exactly once
//! before anything touches a store. Normalization lowercases identifiers,
//! coerces attribute literals into their column types, and enforces the
//! structural rules of a table or action. A normalized declaration is what
//! gets persisted, so replaying it yields the same DDL on every replica.
//!
//! Security posture: every identifier is validated against a strict bare
//! identifier grammar before it can reach generated SQL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::value::DataType;
use crate::core::value::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a table, column, index, action, or input name.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Contextual variables injected into every action execution as `@name`.
pub const RESERVED_VARIABLES: [&str; 3] = ["caller", "action", "dataset"];

/// Prefix reserved by the relational engine for its own objects.
const ENGINE_RESERVED_PREFIX: &str = "sqlite_";

/// Sigil marking an action input parameter.
pub const INPUT_SIGIL: char = '$';

/// Sigil marking a reserved contextual variable.
pub const CONTEXT_SIGIL: char = '@';

/// Leading keywords an action statement may start with.
///
/// Transaction control and schema changes are excluded so a statement can
/// never end or escape the savepoint that scopes an execution.
pub const ACTION_STATEMENT_KEYWORDS: [&str; 7] =
    ["SELECT", "INSERT", "UPDATE", "DELETE", "REPLACE", "WITH", "VALUES"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when a declaration violates the schema rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// Identifier failed validation.
    #[error("invalid identifier: {0}")]
    Identifier(String),
    /// Column attribute failed coercion or validation.
    #[error("invalid attribute on column {column}: {reason}")]
    Attribute {
        /// Column carrying the attribute.
        column: String,
        /// Failure description.
        reason: String,
    },
    /// Table structure failed validation.
    #[error("invalid table: {0}")]
    Table(String),
    /// Action structure failed validation.
    #[error("invalid action: {0}")]
    Action(String),
}

// ============================================================================
// SECTION: Attributes
// ============================================================================

/// Attribute discriminant, ordered by DDL clause position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Primary key constraint.
    PrimaryKey,
    /// Default literal.
    Default,
    /// Not-null constraint.
    NotNull,
    /// Uniqueness constraint.
    Unique,
    /// Inclusive lower bound on an integer column.
    Min,
    /// Inclusive upper bound on an integer column.
    Max,
    /// Inclusive lower bound on text length.
    MinLength,
    /// Inclusive upper bound on text length.
    MaxLength,
}

impl AttributeKind {
    /// Returns a stable label for the attribute kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryKey => "primary_key",
            Self::Default => "default",
            Self::NotNull => "not_null",
            Self::Unique => "unique",
            Self::Min => "min",
            Self::Max => "max",
            Self::MinLength => "min_length",
            Self::MaxLength => "max_length",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column attribute with its literal argument, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Attribute {
    /// Primary key constraint.
    PrimaryKey,
    /// Uniqueness constraint.
    Unique,
    /// Not-null constraint.
    NotNull,
    /// Default literal, coerced to the column type.
    Default(Value),
    /// Inclusive lower bound, coerced to an integer.
    Min(Value),
    /// Inclusive upper bound, coerced to an integer.
    Max(Value),
    /// Inclusive minimum text length, coerced to an integer.
    MinLength(Value),
    /// Inclusive maximum text length, coerced to an integer.
    MaxLength(Value),
}

impl Attribute {
    /// Returns the attribute discriminant.
    #[must_use]
    pub const fn kind(&self) -> AttributeKind {
        match self {
            Self::PrimaryKey => AttributeKind::PrimaryKey,
            Self::Unique => AttributeKind::Unique,
            Self::NotNull => AttributeKind::NotNull,
            Self::Default(_) => AttributeKind::Default,
            Self::Min(_) => AttributeKind::Min,
            Self::Max(_) => AttributeKind::Max,
            Self::MinLength(_) => AttributeKind::MinLength,
            Self::MaxLength(_) => AttributeKind::MaxLength,
        }
    }

    /// Returns the literal argument, if the attribute carries one.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::PrimaryKey | Self::Unique | Self::NotNull => None,
            Self::Default(value)
            | Self::Min(value)
            | Self::Max(value)
            | Self::MinLength(value)
            | Self::MaxLength(value) => Some(value),
        }
    }

    /// Coerces the literal argument for a column of `data_type`.
    ///
    /// `not_null` reports whether the owning column carries [`Attribute::NotNull`].
    fn coerce(&self, column: &str, data_type: DataType, not_null: bool) -> Result<Self, DeclarationError> {
        let fail = |reason: String| DeclarationError::Attribute {
            column: column.to_string(),
            reason,
        };
        match self {
            Self::PrimaryKey => Ok(Self::PrimaryKey),
            Self::Unique => Ok(Self::Unique),
            Self::NotNull => Ok(Self::NotNull),
            Self::Default(Value::Null) => {
                if not_null {
                    Err(fail("default null on a not-null column".to_string()))
                } else {
                    Ok(Self::Default(Value::Null))
                }
            }
            Self::Default(value) => value
                .coerce_to(data_type)
                .map(Self::Default)
                .map_err(|err| fail(format!("default: {err}"))),
            Self::Min(value) => coerce_bound(value).map(Self::Min).map_err(fail),
            Self::Max(value) => coerce_bound(value).map(Self::Max).map_err(fail),
            Self::MinLength(value) => coerce_length(value).map(Self::MinLength).map_err(fail),
            Self::MaxLength(value) => coerce_length(value).map(Self::MaxLength).map_err(fail),
        }
    }
}

/// Coerces a range bound literal to an integer value.
fn coerce_bound(value: &Value) -> Result<Value, String> {
    value.coerce_int().map(Value::Int).map_err(|err| err.to_string())
}

/// Coerces a length literal to a non-negative integer value.
fn coerce_length(value: &Value) -> Result<Value, String> {
    let length = value.coerce_int().map_err(|err| err.to_string())?;
    if length < 0 {
        return Err(format!("length must be non-negative, got {length}"));
    }
    Ok(Value::Int(length))
}

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Column declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub data_type: DataType,
    /// Column attributes.
    pub attributes: Vec<Attribute>,
}

impl Column {
    /// Creates a column without attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute to the column.
    #[must_use]
    pub fn with(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Returns the attribute of the given kind, if present.
    #[must_use]
    pub fn attribute(&self, kind: AttributeKind) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.kind() == kind)
    }

    /// Returns true when the column carries the given attribute kind.
    #[must_use]
    pub fn has(&self, kind: AttributeKind) -> bool {
        self.attribute(kind).is_some()
    }

    /// Normalizes the column name and coerces every attribute.
    fn normalize(&self) -> Result<Self, DeclarationError> {
        let name = normalize_identifier("column", &self.name)?;
        let mut seen = BTreeSet::new();
        for attribute in &self.attributes {
            if !seen.insert(attribute.kind()) {
                return Err(DeclarationError::Attribute {
                    column: name,
                    reason: format!("duplicate attribute {}", attribute.kind()),
                });
            }
        }
        let not_null = self.has(AttributeKind::NotNull);
        let attributes = self
            .attributes
            .iter()
            .map(|attribute| attribute.coerce(&name, self.data_type, not_null))
            .collect::<Result<Vec<_>, _>>()?;
        let column = Self {
            name,
            data_type: self.data_type,
            attributes,
        };
        column.check_ranges()?;
        Ok(column)
    }

    /// Ensures coerced lower bounds do not exceed upper bounds.
    fn check_ranges(&self) -> Result<(), DeclarationError> {
        let pairs = [
            (AttributeKind::Min, AttributeKind::Max),
            (AttributeKind::MinLength, AttributeKind::MaxLength),
        ];
        for (low_kind, high_kind) in pairs {
            let low = self.attribute(low_kind).and_then(Attribute::value).and_then(Value::as_int);
            let high = self.attribute(high_kind).and_then(Attribute::value).and_then(Value::as_int);
            if let (Some(low), Some(high)) = (low, high)
                && low > high
            {
                return Err(DeclarationError::Attribute {
                    column: self.name.clone(),
                    reason: format!("{low_kind} {low} exceeds {high_kind} {high}"),
                });
            }
        }
        Ok(())
    }
}

/// Index kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Plain B-tree index.
    BTree,
    /// Unique B-tree index.
    UniqueBTree,
}

/// Index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed column names, in key order.
    pub columns: Vec<String>,
    /// Index kind.
    pub kind: IndexKind,
}

impl Index {
    /// Normalizes the index and checks its columns against `table_columns`.
    fn normalize(&self, table_columns: &BTreeSet<String>) -> Result<Self, DeclarationError> {
        let name = normalize_identifier("index", &self.name)?;
        if self.columns.is_empty() {
            return Err(DeclarationError::Table(format!("index {name} has no columns")));
        }
        let mut seen = BTreeSet::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let column = normalize_identifier("column", column)?;
            if !table_columns.contains(&column) {
                return Err(DeclarationError::Table(format!(
                    "index {name} references unknown column {column}"
                )));
            }
            if !seen.insert(column.clone()) {
                return Err(DeclarationError::Table(format!(
                    "index {name} repeats column {column}"
                )));
            }
            columns.push(column);
        }
        Ok(Self {
            name,
            columns,
            kind: self.kind,
        })
    }
}

/// Table declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Column declarations, in DDL order.
    pub columns: Vec<Column>,
    /// Secondary indexes.
    pub indexes: Vec<Index>,
}

impl Table {
    /// Returns the normalized, coerced form of the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError`] when any identifier, attribute, or
    /// structural rule is violated.
    pub fn normalize(&self) -> Result<Self, DeclarationError> {
        let name = normalize_identifier("table", &self.name)?;
        if self.columns.is_empty() {
            return Err(DeclarationError::Table(format!("table {name} has no columns")));
        }
        let mut column_names = BTreeSet::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let column = column.normalize()?;
            if !column_names.insert(column.name.clone()) {
                return Err(DeclarationError::Table(format!(
                    "table {name} repeats column {}",
                    column.name
                )));
            }
            columns.push(column);
        }
        let primary_keys = columns.iter().filter(|column| column.has(AttributeKind::PrimaryKey)).count();
        if primary_keys != 1 {
            return Err(DeclarationError::Table(format!(
                "table {name} must have exactly one primary key column, found {primary_keys}"
            )));
        }
        let mut index_names = BTreeSet::new();
        let mut indexes = Vec::with_capacity(self.indexes.len());
        for index in &self.indexes {
            let index = index.normalize(&column_names)?;
            if !index_names.insert(index.name.clone()) {
                return Err(DeclarationError::Table(format!(
                    "table {name} repeats index {}",
                    index.name
                )));
            }
            indexes.push(index);
        }
        Ok(Self {
            name,
            columns,
            indexes,
        })
    }

    /// Returns the column with the given name, if present.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Action declaration: an ordered group of parameterized statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Action name.
    pub name: String,
    /// Declared input names, without the `$` sigil once normalized.
    pub inputs: Vec<String>,
    /// Whether callers other than the owner may execute the action.
    pub public: bool,
    /// Statement texts, executed in order.
    pub statements: Vec<String>,
}

impl Action {
    /// Returns the normalized form of the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError`] when the name or inputs are invalid, an
    /// input shadows a reserved variable, the statement list is empty or
    /// longer than `max_statements`, or a statement is blank or does not
    /// start with one of [`ACTION_STATEMENT_KEYWORDS`].
    pub fn normalize(&self, max_statements: usize) -> Result<Self, DeclarationError> {
        let name = normalize_identifier("action", &self.name)?;
        let mut inputs = Vec::with_capacity(self.inputs.len());
        for raw in &self.inputs {
            let input = raw.strip_prefix(INPUT_SIGIL).unwrap_or(raw);
            validate_identifier("input", input)?;
            if RESERVED_VARIABLES.contains(&input) {
                return Err(DeclarationError::Action(format!(
                    "input {input} shadows a reserved variable"
                )));
            }
            if inputs.iter().any(|existing| existing == input) {
                return Err(DeclarationError::Action(format!("duplicate input {input}")));
            }
            inputs.push(input.to_string());
        }
        if self.statements.is_empty() {
            return Err(DeclarationError::Action(format!("action {name} has no statements")));
        }
        if self.statements.len() > max_statements {
            return Err(DeclarationError::Action(format!(
                "action {name} has {} statements, limit is {max_statements}",
                self.statements.len()
            )));
        }
        for (position, statement) in self.statements.iter().enumerate() {
            let keyword = leading_keyword(statement);
            if keyword.is_empty() {
                return Err(DeclarationError::Action(format!(
                    "action {name} statement {position} is blank"
                )));
            }
            if !ACTION_STATEMENT_KEYWORDS.contains(&keyword.as_str()) {
                return Err(DeclarationError::Action(format!(
                    "action {name} statement {position} may not start with {keyword}"
                )));
            }
        }
        Ok(Self {
            name,
            inputs,
            public: self.public,
            statements: self.statements.clone(),
        })
    }

    /// Returns true when `name` is a declared input.
    #[must_use]
    pub fn declares_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|input| input == name)
    }
}

/// Returns the uppercased first keyword of `statement`, skipping whitespace
/// and SQL comments. Empty when the statement holds no keyword.
fn leading_keyword(statement: &str) -> String {
    let mut rest = statement;
    loop {
        rest = rest.trim_start();
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.find('\n').map_or("", |end| &comment[end ..]);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment.find("*/").map_or("", |end| &comment[end + 2 ..]);
        } else {
            break;
        }
    }
    rest.chars().take_while(char::is_ascii_alphabetic).collect::<String>().to_ascii_uppercase()
}

// ============================================================================
// SECTION: Identifier Rules
// ============================================================================

/// Lowercases and validates an identifier.
///
/// # Errors
///
/// Returns [`DeclarationError::Identifier`] when the lowercased identifier is
/// not a bare identifier.
pub fn normalize_identifier(label: &str, raw: &str) -> Result<String, DeclarationError> {
    let lowered = raw.to_lowercase();
    validate_identifier(label, &lowered)?;
    Ok(lowered)
}

/// Validates a bare identifier: `[a-z][a-z0-9_]*`, bounded length, and not
/// in the engine's reserved namespace.
fn validate_identifier(label: &str, value: &str) -> Result<(), DeclarationError> {
    let mut chars = value.chars();
    let well_formed = chars.next().is_some_and(|ch| ch.is_ascii_lowercase())
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
    if !well_formed {
        return Err(DeclarationError::Identifier(format!("{label} name {value:?} is malformed")));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DeclarationError::Identifier(format!(
            "{label} name {value} exceeds {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }
    if value.starts_with(ENGINE_RESERVED_PREFIX) {
        return Err(DeclarationError::Identifier(format!("{label} name {value} is reserved")));
    }
    Ok(())
}
