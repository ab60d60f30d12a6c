// crates/strata-core/src/core/ddl.rs
// ============================================================================
// Module: Strata DDL Generator
// Description: Deterministic compilation of table declarations into DDL.
// Purpose: Produce identical CREATE statements for identical declarations.
// Dependencies: crate::core::{hashing, schema, value}
// ============================================================================

//! ## Overview
//! [`generate_ddl`] is a pure function from a normalized [`Table`] to the
//! ordered list of statements that create it: one `CREATE TABLE` followed by
//! one `CREATE INDEX` per declared index. Column clauses are emitted in a
//! fixed order regardless of the order attributes were declared in.
//!
//! Invariants:
//! - Output depends only on the declaration content.
//! - Unsupported attribute and type combinations fail instead of emitting
//!   SQL the store would interpret differently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::hashing::hex_encode;
use crate::core::schema::Attribute;
use crate::core::schema::Column;
use crate::core::schema::DeclarationError;
use crate::core::schema::IndexKind;
use crate::core::schema::Table;
use crate::core::value::DataType;
use crate::core::value::Value;

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Compiles a normalized table declaration into DDL statements.
///
/// # Errors
///
/// Returns [`DeclarationError`] when an attribute is unsupported for its
/// column type, a literal was not coerced, an attribute repeats, or the table
/// does not have exactly one primary key column.
pub fn generate_ddl(table: &Table) -> Result<Vec<String>, DeclarationError> {
    if table.columns.is_empty() {
        return Err(DeclarationError::Table(format!("table {} has no columns", table.name)));
    }
    let mut primary_keys = 0_usize;
    let mut definitions = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        if column.attributes.iter().any(|attribute| matches!(attribute, Attribute::PrimaryKey)) {
            primary_keys += 1;
        }
        definitions.push(column_definition(column)?);
    }
    if primary_keys != 1 {
        return Err(DeclarationError::Table(format!(
            "table {} must have exactly one primary key column, found {primary_keys}",
            table.name
        )));
    }

    let table_name = quote_identifier(&table.name);
    let mut statements = Vec::with_capacity(1 + table.indexes.len());
    statements.push(format!("CREATE TABLE {table_name} ({})", definitions.join(", ")));
    for index in &table.indexes {
        let unique = match index.kind {
            IndexKind::BTree => "",
            IndexKind::UniqueBTree => "UNIQUE ",
        };
        let columns =
            index.columns.iter().map(|column| quote_identifier(column)).collect::<Vec<_>>().join(", ");
        statements.push(format!(
            "CREATE {unique}INDEX {} ON {table_name} ({columns})",
            quote_identifier(&index.name)
        ));
    }
    Ok(statements)
}

/// Quotes an identifier for inclusion in generated SQL.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ============================================================================
// SECTION: Column Clauses
// ============================================================================

/// Emits one column definition with its clauses in canonical order.
fn column_definition(column: &Column) -> Result<String, DeclarationError> {
    let mut attributes: Vec<&Attribute> = column.attributes.iter().collect();
    attributes.sort_by_key(|attribute| attribute.kind());
    if let Some(pair) = attributes.windows(2).find(|pair| pair[0].kind() == pair[1].kind()) {
        return Err(unsupported(column, format!("duplicate attribute {}", pair[0].kind())));
    }

    let name = quote_identifier(&column.name);
    let mut out = format!("{name} {}", column.data_type.sql_type());
    for attribute in attributes {
        let clause = attribute_clause(column, &name, attribute)?;
        out.push(' ');
        out.push_str(&clause);
    }
    Ok(out)
}

/// Renders a single attribute clause for `column`.
fn attribute_clause(
    column: &Column,
    quoted: &str,
    attribute: &Attribute,
) -> Result<String, DeclarationError> {
    if column.data_type == DataType::Null && !matches!(attribute, Attribute::Default(Value::Null)) {
        return Err(unsupported(
            column,
            format!("{} is not supported on null columns", attribute.kind()),
        ));
    }
    match attribute {
        Attribute::PrimaryKey => Ok("PRIMARY KEY".to_string()),
        Attribute::NotNull => Ok("NOT NULL".to_string()),
        Attribute::Unique => Ok("UNIQUE".to_string()),
        Attribute::Default(value) => {
            let matches_type = match (column.data_type, value) {
                (_, Value::Null) | (DataType::Int, Value::Int(_)) | (DataType::Text, Value::Text(_)) => {
                    true
                }
                _ => false,
            };
            if !matches_type {
                return Err(unsupported(
                    column,
                    format!("default {} value was not coerced", value.type_name()),
                ));
            }
            Ok(format!("DEFAULT {}", literal(value)))
        }
        Attribute::Min(value) | Attribute::Max(value) => {
            if column.data_type != DataType::Int {
                return Err(unsupported(
                    column,
                    format!("{} requires an int column", attribute.kind()),
                ));
            }
            let bound = coerced_int(column, attribute, value)?;
            let operator = if matches!(attribute, Attribute::Min(_)) { ">=" } else { "<=" };
            Ok(format!("CHECK ({quoted} {operator} {bound})"))
        }
        Attribute::MinLength(value) | Attribute::MaxLength(value) => {
            if column.data_type != DataType::Text {
                return Err(unsupported(
                    column,
                    format!("{} requires a text column", attribute.kind()),
                ));
            }
            let bound = coerced_int(column, attribute, value)?;
            let operator = if matches!(attribute, Attribute::MinLength(_)) { ">=" } else { "<=" };
            Ok(format!("CHECK (length({quoted}) {operator} {bound})"))
        }
    }
}

/// Returns the integer literal of a bound attribute that was already coerced.
fn coerced_int(column: &Column, attribute: &Attribute, value: &Value) -> Result<i64, DeclarationError> {
    value.as_int().ok_or_else(|| {
        unsupported(
            column,
            format!("{} {} value was not coerced", attribute.kind(), value.type_name()),
        )
    })
}

/// Renders a SQL literal.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(value) => value.to_string(),
        Value::Text(value) => format!("'{}'", value.replace('\'', "''")),
        Value::Blob(value) => format!("X'{}'", hex_encode(value)),
    }
}

/// Builds an attribute error for `column`.
fn unsupported(column: &Column, reason: String) -> DeclarationError {
    DeclarationError::Attribute {
        column: column.name.clone(),
        reason,
    }
}
