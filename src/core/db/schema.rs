//! Schema Introspection Module
//!
//! Lists the tables of the banking store and describes their columns. Table
//! names coming from callers are only ever checked against this listing or
//! bound as parameters, never interpolated unchecked.

use crate::core::{BankslightError, Result};
use rusqlite::{Connection, Row};
use serde::Serialize;

/// Represents a table column with its metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type name (e.g., "INTEGER", "TEXT", "REAL", "DATE")
    pub type_name: String,
    /// Whether the column rejects NULL values
    pub notnull: bool,
    /// Whether this column is part of the primary key
    pub pk: bool,
    /// Default value expression (if any)
    pub dflt_value: Option<String>,
}

impl Column {
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Column {
            name: row.get(0)?,
            type_name: row.get(1)?,
            notnull: row.get(2)?,
            dflt_value: row.get(3)?,
            pk: row.get::<_, i64>(4)? > 0,
        })
    }
}

/// Names of all user tables, sorted
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .map_err(|e| BankslightError::Query(format!("Failed to list tables: {}", e)))?;

    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| BankslightError::Query(format!("Failed to list tables: {}", e)))?;

    Ok(names)
}

/// Column metadata for `table`
///
/// # Errors
///
/// `BankslightError::NotFound` if the table does not exist.
pub fn describe_table(conn: &Connection, table: &str) -> Result<Vec<Column>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk
             FROM pragma_table_info(?1)
             ORDER BY cid",
        )
        .map_err(|e| BankslightError::Query(format!("Failed to describe {}: {}", table, e)))?;

    let columns = stmt
        .query_map([table], Column::from_pragma_row)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| BankslightError::Query(format!("Failed to describe {}: {}", table, e)))?;

    if columns.is_empty() {
        return Err(BankslightError::NotFound(format!("unknown table '{}'", table)));
    }
    Ok(columns)
}

/// Double-quotes an identifier for use in generated SQL
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
