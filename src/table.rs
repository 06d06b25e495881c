//! Result Projection Module for BanksLight
//!
//! Every read in the core ends up as a [`Table`]: ordered column names plus
//! ordered rows of typed values. Column order and name casing come straight
//! from the store.

use crate::core::{BankslightError, Result};
use chrono::NaiveDate;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use serde::Serialize;
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(t) => write!(f, "{}", t),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(t.as_str().into()),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format(DATE_FORMAT).to_string())),
        })
    }
}

/// Rows exactly as the driver produced them, before projection.
#[derive(Debug, Clone, Default)]
pub struct RawRows {
    pub columns: Vec<String>,
    /// Declared column type per column (`None` for expressions)
    pub decl_types: Vec<Option<String>>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Ordered column names plus ordered rows of typed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Maps raw driver rows into a [`Table`].
///
/// Text in a column declared `DATE` that parses as `YYYY-MM-DD` becomes
/// [`Value::Date`]; every other value keeps the driver's type.
pub fn project(raw: RawRows) -> Table {
    let date_columns: Vec<bool> = (0..raw.columns.len())
        .map(|i| {
            raw.decl_types
                .get(i)
                .and_then(|d| d.as_deref())
                .map(|d| d.trim().eq_ignore_ascii_case("DATE"))
                .unwrap_or(false)
        })
        .collect();

    let rows = raw
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(i, v)| project_value(v, date_columns.get(i).copied().unwrap_or(false)))
                .collect()
        })
        .collect();

    Table {
        columns: raw.columns,
        rows,
    }
}

fn project_value(value: SqlValue, date_column: bool) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(r) => Value::Real(r),
        SqlValue::Text(t) if date_column => match NaiveDate::parse_from_str(&t, DATE_FORMAT) {
            Ok(date) => Value::Date(date),
            Err(_) => Value::Text(t),
        },
        SqlValue::Text(t) => Value::Text(t),
        SqlValue::Blob(b) => Value::Text(format!("<BLOB: {} bytes>", b.len())),
    }
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Table { columns, rows }
    }

    /// Zero columns, zero rows.
    pub fn empty() -> Self {
        Table::default()
    }

    /// Known columns, zero rows.
    pub fn with_columns(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at `row` in the named column.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Exports the table to a specified format.
    /// Supported formats: CSV, JSON, Markdown.
    pub fn export(&self, format: &str) -> Result<String> {
        match format.to_lowercase().as_str() {
            "csv" => Ok(self.export_to_csv()),
            "json" => self.export_to_json(),
            "markdown" => Ok(self.export_to_markdown()),
            _ => Err(BankslightError::Export(format!(
                "Unsupported export format: '{}'. Supported formats: csv, json, markdown",
                format
            ))),
        }
    }

    fn export_to_csv(&self) -> String {
        let mut output = String::new();
        if !self.columns.is_empty() {
            let header: Vec<String> = self.columns.iter().map(|c| csv_field(c)).collect();
            output.push_str(&header.join(","));
            output.push('\n');
        }
        for row in &self.rows {
            let fields: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Value::Null => String::new(),
                    other => csv_field(&other.to_string()),
                })
                .collect();
            output.push_str(&fields.join(","));
            output.push('\n');
        }
        output
    }

    // Column list plus positional rows, so order and repeated names survive
    fn export_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn export_to_markdown(&self) -> String {
        let mut output = String::new();
        if !self.columns.is_empty() {
            output.push_str(&self.columns.join(" | "));
            output.push('\n');
            let underline: Vec<String> = self.columns.iter().map(|c| "-".repeat(c.len().max(3))).collect();
            output.push_str(&underline.join(" | "));
            output.push('\n');
        }
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(Value::to_string).collect();
            output.push_str(&cells.join(" | "));
            output.push('\n');
        }
        output
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.columns.is_empty() {
            writeln!(f, "{}", self.columns.join(" | "))?;
            let underline: Vec<String> = self.columns.iter().map(|c| "-".repeat(c.len())).collect();
            writeln!(f, "{}", underline.join("-|-"))?;
        }
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(Value::to_string).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        write!(f, "({} rows)", self.rows.len())
    }
}
