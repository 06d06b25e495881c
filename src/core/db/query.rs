//! Query Execution Module
//!
//! This module executes read statements against the shared connection and
//! materializes their results as [`Table`]s. It also carries the per-call
//! cancellation support used by the mutation service.

use super::connection::ConnectionManager;
use crate::core::{BankslightError, Result};
use crate::table::{project, RawRows, Table, Value};
use rusqlite::types::{ToSql, Value as SqlValue};
use rusqlite::{params_from_iter, Batch, Connection, ErrorCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Number of SQLite VM instructions between cancellation checks
const PROGRESS_OPS: i32 = 1000;

/// Parameters bound into a statement
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    #[default]
    None,
    /// Bound to `?1`, `?2`, ... in order
    Positional(Vec<Value>),
    /// Bound by name; the leading `:` is optional
    Named(Vec<(String, Value)>),
}

impl Params {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (placeholder_name(k.into()), v.into()))
                .collect(),
        )
    }
}

fn placeholder_name(name: String) -> String {
    if name.starts_with([':', '@', '$']) {
        name
    } else {
        format!(":{}", name)
    }
}

/// Cooperative cancellation flag shared between a caller and a running call
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Interrupts the call holding this token at its next progress check
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-call options. The default installs nothing and never interrupts.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub cancel: Option<CancelToken>,
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn is_unbounded(&self) -> bool {
        self.cancel.is_none() && self.timeout.is_none()
    }

    /// Fails fast when the call is cancelled before it starts
    fn check(&self) -> Result<()> {
        if self.cancel.as_ref().map_or(false, CancelToken::is_cancelled) {
            return Err(BankslightError::Cancelled("cancelled before execution".to_string()));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(BankslightError::Cancelled("timeout elapsed before execution".to_string()));
        }
        Ok(())
    }
}

/// Runs `f` with a progress handler that interrupts the statement once the
/// token is cancelled or the deadline passes. The handler is removed before
/// returning.
pub(crate) fn guarded<T>(
    conn: &Connection,
    options: &CallOptions,
    f: impl FnOnce(&Connection) -> T,
) -> Result<T> {
    options.check()?;
    if options.is_unbounded() {
        return Ok(f(conn));
    }

    let token = options.cancel.clone();
    let deadline = options.timeout.map(|t| Instant::now() + t);
    conn.progress_handler(
        PROGRESS_OPS,
        Some(move || {
            token.as_ref().map_or(false, CancelToken::is_cancelled)
                || deadline.map_or(false, |d| Instant::now() >= d)
        }),
    );

    let result = f(conn);
    conn.progress_handler(0, None::<fn() -> bool>);
    Ok(result)
}

/// Whether the driver error came from an interrupted statement
pub(crate) fn is_interrupted(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted)
}

/// Why a read did not produce rows
enum ReadFailure {
    /// Nothing but whitespace or comments
    Empty,
    /// More than one statement in the input
    MultipleStatements,
    /// Writes, DDL, transaction control or anything without a result set
    NotARead,
    Store(rusqlite::Error),
}

/// Prepares the single statement in `sql`, binds `params` and materializes
/// every row
///
/// On failure the column names are returned alongside the error when the
/// statement got far enough to report them.
fn materialize(
    conn: &Connection,
    sql: &str,
    params: &Params,
) -> std::result::Result<RawRows, (Vec<String>, ReadFailure)> {
    let unprepared = |failure: ReadFailure| -> (Vec<String>, ReadFailure) { (Vec::new(), failure) };

    let mut batch = Batch::new(conn, sql);
    let mut stmt = batch
        .next()
        .map_err(|e| unprepared(ReadFailure::Store(e)))?
        .ok_or_else(|| unprepared(ReadFailure::Empty))?;
    if batch.next().map_err(|e| unprepared(ReadFailure::Store(e)))?.is_some() {
        return Err(unprepared(ReadFailure::MultipleStatements));
    }
    // BEGIN and friends count as read-only to SQLite but have no result set
    if !stmt.readonly() || stmt.column_count() == 0 {
        return Err(unprepared(ReadFailure::NotARead));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let decl_types: Vec<Option<String>> = stmt
        .columns()
        .iter()
        .map(|c| c.decl_type().map(str::to_owned))
        .collect();
    let column_count = columns.len();

    let rows = match params {
        Params::None => stmt.query([]),
        Params::Positional(values) => stmt.query(params_from_iter(values.iter())),
        Params::Named(pairs) => {
            let named: Vec<(&str, &dyn ToSql)> = pairs
                .iter()
                .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
                .collect();
            stmt.query(named.as_slice())
        }
    };

    let collected = rows.and_then(|mut rows| {
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(row.get::<_, SqlValue>(i)?);
            }
            out.push(values);
        }
        Ok(out)
    });

    match collected {
        Ok(rows) => Ok(RawRows {
            columns,
            decl_types,
            rows,
        }),
        Err(e) => Err((columns, ReadFailure::Store(e))),
    }
}

/// Query execution service bound to a connection manager
pub struct QueryExecutor<'a> {
    connections: &'a ConnectionManager,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor over the given connection manager
    pub fn new(connections: &'a ConnectionManager) -> Self {
        QueryExecutor { connections }
    }

    /// Executes a read statement and returns its full result
    ///
    /// # Errors
    ///
    /// `BankslightError::Query` if the statement is not a read, fails to
    /// prepare or bind, or fails mid-execution. `BankslightError::Connection`
    /// if the store cannot be opened.
    pub fn run(&self, sql: &str, params: &Params) -> Result<Table> {
        self.run_with(sql, params, &CallOptions::default())
    }

    /// Executes a read statement honouring the call's cancel token and timeout
    ///
    /// # Errors
    ///
    /// As [`QueryExecutor::run`], plus `BankslightError::Cancelled` when the
    /// call is interrupted.
    pub fn run_with(&self, sql: &str, params: &Params, options: &CallOptions) -> Result<Table> {
        self.execute(sql, params, options).map_err(|(_, e)| e)
    }

    /// Executes a read statement, falling back to an empty table on failure
    ///
    /// The fallback table keeps the statement's columns when they were known
    /// before the failure, and has zero columns otherwise.
    pub fn run_or_empty(&self, sql: &str, params: &Params) -> (Table, Option<BankslightError>) {
        match self.execute(sql, params, &CallOptions::default()) {
            Ok(table) => (table, None),
            Err((columns, e)) => (Table::with_columns(columns), Some(e)),
        }
    }

    fn execute(
        &self,
        sql: &str,
        params: &Params,
        options: &CallOptions,
    ) -> std::result::Result<Table, (Vec<String>, BankslightError)> {
        let conn = self.connections.acquire().map_err(|e| (Vec::new(), e))?;

        // Writes hidden inside a read (e.g. WITH ... DELETE) fail under query_only
        conn.execute_batch("PRAGMA query_only = ON")
            .map_err(|e| (Vec::new(), BankslightError::Query(format!("Failed to enter read-only mode: {}", e))))?;

        let outcome = guarded(&conn, options, |c| materialize(c, sql, params));

        if let Err(e) = conn.execute_batch("PRAGMA query_only = OFF") {
            error!("Failed to leave read-only mode: {}", e);
        }

        match outcome {
            Ok(Ok(raw)) => {
                let table = project(raw);
                debug!("Query returned {} rows", table.row_count());
                Ok(table)
            }
            Ok(Err((columns, failure))) => Err((columns, read_error(failure))),
            Err(e) => Err((Vec::new(), e)),
        }
    }
}

fn read_error(failure: ReadFailure) -> BankslightError {
    match failure {
        ReadFailure::Empty => BankslightError::Query("No statement to run".to_string()),
        ReadFailure::MultipleStatements => {
            BankslightError::Query("Only a single statement can be run as a query".to_string())
        }
        ReadFailure::NotARead => {
            BankslightError::Query("Only read statements can be run as queries".to_string())
        }
        ReadFailure::Store(e) if is_interrupted(&e) => {
            warn!("Query interrupted: {}", e);
            BankslightError::Cancelled(e.to_string())
        }
        ReadFailure::Store(e) => {
            warn!("Query failed: {}", e);
            BankslightError::Query(e.to_string())
        }
    }
}
