//! Connection Management Module
//!
//! This module owns the single long-lived SQLite handle shared by every
//! component of a `BankService`. The handle is opened lazily on first use and
//! lives until the manager is shut down or dropped.

use crate::config::StoreConfig;
use crate::core::{BankslightError, Result};
use once_cell::sync::OnceCell;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

const IN_MEMORY: &str = ":memory:";

/// Connection manager for the banking store
///
/// Constructed explicitly and passed by reference to the executor and the
/// mutation service. `acquire` may be called concurrently; callers take turns
/// on the underlying handle.
#[derive(Debug)]
pub struct ConnectionManager {
    config: StoreConfig,
    handle: OnceCell<Mutex<Connection>>,
}

impl ConnectionManager {
    /// Creates a manager for the configured store without opening it
    pub fn new(config: StoreConfig) -> Self {
        ConnectionManager {
            config,
            handle: OnceCell::new(),
        }
    }

    /// Wraps an already-open connection
    ///
    /// The manager behaves as if the lazy open had already happened. The
    /// connection gets the same session settings as one opened by the manager.
    pub fn from_connection(connection: Connection) -> Result<Self> {
        configure_session(&connection)?;
        let handle = OnceCell::new();
        let _ = handle.set(Mutex::new(connection));
        Ok(ConnectionManager {
            config: StoreConfig::at(IN_MEMORY),
            handle,
        })
    }

    /// Returns the shared connection, opening it on first use
    ///
    /// # Errors
    ///
    /// `BankslightError::Connection` if the store cannot be opened. A handle
    /// left behind by a holder that panicked is reset and handed out again.
    pub fn acquire(&self) -> Result<MutexGuard<'_, Connection>> {
        let handle = self
            .handle
            .get_or_try_init(|| self.open().map(Mutex::new))?;

        match handle.lock() {
            Ok(guard) => Ok(guard),
            Err(poisoned) => {
                warn!("Previous holder of {} panicked; resetting session", self.config.path.display());
                handle.clear_poison();
                let guard = poisoned.into_inner();
                reset_session(&guard)?;
                Ok(guard)
            }
        }
    }

    /// Whether the handle has been opened
    pub fn is_open(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Path of the configured store
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Closes the handle, surfacing any error SQLite reports on close
    ///
    /// A later `acquire` reopens the store.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let connection = handle.into_inner().unwrap_or_else(PoisonError::into_inner);

        connection.close().map_err(|(_, e)| {
            error!("Failed to close store {}: {}", self.config.path.display(), e);
            BankslightError::Connection(format!("Failed to close database: {}", e))
        })?;

        info!("Closed store {}", self.config.path.display());
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        let path = &self.config.path;
        debug!("Opening store at {}", path.display());

        let connection = if path.as_os_str() == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            if self.config.create_if_missing {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
            Connection::open_with_flags(path, flags)
        }
        .map_err(|e| {
            error!("Failed to open store {}: {}", path.display(), e);
            BankslightError::Connection(format!("Failed to open {}: {}", path.display(), e))
        })?;

        configure_session(&connection)?;

        if let Some(timeout) = self.config.busy_timeout() {
            connection
                .busy_timeout(timeout)
                .map_err(|e| BankslightError::Connection(format!("Failed to set busy timeout: {}", e)))?;
        }

        // SQLite opens lazily; touch the schema so a non-database file fails here
        connection
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| {
                error!("Store {} is not readable: {}", path.display(), e);
                BankslightError::Connection(format!("Failed to read {}: {}", path.display(), e))
            })?;

        info!("Opened store {}", path.display());
        Ok(connection)
    }
}

/// Relations between banking tables are soft: deleting a customer leaves
/// dependent rows behind, so foreign-key enforcement stays off even when the
/// SQLite build enables it by default.
fn configure_session(connection: &Connection) -> Result<()> {
    connection
        .execute_batch("PRAGMA foreign_keys = OFF;")
        .map_err(|e| BankslightError::Connection(format!("Failed to configure session: {}", e)))
}

/// Undoes per-call state a panicking holder may have left on the handle
fn reset_session(connection: &Connection) -> Result<()> {
    connection.progress_handler(0, None::<fn() -> bool>);
    connection
        .execute_batch("PRAGMA query_only = OFF;")
        .map_err(|e| BankslightError::Connection(format!("Failed to reset session: {}", e)))
}
