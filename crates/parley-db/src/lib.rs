//! SQLite backend for the Parley store.

mod adapter;
pub mod migrations;
mod models;
mod queries;

use std::sync::Mutex;

use anyhow::anyhow;
use rusqlite::{Connection, Transaction, ffi};
use serde::Deserialize;
use tracing::info;

use parley_store::{Result, StoreError};

pub const ADAPTER_NAME: &str = "sqlite";

const DEFAULT_PATH: &str = "parley.db";

/// Backend configuration, the `adapters.sqlite` block of the store config.
#[derive(Debug, Deserialize)]
struct SqliteConfig {
    #[serde(default = "default_path")]
    path: String,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

/// A single SQLite connection shared by all store calls.
///
/// Starts closed; [`Adapter::open`](parley_store::Adapter::open) connects it.
pub struct Database {
    conn: Mutex<Option<Connection>>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            conn: Mutex::new(None),
        }
    }

    fn connect(&self, config: &str) -> Result<()> {
        let config: SqliteConfig = if config.trim().is_empty() {
            SqliteConfig { path: default_path() }
        } else {
            serde_json::from_str(config)
                .map_err(|e| StoreError::config(format!("sqlite: bad config: {}", e)))?
        };

        let mut slot = self.lock()?;
        if slot.is_some() {
            return Err(StoreError::config("sqlite: connection is already opened"));
        }

        let conn = Connection::open(&config.path).map_err(map_err)?;

        // WAL mode for concurrent reads
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(map_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(map_err)?;

        migrations::run(&conn).map_err(map_err)?;

        *slot = Some(conn);

        info!("Database opened at {}", config.path);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        if let Some(conn) = self.lock()?.take() {
            conn.close().map_err(|(_, e)| map_err(e))?;
            info!("Database closed");
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Backend(anyhow!("DB lock poisoned: {}", e)))
    }

    pub(crate) fn is_connected(&self) -> bool {
        matches!(self.conn.lock().as_deref(), Ok(Some(_)))
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or_else(not_open)?;
        f(conn).map_err(map_err)
    }

    /// Run `f` inside a transaction, committed only when `f` succeeds.
    pub(crate) fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or_else(not_open)?;
        let tx = conn.transaction().map_err(map_err)?;
        let out = f(&tx).map_err(map_err)?;
        tx.commit().map_err(map_err)?;
        Ok(out)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

fn not_open() -> StoreError {
    StoreError::Backend(anyhow!("sqlite: database is not open"))
}

/// Translate SQLite failures into store errors. Unique and primary key
/// violations become [`StoreError::Duplicate`], a missing row
/// [`StoreError::NotFound`].
pub(crate) fn map_err(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            StoreError::Duplicate
        }
        other => StoreError::Backend(other.into()),
    }
}
