//! SQLite storage for the focus tracker session record.
//!
//! The record is kept flat in a single key-value table, one row per field,
//! with JSON-encoded values:
//!
//! ```text
//! kv(key TEXT PRIMARY KEY, value TEXT NOT NULL)
//! ```
//!
//! There is no schema version. Rows with unknown keys are ignored and missing
//! keys read back as defaults, so older and newer front ends can share a file.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The daemon and each CLI invocation own their own connection; separate
//! processes coordinate through `SQLite` locking with a busy timeout and the
//! last writer wins.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use ft_core::{StateKey, StatePatch, Store, StoreError};
use rusqlite::{Connection, params, params_from_iter};
use serde_json::Value;
use thiserror::Error;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored value is not valid JSON.
    #[error("invalid stored value for {key}: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// Failed to create the directory holding the database file.
    #[error("cannot create database directory: {0}")]
    CreateDir(#[source] std::io::Error),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it and its parent
    /// directory if necessary.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened session database");
        Ok(db)
    }

    /// Opens an in-memory database. Destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Idempotent.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Reads the raw JSON values stored under `keys`. Absent keys are omitted.
    pub fn get_values(&self, keys: &[StateKey]) -> Result<HashMap<String, Value>, DbError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT key, value FROM kv WHERE key IN ({placeholders})"))?;
        let rows = stmt.query_map(params_from_iter(keys.iter().map(StateKey::as_str)), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut values = HashMap::with_capacity(keys.len());
        for row in rows {
            let (key, raw) = row?;
            let value = serde_json::from_str(&raw).map_err(|source| DbError::InvalidValue {
                key: key.clone(),
                source,
            })?;
            values.insert(key, value);
        }
        Ok(values)
    }

    /// Writes every field of `patch` in one transaction.
    pub fn set_values(&self, patch: &StatePatch) -> Result<usize, DbError> {
        let entries = patch.to_entries();
        if entries.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO kv (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                ",
            )?;
            for (key, value) in &entries {
                stmt.execute(params![key.as_str(), value.to_string()])?;
            }
        }
        tx.commit()?;
        tracing::trace!(fields = entries.len(), "session record updated");
        Ok(entries.len())
    }
}

impl Store for Database {
    fn get(&self, keys: &[StateKey]) -> Result<StatePatch, StoreError> {
        let values = self.get_values(keys)?;
        Ok(StatePatch::from_entries(&values)?)
    }

    fn set(&self, patch: &StatePatch) -> Result<(), StoreError> {
        self.set_values(patch)?;
        Ok(())
    }
}
