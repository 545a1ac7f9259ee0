//! Snapshot Persistence.
//!
//! The whole entry collection is serialised to a single JSON blob and stored
//! under one fixed key of a [`StorageBackend`].  Each save overwrites the
//! previous blob in one `set` call, so readers never observe a partial write.
//!
//! Failures never reach the caller: [`SnapshotStore::save`] logs and keeps the
//! in-memory state (the stored snapshot may then be stale), and
//! [`SnapshotStore::load`] logs and returns an empty collection.
//!
//! # Blob layout
//!
//! ```text
//! [
//!   {
//!     "id": "6f1c…",
//!     "content": "User visited page X",
//!     "metadata": {
//!       "type": "context",
//!       "source": "PageX",
//!       "timestamp": "2026-03-01T12:00:00.123456789Z",
//!       "tags": [],
//!       "importance": 3
//!     },
//!     "embedding": [0.0, 0.31, …]
//!   }
//! ]
//! ```
//!
//! # Backends
//!
//! | backend | storage |
//! |---|---|
//! | [`InMemoryBackend`] | process-local `HashMap` (tests, ephemeral stores) |
//! | [`SqliteBackend`] | `kv_store` table in a local SQLite database |
//!
//! The SQLite table layout:
//!
//! | column     | type | description                     |
//! |------------|------|---------------------------------|
//! | key        | TEXT | primary key                     |
//! | value      | TEXT | the stored blob                 |
//! | updated_at | TEXT | RFC-3339 time of the last write |

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use mnemos_types::MemoryEntry;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::{debug, warn};

/// Key under which the snapshot is stored unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "semantic_memory";

// ─────────────────────────────────────────────────────────────────────────────
// Error types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by a [`StorageBackend`].
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Storage backend lock poisoned")]
    Poisoned,
}

/// Errors raised while saving or loading a snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Snapshot (de)serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// StorageBackend
// ─────────────────────────────────────────────────────────────────────────────

/// Durable string key-value storage.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

/// Process-local backend backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.values.lock().map_err(|_| StorageError::Poisoned)
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }
}

/// SQLite-backed key-value storage.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let backend = Self {
            conn: Mutex::new(conn),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let backend = Self {
            conn: Mutex::new(conn),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT NOT NULL PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SnapshotStore
// ─────────────────────────────────────────────────────────────────────────────

/// Whole-collection save/load against one key of a [`StorageBackend`].
#[derive(Clone)]
pub struct SnapshotStore {
    backend: Arc<dyn StorageBackend>,
    key: String,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// The storage key the snapshot lives under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist `entries`, logging (not returning) any failure.
    pub async fn save(&self, entries: &[MemoryEntry]) {
        if let Err(e) = self.try_save(entries).await {
            warn!(key = %self.key, error = %e, "snapshot save failed; stored snapshot may be stale");
        }
    }

    /// Persist `entries`, returning any failure.
    pub async fn try_save(&self, entries: &[MemoryEntry]) -> Result<(), SnapshotError> {
        let blob = serde_json::to_string(entries)?;
        self.backend.set(&self.key, blob).await?;
        debug!(key = %self.key, entries = entries.len(), "snapshot saved");
        Ok(())
    }

    /// Load the stored collection.  A missing, unreadable or malformed
    /// snapshot yields an empty collection.
    pub async fn load(&self) -> Vec<MemoryEntry> {
        match self.try_load().await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                debug!(key = %self.key, "no snapshot found; starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "snapshot load failed; starting empty");
                Vec::new()
            }
        }
    }

    /// Load the stored collection, returning `Ok(None)` when the key is
    /// absent.
    pub async fn try_load(&self) -> Result<Option<Vec<MemoryEntry>>, SnapshotError> {
        let Some(blob) = self.backend.get(&self.key).await? else {
            return Ok(None);
        };
        let entries: Vec<MemoryEntry> = serde_json::from_str(&blob)?;
        debug!(key = %self.key, entries = entries.len(), "snapshot loaded");
        Ok(Some(entries))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
