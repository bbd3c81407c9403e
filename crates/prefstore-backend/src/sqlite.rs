//! SQLite implementation of the Backend trait.
//!
//! This is the primary storage backend for prefstore. It uses rusqlite with
//! bundled SQLite. Reads are served from a cache loaded when the database is
//! opened; writes go to disk via tokio::spawn_blocking and then update the cache.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use prefstore_core::{TypedValue, ValueKind};
use rusqlite::types::Value;
use rusqlite::{params, Connection};

use crate::error::{BackendError, Result};
use crate::migration::{self, now_millis};
use crate::traits::Backend;

/// SQLite-based backend implementation.
///
/// Thread-safe via internal locks. Clones share the connection and cache.
#[derive(Clone)]
pub struct SqliteBackend {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    /// Every entry on disk, as of the last successful write or reload.
    cache: Arc<RwLock<BTreeMap<String, TypedValue>>>,
}

impl SqliteBackend {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist, then loads
    /// every entry into the read cache. This blocks; prefer
    /// [`SqliteBackend::open_async`] from async code.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Open a database on the blocking pool.
    ///
    /// This is the usual acquisition future handed to a deferred store.
    pub async fn open_async(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::open(path))
            .await
            .map_err(|e| BackendError::Task(format!("spawn_blocking failed: {}", e)))?
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        let entries = read_all(&conn)?;
        tracing::debug!(entries = entries.len(), "opened sqlite backend");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cache: Arc::new(RwLock::new(entries)),
        })
    }

    /// Re-read every entry from disk into the cache.
    ///
    /// Picks up rows written by other connections to the same file.
    pub async fn reload(&self) -> Result<()> {
        let conn = self.conn.clone();
        let entries = run_blocking(move || {
            let conn = lock(&conn)?;
            read_all(&conn)
        })
        .await?;
        *self.cache_write() = entries;
        Ok(())
    }

    fn cache_read(&self) -> RwLockReadGuard<'_, BTreeMap<String, TypedValue>> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cache_write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, TypedValue>> {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn put(&self, key: &str, value: TypedValue) -> Result<()> {
        let conn = self.conn.clone();
        let owned_key = key.to_string();
        let stored = value.clone();

        run_blocking(move || {
            let conn = lock(&conn)?;
            conn.execute(
                "INSERT INTO entries (key, kind, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    kind = excluded.kind,
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![
                    owned_key,
                    stored.kind().as_str(),
                    to_sql_value(&stored),
                    now_millis(),
                ],
            )?;
            Ok(())
        })
        .await?;

        self.cache_write().insert(key.to_string(), value);
        Ok(())
    }
}

// Helper to run a blocking closure on the tokio blocking pool
async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BackendError::Task(format!("spawn_blocking failed: {}", e)))?
}

// Helper to lock the connection, surfacing poisoning as an error
fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| BackendError::Unavailable(format!("mutex poisoned: {}", e)))
}

// Helper to encode a value in its native SQLite type.
// SQLite turns a NaN REAL into NULL, so non-finite floats are stored as text.
fn to_sql_value(value: &TypedValue) -> Value {
    match value {
        TypedValue::Text(s) => Value::Text(s.clone()),
        TypedValue::Integer(i) => Value::Integer(*i),
        TypedValue::Float(x) if x.is_finite() => Value::Real(*x),
        TypedValue::Float(x) => Value::Text(x.to_string()),
        TypedValue::Boolean(b) => Value::Integer(i64::from(*b)),
    }
}

// Helper to decode a row's (kind, value) pair
fn from_sql_value(key: &str, kind: &str, value: Value) -> Result<TypedValue> {
    let kind = ValueKind::from_tag(kind)
        .ok_or_else(|| BackendError::InvalidData(format!("{}: unknown kind {:?}", key, kind)))?;

    match (kind, value) {
        (ValueKind::Text, Value::Text(s)) => Ok(TypedValue::Text(s)),
        (ValueKind::Integer, Value::Integer(i)) => Ok(TypedValue::Integer(i)),
        (ValueKind::Float, Value::Real(x)) => Ok(TypedValue::Float(x)),
        (ValueKind::Float, Value::Integer(i)) => Ok(TypedValue::Float(i as f64)),
        (ValueKind::Float, Value::Text(s)) => s
            .parse::<f64>()
            .map(TypedValue::Float)
            .map_err(|e| BackendError::InvalidData(format!("{}: float entry {:?}: {}", key, s, e))),
        (ValueKind::Boolean, Value::Integer(i)) => Ok(TypedValue::Boolean(i != 0)),
        (kind, other) => Err(BackendError::InvalidData(format!(
            "{}: {} entry holds {:?}",
            key,
            kind,
            other.data_type()
        ))),
    }
}

// Read every row; rows that cannot be decoded are skipped
fn read_all(conn: &Connection) -> Result<BTreeMap<String, TypedValue>> {
    let mut stmt = conn.prepare("SELECT key, kind, value FROM entries ORDER BY key")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Value>(2)?,
        ))
    })?;

    let mut entries = BTreeMap::new();
    for row in rows {
        let (key, kind, value) = row?;
        match from_sql_value(&key, &kind, value) {
            Ok(typed) => {
                entries.insert(key, typed);
            }
            Err(e) => tracing::warn!(error = %e, "skipping undecodable entry"),
        }
    }
    Ok(entries)
}

#[async_trait]
impl Backend for SqliteBackend {
    fn list_keys(&self) -> Result<BTreeSet<String>> {
        Ok(self.cache_read().keys().cloned().collect())
    }

    fn read_raw(&self, key: &str) -> Result<Option<TypedValue>> {
        Ok(self.cache_read().get(key).cloned())
    }

    async fn write_text(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, TypedValue::Text(value.to_string())).await
    }

    async fn write_integer(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, TypedValue::Integer(value)).await
    }

    async fn write_float(&self, key: &str, value: f64) -> Result<()> {
        self.put(key, TypedValue::Float(value)).await
    }

    async fn write_boolean(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, TypedValue::Boolean(value)).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.clone();
        let owned_key = key.to_string();

        let removed = run_blocking(move || {
            let conn = lock(&conn)?;
            let n = conn.execute("DELETE FROM entries WHERE key = ?1", params![owned_key])?;
            Ok(n > 0)
        })
        .await?;

        self.cache_write().remove(key);
        Ok(removed)
    }
}
