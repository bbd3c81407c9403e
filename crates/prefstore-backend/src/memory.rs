//! In-memory implementation of the Backend trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Clones share the
//! same underlying map, so several stores can be pointed at one backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use prefstore_core::TypedValue;

use crate::error::Result;
use crate::traits::Backend;

/// In-memory backend implementation.
///
/// All data is lost when the last clone is dropped. Thread-safe via RwLock.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

#[derive(Default)]
struct MemoryBackendInner {
    /// Entries indexed by key.
    entries: RwLock<BTreeMap<String, TypedValue>>,

    /// Number of write and remove calls served.
    writes: AtomicU64,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value directly, bypassing the async write path.
    ///
    /// Used to seed fixtures, including values of a kind no schema expects.
    pub fn seed(&self, key: impl Into<String>, value: impl Into<TypedValue>) {
        self.write_guard().insert(key.into(), value.into());
    }

    /// Copy of every stored entry.
    pub fn entries(&self) -> BTreeMap<String, TypedValue> {
        self.read_guard().clone()
    }

    /// Number of write and remove calls served so far.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, BTreeMap<String, TypedValue>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, BTreeMap<String, TypedValue>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn put(&self, key: &str, value: TypedValue) -> Result<()> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.write_guard().insert(key.to_string(), value);
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn list_keys(&self) -> Result<BTreeSet<String>> {
        Ok(self.read_guard().keys().cloned().collect())
    }

    fn read_raw(&self, key: &str) -> Result<Option<TypedValue>> {
        Ok(self.read_guard().get(key).cloned())
    }

    async fn write_text(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, TypedValue::Text(value.to_string()))
    }

    async fn write_integer(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, TypedValue::Integer(value))
    }

    async fn write_float(&self, key: &str, value: f64) -> Result<()> {
        self.put(key, TypedValue::Float(value))
    }

    async fn write_boolean(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, TypedValue::Boolean(value))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(self.write_guard().remove(key).is_some())
    }
}
