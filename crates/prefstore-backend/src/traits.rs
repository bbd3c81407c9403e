//! Backend trait: the abstract interface for typed key-value persistence.
//!
//! This trait allows the store to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use async_trait::async_trait;
use prefstore_core::TypedValue;

use crate::error::Result;

/// The Backend trait: durable key-value storage for typed values.
///
/// Reads are synchronous and expected to be served from memory; writes are
/// async so implementations can hand them to a blocking pool or the network.
///
/// # Design Notes
///
/// - **Kind metadata**: [`Backend::read_raw`] returns the value with the kind
///   it was last written with, regardless of what any schema declares.
/// - **Last write wins**: writing a key replaces its value and its kind.
/// - **Idempotent removes**: removing a missing key is not an error.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// List every key currently stored.
    fn list_keys(&self) -> Result<BTreeSet<String>>;

    /// Read the stored value for a key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn read_raw(&self, key: &str) -> Result<Option<TypedValue>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a text value.
    async fn write_text(&self, key: &str, value: &str) -> Result<()>;

    /// Store an integer value.
    async fn write_integer(&self, key: &str, value: i64) -> Result<()>;

    /// Store a float value.
    async fn write_float(&self, key: &str, value: f64) -> Result<()>;

    /// Store a boolean value.
    async fn write_boolean(&self, key: &str, value: bool) -> Result<()>;

    /// Remove a key.
    ///
    /// Returns `Ok(true)` if the key existed, `Ok(false)` otherwise.
    async fn remove(&self, key: &str) -> Result<bool>;
}

/// Extension trait for common backend patterns.
pub trait BackendExt: Backend {
    /// Store a value with the writer matching its kind.
    fn write_value(
        &self,
        key: &str,
        value: &TypedValue,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read every entry whose key starts with `prefix`.
    ///
    /// Keys are returned qualified (prefix included). A key listed but gone
    /// by the time it is read is skipped.
    fn load_prefixed(&self, prefix: &str) -> Result<BTreeMap<String, TypedValue>>;
}

impl<B: Backend + ?Sized> BackendExt for B {
    async fn write_value(&self, key: &str, value: &TypedValue) -> Result<()> {
        match value {
            TypedValue::Text(s) => self.write_text(key, s).await,
            TypedValue::Integer(i) => self.write_integer(key, *i).await,
            TypedValue::Float(x) => self.write_float(key, *x).await,
            TypedValue::Boolean(b) => self.write_boolean(key, *b).await,
        }
    }

    fn load_prefixed(&self, prefix: &str) -> Result<BTreeMap<String, TypedValue>> {
        let mut entries = BTreeMap::new();
        for key in self.list_keys()? {
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(value) = self.read_raw(&key)? {
                entries.insert(key, value);
            }
        }
        Ok(entries)
    }
}
