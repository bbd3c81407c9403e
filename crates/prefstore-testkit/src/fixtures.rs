//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use prefstore_backend::{Backend, BackendError, MemoryBackend, Result};
use prefstore_core::{DefaultSchema, TypedValue};

/// A test fixture holding one shared in-memory backend.
///
/// Every acquisition future hands out a clone of the same backend, so stores
/// built from one fixture see each other's persisted writes.
#[derive(Clone, Default)]
pub struct TestFixture {
    pub backend: MemoryBackend,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquisition that resolves on first poll.
    pub fn acquire(&self) -> impl Future<Output = Result<MemoryBackend>> + Send + 'static {
        std::future::ready(Ok(self.backend.clone()))
    }

    /// Acquisition that resolves after `delay`.
    pub fn acquire_after(
        &self,
        delay: Duration,
    ) -> impl Future<Output = Result<MemoryBackend>> + Send + 'static {
        let backend = self.backend.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok(backend)
        }
    }

    /// Acquisition that resolves once `release` is notified.
    pub fn acquire_on(
        &self,
        release: Arc<tokio::sync::Notify>,
    ) -> impl Future<Output = Result<MemoryBackend>> + Send + 'static {
        let backend = self.backend.clone();
        async move {
            release.notified().await;
            Ok(backend)
        }
    }

    /// Acquisition that never resolves.
    pub fn acquire_never() -> impl Future<Output = Result<MemoryBackend>> + Send + 'static {
        std::future::pending()
    }

    /// Acquisition that fails with `reason`.
    pub fn acquire_failing(
        reason: &str,
    ) -> impl Future<Output = Result<MemoryBackend>> + Send + 'static {
        std::future::ready(Err(BackendError::Unavailable(reason.to_string())))
    }

    /// Stored entries, keyed by qualified key.
    pub fn persisted(&self) -> BTreeMap<String, TypedValue> {
        self.backend.entries()
    }
}

/// The schema used by most scenarios: `counter` defaults to integer 0.
pub fn counter_schema() -> DefaultSchema {
    DefaultSchema::new().with("counter", 0)
}

/// Install a test-friendly tracing subscriber. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// A backend whose writes can be made to fail or stall.
///
/// Reads always succeed and come from the wrapped [`MemoryBackend`].
#[derive(Clone, Default)]
pub struct FlakyBackend {
    pub inner: MemoryBackend,
    faults: Arc<Faults>,
}

#[derive(Default)]
struct Faults {
    /// Fail every write while set.
    broken: AtomicBool,
    /// Fail this many upcoming writes.
    fail_next: AtomicU32,
    /// Failed write attempts so far.
    failures: AtomicU32,
    /// Keys whose writes stall before completing.
    slow_keys: Mutex<BTreeMap<String, Duration>>,
}

impl FlakyBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    /// Fail every write until called again with `false`.
    pub fn set_broken(&self, broken: bool) {
        self.faults.broken.store(broken, Ordering::SeqCst);
    }

    /// Fail the next `count` writes, then recover.
    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next.store(count, Ordering::SeqCst);
    }

    /// Stall writes to `key` for `delay`.
    pub fn slow_key(&self, key: impl Into<String>, delay: Duration) {
        if let Ok(mut slow) = self.faults.slow_keys.lock() {
            slow.insert(key.into(), delay);
        }
    }

    /// Number of writes that failed so far.
    pub fn failures(&self) -> u32 {
        self.faults.failures.load(Ordering::SeqCst)
    }

    async fn gate(&self, key: &str) -> Result<()> {
        let delay = self
            .faults
            .slow_keys
            .lock()
            .ok()
            .and_then(|slow| slow.get(key).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scheduled = self
            .faults
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scheduled || self.faults.broken.load(Ordering::SeqCst) {
            self.faults.failures.fetch_add(1, Ordering::SeqCst);
            return Err(BackendError::Unavailable(format!("injected failure for {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FlakyBackend {
    fn list_keys(&self) -> Result<BTreeSet<String>> {
        self.inner.list_keys()
    }

    fn read_raw(&self, key: &str) -> Result<Option<TypedValue>> {
        self.inner.read_raw(key)
    }

    async fn write_text(&self, key: &str, value: &str) -> Result<()> {
        self.gate(key).await?;
        self.inner.write_text(key, value).await
    }

    async fn write_integer(&self, key: &str, value: i64) -> Result<()> {
        self.gate(key).await?;
        self.inner.write_integer(key, value).await
    }

    async fn write_float(&self, key: &str, value: f64) -> Result<()> {
        self.gate(key).await?;
        self.inner.write_float(key, value).await
    }

    async fn write_boolean(&self, key: &str, value: bool) -> Result<()> {
        self.gate(key).await?;
        self.inner.write_boolean(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.gate(key).await?;
        self.inner.remove(key).await
    }
}
