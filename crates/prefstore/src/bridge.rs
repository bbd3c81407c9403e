//! The persistence bridge: initial load and ordered background flushes.
//!
//! The bridge owns the backend handle. It loads the store's keys once, then
//! persists every change the store installs. Changes are diffs (one key each),
//! travel over a single ordered channel, and are written by one worker task,
//! so a later write can never be overtaken by an earlier one.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, OnceLock};

use prefstore_backend::{Backend, BackendError, BackendExt};
use prefstore_core::TypedValue;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::FlushConfig;
use crate::error::{Result, StoreError};
use crate::store::StoreState;

/// One installed change, waiting to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Change {
    /// Position in the store's total order of installs.
    pub seq: u64,
    /// Qualified key.
    pub key: String,
    /// New value, or `None` to remove the key.
    pub value: Option<TypedValue>,
}

/// A change that could not be persisted after every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushFailure {
    /// Sequence number of the failed change.
    pub seq: u64,
    /// Qualified key.
    pub key: String,
    /// The value that was being written, or `None` for a removal.
    pub value: Option<TypedValue>,
    /// Number of attempts made.
    pub attempts: u32,
    /// The last backend error.
    pub error: String,
}

/// Store-side handle to the flush worker.
pub(crate) struct PersistenceBridge<B> {
    changes: mpsc::UnboundedSender<Change>,
    progress: watch::Receiver<u64>,
    failures: broadcast::Sender<FlushFailure>,
    backend: Arc<OnceLock<Arc<B>>>,
}

impl<B: Backend> PersistenceBridge<B> {
    /// Start acquiring the backend in the background.
    ///
    /// The worker loads the store once the acquisition resolves, then starts
    /// flushing. A failed acquisition fails the store's ready gate.
    pub(crate) fn deferred<F>(state: Arc<StoreState>, config: &FlushConfig, acquire: F) -> Result<Self>
    where
        F: Future<Output = prefstore_backend::Result<B>> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let (bridge, worker) = Self::channels(config);
        let slot = bridge.backend.clone();

        runtime.spawn(async move {
            let backend = match acquire.await {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    tracing::warn!(error = %e, "backend acquisition failed");
                    state.abandon_load(&e);
                    return;
                }
            };

            if let Err(e) = load(&state, backend.as_ref()) {
                tracing::warn!(error = %e, "initial load failed");
                state.abandon_load(&e);
                return;
            }

            let _ = slot.set(backend.clone());
            drop(state);
            worker.run(backend).await;
        });

        Ok(bridge)
    }

    /// Adopt an already-acquired backend.
    ///
    /// The store is loaded before this returns, so its gate is already
    /// resolved; only flushing happens in the background.
    pub(crate) fn preloaded(state: &StoreState, config: &FlushConfig, backend: Arc<B>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        load(state, backend.as_ref())?;

        let (bridge, worker) = Self::channels(config);
        let _ = bridge.backend.set(backend.clone());
        runtime.spawn(worker.run(backend));

        Ok(bridge)
    }

    fn channels(config: &FlushConfig) -> (Self, FlushWorker) {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = watch::channel(0);
        let (failures, _) = broadcast::channel(config.diagnostics_capacity.max(1));

        let bridge = Self {
            changes: changes_tx,
            progress: progress_rx,
            failures: failures.clone(),
            backend: Arc::new(OnceLock::new()),
        };
        let worker = FlushWorker {
            changes: changes_rx,
            progress: progress_tx,
            failures,
            config: config.clone(),
            applied: HashMap::new(),
        };
        (bridge, worker)
    }

    /// Hand a change to the worker. Never blocks, never fails the caller.
    pub(crate) fn schedule_flush(&self, change: Change) {
        if let Err(e) = self.changes.send(change) {
            tracing::debug!(key = %e.0.key, "flush worker gone, change kept in memory only");
        }
    }

    /// Wait until the worker has handled every change up to `seq`.
    ///
    /// Returns `false` if the worker stopped first.
    pub(crate) async fn flushed(&self, seq: u64) -> bool {
        let mut progress = self.progress.clone();
        let reached = progress.wait_for(|done| *done >= seq).await.is_ok();
        reached
    }

    pub(crate) fn failures(&self) -> broadcast::Receiver<FlushFailure> {
        self.failures.subscribe()
    }

    pub(crate) fn backend(&self) -> Option<Arc<B>> {
        self.backend.get().cloned()
    }
}

/// Read every key under the store's prefix and install it.
fn load<B: Backend>(state: &StoreState, backend: &B) -> prefstore_backend::Result<()> {
    let entries = backend.load_prefixed(state.keys.prefix())?;
    let loaded = entries.len();
    let replayed = state.install_loaded(entries);

    state.gate.resolve();
    state.observers.notify();

    tracing::info!(
        prefix = state.keys.prefix(),
        loaded,
        replayed,
        "initial load complete"
    );
    Ok(())
}

/// The background task that persists changes.
struct FlushWorker {
    changes: mpsc::UnboundedReceiver<Change>,
    progress: watch::Sender<u64>,
    failures: broadcast::Sender<FlushFailure>,
    config: FlushConfig,
    /// Last persisted seq per key.
    applied: HashMap<String, u64>,
}

impl FlushWorker {
    async fn run<B: Backend>(mut self, backend: Arc<B>) {
        while let Some(first) = self.changes.recv().await {
            // Drain whatever else is queued and keep only the newest change per key.
            let mut high = first.seq;
            let mut batch = BTreeMap::new();
            coalesce(&mut batch, first);
            while let Ok(next) = self.changes.try_recv() {
                high = high.max(next.seq);
                coalesce(&mut batch, next);
            }

            for change in batch.into_values() {
                self.persist(backend.as_ref(), change).await;
            }

            self.progress.send_modify(|done| *done = (*done).max(high));
        }

        tracing::debug!("flush worker stopped");
    }

    async fn persist<B: Backend>(&mut self, backend: &B, change: Change) {
        if self
            .applied
            .get(&change.key)
            .is_some_and(|&last| last > change.seq)
        {
            tracing::debug!(key = %change.key, seq = change.seq, "dropping stale change");
            return;
        }

        let mut attempts = 0;
        let error: BackendError = loop {
            attempts += 1;
            let result = match &change.value {
                Some(value) => backend.write_value(&change.key, value).await,
                None => backend.remove(&change.key).await.map(|_| ()),
            };

            match result {
                Ok(()) => {
                    self.applied.insert(change.key, change.seq);
                    return;
                }
                Err(e) if attempts <= self.config.max_retries => {
                    tracing::debug!(key = %change.key, attempts, error = %e, "write failed, retrying");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => break e,
            }
        };

        tracing::warn!(key = %change.key, seq = change.seq, attempts, error = %error, "flush failed");
        let _ = self.failures.send(FlushFailure {
            seq: change.seq,
            key: change.key,
            value: change.value,
            attempts,
            error: error.to_string(),
        });
    }
}

fn coalesce(batch: &mut BTreeMap<String, Change>, change: Change) {
    match batch.get(&change.key) {
        Some(existing) if existing.seq > change.seq => {}
        _ => {
            batch.insert(change.key.clone(), change);
        }
    }
}
