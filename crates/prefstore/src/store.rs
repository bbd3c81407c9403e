//! The Store: synchronous typed reads and writes over an async backend.
//!
//! Reads come from the current [`Snapshot`]. Writes are validated against the
//! [`DefaultSchema`], installed as a new snapshot, announced to observers, and
//! only then handed to the persistence bridge. None of that suspends.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use prefstore_backend::{Backend, BackendError};
use prefstore_core::{DefaultSchema, KeySpace, Snapshot, TypedValue};
use tokio::sync::broadcast;

use crate::bridge::{Change, FlushFailure, PersistenceBridge};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::gate::{ReadyGate, ReadyState};
use crate::observer::{ObserverRegistry, Subscription};

/// State shared between store handles and the load step of the bridge.
pub(crate) struct StoreState {
    pub(crate) keys: KeySpace,
    pub(crate) schema: DefaultSchema,
    pub(crate) gate: ReadyGate,
    pub(crate) observers: Arc<ObserverRegistry>,
    current: RwLock<Current>,
}

struct Current {
    snapshot: Arc<Snapshot>,
    /// Number of changes installed so far.
    seq: u64,
    /// True until the initial load is installed or abandoned.
    awaiting_load: bool,
    /// Changes installed while awaiting the load, replayed over it.
    early: Vec<(String, Option<TypedValue>)>,
}

impl StoreState {
    fn new(config: StoreConfig) -> Self {
        Self {
            keys: KeySpace::new(config.prefix),
            schema: config.default_values,
            gate: ReadyGate::new(),
            observers: Arc::new(ObserverRegistry::new()),
            current: RwLock::new(Current {
                snapshot: Arc::new(Snapshot::empty()),
                seq: 0,
                awaiting_load: true,
                early: Vec::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Current> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Current> {
        self.current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.read().snapshot.clone()
    }

    fn last_seq(&self) -> u64 {
        self.read().seq
    }

    /// Swap in a snapshot with one qualified key changed.
    fn install(&self, key: String, value: Option<TypedValue>) -> Change {
        let mut current = self.write();
        let next = current.snapshot.with_change(&key, value.clone());
        current.snapshot = Arc::new(next);
        current.seq += 1;
        if current.awaiting_load {
            current.early.push((key.clone(), value.clone()));
        }
        Change {
            seq: current.seq,
            key,
            value,
        }
    }

    /// Swap in the loaded entries, with early writes replayed on top.
    ///
    /// Returns the number of replayed writes.
    pub(crate) fn install_loaded(&self, mut entries: BTreeMap<String, TypedValue>) -> usize {
        let mut current = self.write();
        let early = std::mem::take(&mut current.early);
        for (key, value) in &early {
            match value {
                Some(v) => {
                    entries.insert(key.clone(), v.clone());
                }
                None => {
                    entries.remove(key);
                }
            }
        }
        current.snapshot = Arc::new(Snapshot::from_entries(entries));
        current.awaiting_load = false;
        early.len()
    }

    /// Give up on the initial load and fail the gate.
    pub(crate) fn abandon_load(&self, error: &BackendError) {
        {
            let mut current = self.write();
            current.awaiting_load = false;
            current.early.clear();
        }
        self.gate.fail(error.to_string());
    }
}

/// A reactive typed key-value store.
///
/// Cloning a `Store` yields another handle to the same store; pass handles to
/// whatever needs them.
///
/// A store must be created inside a Tokio runtime: persistence runs on a
/// spawned task. All methods except [`Store::ready`] and [`Store::flushed`]
/// return immediately.
pub struct Store<B: Backend> {
    state: Arc<StoreState>,
    bridge: Arc<PersistenceBridge<B>>,
}

impl<B: Backend> Clone for Store<B> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            bridge: self.bridge.clone(),
        }
    }
}

impl<B: Backend> Store<B> {
    /// Create a store whose backend is still being acquired.
    ///
    /// The store starts empty and serves defaults until `acquire` resolves and
    /// the initial load completes; [`Store::ready`] resolves at that point.
    pub fn deferred<F>(config: StoreConfig, acquire: F) -> Result<Self>
    where
        F: Future<Output = prefstore_backend::Result<B>> + Send + 'static,
    {
        let flush = config.flush.clone();
        let state = Arc::new(StoreState::new(config));
        let bridge = PersistenceBridge::deferred(state.clone(), &flush, acquire)?;
        Ok(Self {
            state,
            bridge: Arc::new(bridge),
        })
    }

    /// Create a store over an already-acquired backend.
    ///
    /// The initial snapshot is read before this returns and the store is
    /// ready immediately.
    pub fn preloaded(config: StoreConfig, backend: B) -> Result<Self> {
        let flush = config.flush.clone();
        let state = Arc::new(StoreState::new(config));
        let bridge = PersistenceBridge::preloaded(&state, &flush, Arc::new(backend))?;
        Ok(Self {
            state,
            bridge: Arc::new(bridge),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the visible value for `key`.
    ///
    /// A declared key always yields a value of its declared kind: the stored
    /// value if it has that kind, the default otherwise. An undeclared key
    /// yields the stored value or `None`.
    pub fn get(&self, key: &str) -> Option<TypedValue> {
        let qualified = self.state.keys.qualify(key);
        let snapshot = self.state.snapshot();
        self.state.schema.resolve(key, snapshot.get(&qualified))
    }

    /// Get the visible value for `key` as a primitive.
    ///
    /// Returns `None` if absent or of a different kind.
    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: TryFrom<TypedValue>,
    {
        self.get(key).and_then(|v| T::try_from(v).ok())
    }

    /// The current snapshot. Keys are qualified.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.snapshot()
    }

    /// Unqualified keys with a stored value, in key order.
    pub fn keys(&self) -> Vec<String> {
        let snapshot = self.state.snapshot();
        snapshot
            .keys()
            .filter_map(|k| self.state.keys.strip(k))
            .map(str::to_string)
            .collect()
    }

    pub fn schema(&self) -> &DefaultSchema {
        &self.state.schema
    }

    pub fn prefix(&self) -> &str {
        self.state.keys.prefix()
    }

    /// The backend handle, once acquired.
    pub fn backend(&self) -> Option<Arc<B>> {
        self.bridge.backend()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Set `key` to `value`.
    ///
    /// Fails with a type mismatch, leaving the store untouched, if `key` is
    /// declared with a different kind.
    pub fn set(&self, key: &str, value: impl Into<TypedValue>) -> Result<()> {
        self.apply(key, Some(value.into()))
    }

    /// Remove `key` from the store and the backend.
    ///
    /// A declared key reads as its default afterwards.
    pub fn unset(&self, key: &str) {
        self.commit(key, None);
    }

    /// Set (`Some`) or remove (`None`) `key`.
    pub fn apply(&self, key: &str, value: Option<TypedValue>) -> Result<()> {
        if let Some(value) = &value {
            self.state.schema.check(key, value)?;
        }
        self.commit(key, value);
        Ok(())
    }

    fn commit(&self, key: &str, value: Option<TypedValue>) {
        let change = self.state.install(self.state.keys.qualify(key), value);
        self.state.observers.notify();
        self.bridge.schedule_flush(change);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Readiness and persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Wait for the initial load.
    ///
    /// Resolves once; awaiting again returns the same result without
    /// reloading. Fails if the backend could not be acquired or read.
    pub async fn ready(&self) -> Result<()> {
        match self.state.gate.wait().await {
            ReadyState::Ready => Ok(()),
            ReadyState::Failed(reason) => Err(StoreError::BackendUnavailable(reason)),
            ReadyState::Pending => Err(StoreError::BackendUnavailable(
                "initial load did not complete".into(),
            )),
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state.gate.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state.gate.is_ready()
    }

    /// Wait until every change made so far has been persisted or reported
    /// on [`Store::flush_failures`].
    pub async fn flushed(&self) -> Result<()> {
        let target = self.state.last_seq();
        if self.bridge.flushed(target).await {
            return Ok(());
        }
        match self.state.gate.state() {
            ReadyState::Failed(reason) => Err(StoreError::BackendUnavailable(reason)),
            _ => Err(StoreError::BackendUnavailable("flush worker stopped".into())),
        }
    }

    /// Subscribe to changes that could not be persisted.
    pub fn flush_failures(&self) -> broadcast::Receiver<FlushFailure> {
        self.bridge.failures()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────────

    /// Call `observer` after every snapshot replacement, including the initial load.
    pub fn subscribe(&self, observer: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.state.observers.subscribe(observer);
        Subscription::new(id, &self.state.observers)
    }
}
