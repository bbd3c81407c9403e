//! Change observers.
//!
//! Observers carry no payload: they are told that the snapshot changed and
//! re-read whatever they care about through [`crate::Store::get`].

use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// A change callback.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Identifier handed out by [`ObserverRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Ordered set of observers.
#[derive(Default)]
pub struct ObserverRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    observers: Vec<(ObserverId, Observer)>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an observer. It runs after every observer registered before it.
    pub fn subscribe(&self, observer: impl Fn() + Send + Sync + 'static) -> ObserverId {
        let mut inner = self.guard();
        let id = ObserverId(inner.next_id);
        inner.next_id += 1;
        inner.observers.push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer. Unknown or already-removed ids are ignored.
    ///
    /// Returns `true` if an observer was removed.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut inner = self.guard();
        let before = inner.observers.len();
        inner.observers.retain(|(existing, _)| *existing != id);
        inner.observers.len() != before
    }

    /// Invoke every observer in registration order.
    ///
    /// The list is copied first so observers may subscribe, unsubscribe or
    /// write to the store while being notified.
    pub fn notify(&self) {
        let observers: Vec<Observer> = self
            .guard()
            .observers
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in observers {
            observer();
        }
    }

    pub fn len(&self) -> usize {
        self.guard().observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`crate::Store::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: ObserverId,
    registry: Weak<ObserverRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: ObserverId, registry: &Arc<ObserverRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Stop receiving notifications. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}
