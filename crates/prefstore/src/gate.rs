//! One-shot readiness signal.

use tokio::sync::watch;

/// State of a [`ReadyGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyState {
    /// Initial load still in flight.
    Pending,
    /// Initial load completed.
    Ready,
    /// The backend could not be acquired or read.
    Failed(String),
}

/// A one-shot completion cell: `Pending` moves to `Ready` or `Failed` once
/// and never changes again. Any number of tasks may wait on it.
#[derive(Debug)]
pub struct ReadyGate {
    tx: watch::Sender<ReadyState>,
}

impl ReadyGate {
    /// A gate that has not resolved yet.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ReadyState::Pending);
        Self { tx }
    }

    /// A gate that is already resolved.
    pub fn ready() -> Self {
        let (tx, _rx) = watch::channel(ReadyState::Ready);
        Self { tx }
    }

    /// Resolve the gate. Returns `false` if it had already left `Pending`.
    pub fn resolve(&self) -> bool {
        self.transition(ReadyState::Ready)
    }

    /// Fail the gate. Returns `false` if it had already left `Pending`.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.transition(ReadyState::Failed(reason.into()))
    }

    fn transition(&self, next: ReadyState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ReadyState::Pending {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    pub fn state(&self) -> ReadyState {
        self.tx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow() == ReadyState::Ready
    }

    /// Wait until the gate leaves `Pending` and return the final state.
    pub async fn wait(&self) -> ReadyState {
        let mut rx = self.tx.subscribe();
        let state = match rx.wait_for(|state| *state != ReadyState::Pending).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}
