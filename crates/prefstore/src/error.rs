//! Error types for the Store.

use prefstore_backend::BackendError;
use prefstore_core::CoreError;
use thiserror::Error;

/// Errors that can occur during Store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Schema or value validation error.
    #[error("validation error: {0}")]
    Core(#[from] CoreError),

    /// Backend error during construction.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The backend could not be acquired or loaded.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Construction happened outside a Tokio runtime.
    #[error("a store must be created inside a Tokio runtime")]
    NoRuntime,
}

impl StoreError {
    /// Check if this is a kind mismatch from `set`.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, StoreError::Core(e) if e.is_type_mismatch())
    }
}

/// Result type for Store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
