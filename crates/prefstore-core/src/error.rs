//! Error types for prefstore core.

use thiserror::Error;

use crate::types::ValueKind;

/// Errors raised while validating values and schemas.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A default value is not one of the storable kinds.
    #[error("invalid schema entry {key:?}: {reason}")]
    InvalidSchema { key: String, reason: String },

    /// A write carried a value whose kind disagrees with the declared default.
    #[error("type mismatch for {key:?}: expected {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// A raw value could not be represented as a [`crate::TypedValue`].
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
}

impl CoreError {
    /// Check if this is a kind mismatch on write.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, CoreError::TypeMismatch { .. })
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
