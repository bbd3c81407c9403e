//! # Prefstore Core
//!
//! Pure primitives for prefstore: typed values, default schemas, and snapshots.
//!
//! This crate contains no I/O, no storage, no async. It is pure computation
//! over the value model shared by the backends and the store.
//!
//! ## Key Types
//!
//! - [`TypedValue`] - The closed set of storable values (text, integer, float, boolean)
//! - [`ValueKind`] - Discriminator for a [`TypedValue`]
//! - [`DefaultSchema`] - Per-key defaults that also fix each key's kind
//! - [`Snapshot`] - Immutable map of qualified keys to values
//! - [`KeySpace`] - Prefix-based key qualification
//!
//! ## Kind Contract
//!
//! Once a key has a declared default, every write to it must carry a value of
//! the same [`ValueKind`]. See [`DefaultSchema::check`].

pub mod error;
pub mod schema;
pub mod snapshot;
pub mod types;

pub use error::{CoreError, Result};
pub use schema::DefaultSchema;
pub use snapshot::{KeySpace, Snapshot};
pub use types::{TypedValue, ValueKind};
