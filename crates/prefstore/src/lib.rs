//! # Prefstore
//!
//! A reactive, typed key-value store with asynchronous persistence.
//!
//! ## Overview
//!
//! Prefstore gives callers synchronous read/write access to a small set of
//! named values while mirroring every write to a backend in the background:
//!
//! - **Typed values**: text, integer, float, boolean - nothing else
//! - **Default schema**: a declared default fixes a key's kind for good
//! - **Snapshots**: reads see a complete, immutable state; writes swap it
//! - **Readiness**: a one-shot signal for the initial backend load
//! - **Observers**: synchronous change notifications
//!
//! ## Key Concepts
//!
//! - **Qualified key**: `prefix + key`. Stores with different prefixes over
//!   one backend never see each other's keys.
//! - **Masking**: a stored value whose kind disagrees with the declared
//!   default reads as the default.
//! - **Flush**: the background write of a change. Flushes are ordered,
//!   per-key, retried a bounded number of times, and failures are reported
//!   on [`Store::flush_failures`] instead of to the writer.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use prefstore::{DefaultSchema, Store, StoreConfig, TypedValue};
//! use prefstore::backend::SqliteBackend;
//!
//! async fn example() {
//!     let config = StoreConfig::new()
//!         .with_prefix("app.")
//!         .with_defaults(DefaultSchema::new().with("counter", 0));
//!
//!     // Open storage in the background
//!     let store = Store::deferred(config, SqliteBackend::open_async("prefs.db")).unwrap();
//!
//!     // Usable immediately: defaults until the load completes
//!     assert_eq!(store.get("counter"), Some(TypedValue::Integer(0)));
//!
//!     store.ready().await.unwrap();
//!     store.set("counter", 5).unwrap();
//!     assert!(store.set("counter", "five").is_err());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `prefstore::core` - Value model (TypedValue, DefaultSchema, Snapshot)
//! - `prefstore::backend` - Backend trait, SQLite and in-memory backends

pub mod bridge;
pub mod config;
pub mod error;
pub mod gate;
pub mod observer;
pub mod store;

// Re-export component crates
pub use prefstore_backend as backend;
pub use prefstore_core as core;

// Re-export main types for convenience
pub use bridge::FlushFailure;
pub use config::{FlushConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use gate::{ReadyGate, ReadyState};
pub use observer::{ObserverId, ObserverRegistry, Subscription};
pub use store::Store;

// Re-export commonly used core types
pub use prefstore_core::{CoreError, DefaultSchema, KeySpace, Snapshot, TypedValue, ValueKind};
