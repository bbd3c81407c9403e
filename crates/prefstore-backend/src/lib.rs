//! # Prefstore Backend
//!
//! Persistence abstraction for prefstore. Provides a trait-based interface
//! for durable typed key-value storage with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store never talks to a database directly. It goes through the
//! [`Backend`] trait, which mirrors a classic preferences API: reads are
//! synchronous (served from a cache the backend keeps), writes are async.
//!
//! ## Key Types
//!
//! - [`Backend`] - The trait for all persistence operations
//! - [`BackendExt`] - Typed dispatch and bulk loading on top of [`Backend`]
//! - [`SqliteBackend`] - SQLite-based persistent storage
//! - [`MemoryBackend`] - Shared in-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use prefstore_backend::{Backend, BackendExt, SqliteBackend};
//! use prefstore_core::TypedValue;
//!
//! async fn example() {
//!     // Open (or create) a database file off the async runtime
//!     let backend = SqliteBackend::open_async("prefs.db").await.unwrap();
//!
//!     // Write a value
//!     backend.write_value("app.counter", &TypedValue::Integer(5)).await.unwrap();
//!
//!     // Reads are synchronous
//!     let value = backend.read_raw("app.counter").unwrap();
//!     assert_eq!(value, Some(TypedValue::Integer(5)));
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Kind metadata**: every entry is stored with its kind tag; reads return
//!   the kind the entry was written with.
//! - **Idempotent removes**: removing a missing key returns `Ok(false)`.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{BackendError, Result};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use traits::{Backend, BackendExt};
