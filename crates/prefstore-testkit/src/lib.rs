//! # Prefstore Testkit
//!
//! Testing utilities for prefstore.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a shared in-memory backend plus acquisition futures that
//!   resolve immediately, late, never, or with an error
//! - **Fault injection**: [`FlakyBackend`], a backend whose writes fail or stall on demand
//! - **Generators**: Proptest strategies for keys, kinds, and values
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use prefstore_testkit::generators::typed_value;
//!
//! proptest! {
//!     #[test]
//!     fn kind_is_stable(value in typed_value()) {
//!         prop_assert_eq!(value.clone().kind(), value.kind());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use prefstore_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! fixture.backend.seed("app.counter", 3);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{counter_schema, init_tracing, FlakyBackend, TestFixture};
pub use generators::{typed_value, value_kind, value_of_kind};
