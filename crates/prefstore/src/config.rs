//! Store configuration.

use std::time::Duration;

use prefstore_core::DefaultSchema;

/// Configuration for background flushes.
#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// Extra attempts after a failed backend write.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
    /// Buffered [`crate::FlushFailure`] records per diagnostics subscriber.
    pub diagnostics_capacity: usize,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(50),
            diagnostics_capacity: 64,
        }
    }
}

impl FlushConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Configuration for a [`crate::Store`].
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Declared defaults. Fixes the kind of every declared key.
    pub default_values: DefaultSchema,
    /// Prepended to every key before it reaches the snapshot or backend.
    pub prefix: String,
    /// Flush behaviour.
    pub flush: FlushConfig,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self, defaults: DefaultSchema) -> Self {
        self.default_values = defaults;
        self
    }

    /// Set the key prefix.
    ///
    /// Keys are qualified by plain concatenation, so a store with prefix `"a"`
    /// also loads and lists keys written under `"ab"`. End prefixes with a
    /// separator such as `"."` when several stores share one backend.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_flush(mut self, flush: FlushConfig) -> Self {
        self.flush = flush;
        self
    }
}
