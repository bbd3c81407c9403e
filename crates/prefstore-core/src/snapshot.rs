//! Snapshots: the complete visible state of a store at one instant.
//!
//! A snapshot is never edited in place. Every change produces a new snapshot,
//! which the store installs by swapping a shared pointer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::TypedValue;

/// Prefix-based key namespace.
///
/// The qualified key is the plain concatenation `prefix + key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Qualify an unqualified key.
    pub fn qualify(&self, key: &str) -> String {
        let mut qualified = String::with_capacity(self.prefix.len() + key.len());
        qualified.push_str(&self.prefix);
        qualified.push_str(key);
        qualified
    }

    /// Strip the prefix from a qualified key, if it belongs to this space.
    pub fn strip<'a>(&self, qualified: &'a str) -> Option<&'a str> {
        qualified.strip_prefix(self.prefix.as_str())
    }

    /// Check if a qualified key belongs to this space.
    pub fn contains(&self, qualified: &str) -> bool {
        qualified.starts_with(self.prefix.as_str())
    }
}

/// Immutable mapping from qualified key to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, TypedValue>,
}

impl Snapshot {
    /// An empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, TypedValue>) -> Self {
        Self { entries }
    }

    /// Build a new snapshot with one key set (`Some`) or removed (`None`).
    ///
    /// `self` is left untouched.
    pub fn with_change(&self, key: &str, value: Option<TypedValue>) -> Self {
        let mut entries = self.entries.clone();
        match value {
            Some(v) => {
                entries.insert(key.to_string(), v);
            }
            None => {
                entries.remove(key);
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(qualified key, value)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over the qualified keys in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn into_entries(self) -> BTreeMap<String, TypedValue> {
        self.entries
    }
}

impl FromIterator<(String, TypedValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, TypedValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
