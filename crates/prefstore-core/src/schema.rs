//! Default schemas: per-key defaults that fix each key's kind.
//!
//! A schema is declared once, when a store is built, and never changes. Every
//! entry is validated eagerly so an invalid schema never produces a store.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::types::{TypedValue, ValueKind};

/// Immutable mapping from unqualified key to its default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultSchema {
    defaults: BTreeMap<String, TypedValue>,
}

impl DefaultSchema {
    /// An empty schema: every key is undeclared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from already-typed defaults.
    pub fn from_values<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<TypedValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            defaults: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build a schema from untyped JSON.
    ///
    /// The input must be an object; every member must convert to a
    /// [`TypedValue`]. The first offending member fails the whole schema
    /// with [`CoreError::InvalidSchema`].
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let object = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(CoreError::InvalidSchema {
                    key: String::new(),
                    reason: format!("expected an object of defaults, got {}", json_type(&other)),
                })
            }
        };

        let mut defaults = BTreeMap::new();
        for (key, raw) in object {
            let value = TypedValue::try_from(raw).map_err(|e| CoreError::InvalidSchema {
                key: key.clone(),
                reason: e.to_string(),
            })?;
            defaults.insert(key, value);
        }

        Ok(Self { defaults })
    }

    /// Add a default, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// The default for `key`, if declared.
    pub fn default_for(&self, key: &str) -> Option<&TypedValue> {
        self.defaults.get(key)
    }

    /// The declared kind for `key`, if any.
    pub fn kind_of(&self, key: &str) -> Option<ValueKind> {
        self.defaults.get(key).map(TypedValue::kind)
    }

    /// Check if `key` has a declared default.
    pub fn is_declared(&self, key: &str) -> bool {
        self.defaults.contains_key(key)
    }

    /// Validate a write of `value` to `key`.
    ///
    /// Undeclared keys accept any kind.
    pub fn check(&self, key: &str, value: &TypedValue) -> Result<()> {
        match self.kind_of(key) {
            Some(expected) if expected != value.kind() => Err(CoreError::TypeMismatch {
                key: key.to_string(),
                expected,
                actual: value.kind(),
            }),
            _ => Ok(()),
        }
    }

    /// Resolve the visible value for `key` given what is stored.
    ///
    /// For a declared key, a stored value of a different kind is treated as
    /// absent and masked by the default.
    pub fn resolve(&self, key: &str, stored: Option<&TypedValue>) -> Option<TypedValue> {
        match self.defaults.get(key) {
            Some(default) => match stored {
                Some(v) if v.kind() == default.kind() => Some(v.clone()),
                _ => Some(default.clone()),
            },
            None => stored.cloned(),
        }
    }

    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }

    /// Iterate over `(key, default)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.defaults.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
