//! The value model: a closed set of storable kinds.
//!
//! Anything outside these four kinds cannot be represented, so kind checks
//! are plain `match`es rather than runtime type inspection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// The kind of a [`TypedValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Boolean,
}

impl ValueKind {
    /// All kinds, in tag order.
    pub const ALL: [ValueKind; 4] = [
        ValueKind::Text,
        ValueKind::Integer,
        ValueKind::Float,
        ValueKind::Boolean,
    ];

    /// Stable lowercase name, used as the backend type tag.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
        }
    }

    /// Parse a type tag produced by [`ValueKind::as_str`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(ValueKind::Text),
            "integer" => Some(ValueKind::Integer),
            "float" => Some(ValueKind::Float),
            "boolean" => Some(ValueKind::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A storable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TypedValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl TypedValue {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Text(_) => ValueKind::Text,
            TypedValue::Integer(_) => ValueKind::Integer,
            TypedValue::Float(_) => ValueKind::Float,
            TypedValue::Boolean(_) => ValueKind::Boolean,
        }
    }

    /// Check if this value has the given kind.
    pub fn is_kind(&self, kind: ValueKind) -> bool {
        self.kind() == kind
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            TypedValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            TypedValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Text(s) => write!(f, "{:?}", s),
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Float(x) => write!(f, "{}", x),
            TypedValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::Text(s)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::Text(s.to_string())
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        TypedValue::Integer(i)
    }
}

impl From<i32> for TypedValue {
    fn from(i: i32) -> Self {
        TypedValue::Integer(i64::from(i))
    }
}

impl From<f64> for TypedValue {
    fn from(x: f64) -> Self {
        TypedValue::Float(x)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Boolean(b)
    }
}

macro_rules! impl_try_from_value {
    ($ty:ty, $variant:ident, $kind:expr) => {
        impl TryFrom<TypedValue> for $ty {
            type Error = CoreError;

            fn try_from(value: TypedValue) -> Result<Self, Self::Error> {
                match value {
                    TypedValue::$variant(v) => Ok(v),
                    other => Err(CoreError::UnsupportedValue(format!(
                        "expected {}, got {}",
                        $kind,
                        other.kind()
                    ))),
                }
            }
        }
    };
}

impl_try_from_value!(String, Text, ValueKind::Text);
impl_try_from_value!(i64, Integer, ValueKind::Integer);
impl_try_from_value!(f64, Float, ValueKind::Float);
impl_try_from_value!(bool, Boolean, ValueKind::Boolean);

impl TryFrom<serde_json::Value> for TypedValue {
    type Error = CoreError;

    /// Convert an untyped JSON value.
    ///
    /// Integers must fit in an `i64`; `null`, arrays and objects are rejected.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::String(s) => Ok(TypedValue::Text(s)),
            Value::Bool(b) => Ok(TypedValue::Boolean(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(TypedValue::Integer(i))
                } else if n.is_u64() {
                    Err(CoreError::UnsupportedValue(format!(
                        "integer {} out of range",
                        n
                    )))
                } else {
                    n.as_f64()
                        .map(TypedValue::Float)
                        .ok_or_else(|| CoreError::UnsupportedValue(format!("number {}", n)))
                }
            }
            Value::Null => Err(CoreError::UnsupportedValue("null".into())),
            Value::Array(_) => Err(CoreError::UnsupportedValue("array".into())),
            Value::Object(_) => Err(CoreError::UnsupportedValue("object".into())),
        }
    }
}
