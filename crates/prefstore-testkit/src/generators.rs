//! Proptest generators for property-based testing.

use proptest::prelude::*;

use prefstore_core::{TypedValue, ValueKind};

/// Generate a ValueKind.
pub fn value_kind() -> impl Strategy<Value = ValueKind> {
    prop_oneof![
        Just(ValueKind::Text),
        Just(ValueKind::Integer),
        Just(ValueKind::Float),
        Just(ValueKind::Boolean),
    ]
}

/// Generate a value of the given kind.
///
/// Floats are finite so generated values compare equal to themselves.
pub fn value_of_kind(kind: ValueKind) -> BoxedStrategy<TypedValue> {
    match kind {
        ValueKind::Text => "[ -~]{0,24}".prop_map(TypedValue::Text).boxed(),
        ValueKind::Integer => any::<i64>().prop_map(TypedValue::Integer).boxed(),
        ValueKind::Float => (-1.0e12f64..1.0e12).prop_map(TypedValue::Float).boxed(),
        ValueKind::Boolean => any::<bool>().prop_map(TypedValue::Boolean).boxed(),
    }
}

/// Generate a value of any kind.
pub fn typed_value() -> impl Strategy<Value = TypedValue> {
    value_kind().prop_flat_map(value_of_kind)
}

/// Generate a pair of values with different kinds.
pub fn mismatched_pair() -> impl Strategy<Value = (TypedValue, TypedValue)> {
    (value_kind(), value_kind())
        .prop_filter("kinds must differ", |(a, b)| a != b)
        .prop_flat_map(|(a, b)| (value_of_kind(a), value_of_kind(b)))
}

/// Generate an unqualified key.
pub fn key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}

/// Generate a non-empty key prefix ending in `.`.
///
/// Two distinct namespaces never qualify to overlapping keys.
pub fn namespace() -> impl Strategy<Value = String> {
    "[a-z]{1,6}\\.".prop_map(String::from)
}

/// Generate a key prefix, possibly empty.
pub fn prefix() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), namespace()]
}
