//! Key System - scalar and composite keys and their canonical store form
//!
//! Every key has a canonical string form ([`StoreKey`]): a scalar key uses its
//! display form, a composite key joins its parts with `,`. The identity map,
//! the relation caches and foreign key matching all compare canonical forms,
//! so a string column holding `"1"` matches a numeric key `1`.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One component of a key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl KeyValue {
    /// Convert an attribute value into a key component.
    ///
    /// Floats, objects, arrays and `null` cannot act as key components.
    pub fn from_json(value: &Value) -> ModelResult<Self> {
        match value {
            Value::String(s) => Ok(KeyValue::Str(s.clone())),
            Value::Bool(b) => Ok(KeyValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(KeyValue::Int)
                .ok_or_else(|| ModelError::InvalidKey(format!("non-integer number {}", n))),
            other => Err(ModelError::InvalidKey(format!(
                "{} cannot be used as a key component",
                other
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            KeyValue::Str(s) => Value::String(s.clone()),
            KeyValue::Int(n) => Value::from(*n),
            KeyValue::Bool(b) => Value::Bool(*b),
        }
    }
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::Str(s) => write!(f, "{}", s),
            KeyValue::Int(n) => write!(f, "{}", n),
            KeyValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Str(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Str(value)
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Int(value as i64)
    }
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        KeyValue::Bool(value)
    }
}

/// A scalar or composite key value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Scalar(KeyValue),
    /// Parts in the declared order of the key attributes
    Composite(Vec<KeyValue>),
}

impl Key {
    pub fn is_composite(&self) -> bool {
        matches!(self, Key::Composite(_))
    }

    pub fn parts(&self) -> &[KeyValue] {
        match self {
            Key::Scalar(value) => std::slice::from_ref(value),
            Key::Composite(parts) => parts,
        }
    }

    /// Canonical form used by the identity map
    pub fn store_key(&self) -> StoreKey {
        StoreKey::from_parts(self.parts())
    }

    /// Check that this key can address a model keyed by `name`
    pub fn check_shape(&self, name: &KeyName) -> ModelResult<()> {
        match (self, name) {
            (Key::Scalar(_), KeyName::Single(_)) => Ok(()),
            (Key::Composite(parts), KeyName::Composite(attrs)) if parts.len() == attrs.len() => {
                Ok(())
            }
            _ => Err(ModelError::KeyShape {
                expected: name.describe(),
                found: self.describe(),
            }),
        }
    }

    fn describe(&self) -> String {
        match self {
            Key::Scalar(_) => "scalar key".to_string(),
            Key::Composite(parts) => format!("composite key of {} parts", parts.len()),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.store_key())
    }
}

impl From<KeyValue> for Key {
    fn from(value: KeyValue) -> Self {
        Key::Scalar(value)
    }
}

macro_rules! scalar_key_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Key::Scalar(KeyValue::from(value))
                }
            }
        )*
    };
}

scalar_key_from!(&str, String, i64, i32, bool);

impl<const N: usize> From<[&str; N]> for Key {
    fn from(parts: [&str; N]) -> Self {
        Key::Composite(parts.iter().map(|p| KeyValue::from(*p)).collect())
    }
}

impl<const N: usize> From<[i64; N]> for Key {
    fn from(parts: [i64; N]) -> Self {
        Key::Composite(parts.iter().map(|p| KeyValue::Int(*p)).collect())
    }
}

impl From<Vec<KeyValue>> for Key {
    fn from(parts: Vec<KeyValue>) -> Self {
        Key::Composite(parts)
    }
}

/// Attribute name(s) holding a key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyName {
    Single(String),
    Composite(Vec<String>),
}

impl KeyName {
    pub fn attributes(&self) -> &[String] {
        match self {
            KeyName::Single(name) => std::slice::from_ref(name),
            KeyName::Composite(names) => names,
        }
    }

    pub fn arity(&self) -> usize {
        self.attributes().len()
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, KeyName::Composite(_))
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes().iter().any(|a| a == attribute)
    }

    fn describe(&self) -> String {
        match self {
            KeyName::Single(name) => format!("scalar key '{}'", name),
            KeyName::Composite(names) => format!("composite key [{}]", names.join(", ")),
        }
    }
}

impl std::fmt::Display for KeyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.attributes().join(","))
    }
}

impl From<&str> for KeyName {
    fn from(name: &str) -> Self {
        KeyName::Single(name.to_string())
    }
}

impl From<String> for KeyName {
    fn from(name: String) -> Self {
        KeyName::Single(name)
    }
}

impl<const N: usize> From<[&str; N]> for KeyName {
    fn from(names: [&str; N]) -> Self {
        KeyName::Composite(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<Vec<String>> for KeyName {
    fn from(names: Vec<String>) -> Self {
        KeyName::Composite(names)
    }
}

impl From<Vec<&str>> for KeyName {
    fn from(names: Vec<&str>) -> Self {
        KeyName::Composite(names.into_iter().map(str::to_string).collect())
    }
}

/// Canonical string form of a key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_parts(parts: &[KeyValue]) -> Self {
        let joined: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
        StoreKey(joined.join(","))
    }

    /// Canonical form of raw attribute values.
    ///
    /// A single array value is flattened, which lets one attribute hold a
    /// composite foreign key. Returns `None` when any part is null or missing.
    pub fn from_values(values: &[Value]) -> Option<Self> {
        let mut parts = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::Array(items) => {
                    for item in items {
                        parts.push(Self::scalar_part(item)?);
                    }
                }
                other => parts.push(Self::scalar_part(other)?),
            }
        }

        if parts.is_empty() {
            return None;
        }
        Some(StoreKey(parts.join(",")))
    }

    fn scalar_part(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&Key> for StoreKey {
    fn from(key: &Key) -> Self {
        key.store_key()
    }
}
