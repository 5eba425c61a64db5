//! Tri-state attribute values
//!
//! The host separates "not yet known" from "explicitly absent", so every model
//! field is a [`Value`] rather than an `Option`.
//!
//! On the wire `Null` is JSON `null`, `Known(v)` is `v` and `Unknown` is the
//! [`UNKNOWN_SENTINEL`] string. [`crate::State::set`] refuses models that still
//! carry the sentinel.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker the host uses for values that are computed during apply
pub const UNKNOWN_SENTINEL: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// Attribute value as seen by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value<T> {
    /// Explicitly absent
    Null,
    /// Computed later, during apply
    Unknown,
    /// Concrete value
    Known(T),
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Null
    }
}

impl<T> Value<T> {
    pub fn known(value: impl Into<T>) -> Self {
        Value::Known(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Value::Known(_))
    }

    /// Null or Unknown
    pub fn is_absent(&self) -> bool {
        !self.is_known()
    }

    pub fn as_known(&self) -> Option<&T> {
        match self {
            Value::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Value::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Value::Known(v),
            None => Value::Null,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Value<U> {
        match self {
            Value::Null => Value::Null,
            Value::Unknown => Value::Unknown,
            Value::Known(v) => Value::Known(f(v)),
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.into_option().unwrap_or(default)
    }
}

impl<T: Clone + Default> Value<T> {
    /// The known value, or the zero value of `T`
    pub fn value_or_default(&self) -> T {
        self.as_known().cloned().unwrap_or_default()
    }
}

impl<T: PartialEq + Default> Value<T> {
    /// `Known(v)` unless `v` is the zero value, in which case `Null`
    pub fn non_zero(value: T) -> Self {
        if value == T::default() {
            Value::Null
        } else {
            Value::Known(value)
        }
    }
}

impl Value<String> {
    /// Empty strings flatten to `Null`
    pub fn string_or_null(value: impl Into<String>) -> Self {
        Value::non_zero(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_known().map(String::as_str)
    }
}

impl<T> From<Option<T>> for Value<T> {
    fn from(value: Option<T>) -> Self {
        Value::from_option(value)
    }
}

impl<T: Serialize> Serialize for Value<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Unknown => serializer.serialize_str(UNKNOWN_SENTINEL),
            Value::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        match raw {
            None | Some(serde_json::Value::Null) => Ok(Value::Null),
            Some(serde_json::Value::String(s)) if s == UNKNOWN_SENTINEL => Ok(Value::Unknown),
            Some(v) => T::deserialize(v).map(Value::Known).map_err(D::Error::custom),
        }
    }
}

/// Whether a JSON document still carries an unknown marker, and where
pub fn find_unknown(value: &serde_json::Value) -> Option<String> {
    fn walk(value: &serde_json::Value, path: &mut Vec<String>) -> bool {
        match value {
            serde_json::Value::String(s) => s == UNKNOWN_SENTINEL,
            serde_json::Value::Array(items) => items.iter().enumerate().any(|(i, v)| {
                path.push(format!("[{}]", i));
                let found = walk(v, path);
                if !found {
                    path.pop();
                }
                found
            }),
            serde_json::Value::Object(map) => map.iter().any(|(k, v)| {
                path.push(k.clone());
                let found = walk(v, path);
                if !found {
                    path.pop();
                }
                found
            }),
            _ => false,
        }
    }

    let mut path = Vec::new();
    if walk(value, &mut path) {
        Some(join_path(&path))
    } else {
        None
    }
}

fn join_path(segments: &[String]) -> String {
    let mut out = String::new();
    for segment in segments {
        if !out.is_empty() && !segment.starts_with('[') {
            out.push('.');
        }
        out.push_str(segment);
    }
    if out.is_empty() { "<root>".to_string() } else { out }
}
