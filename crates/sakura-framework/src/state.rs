//! Stored state of a single resource instance
//!
//! The host hands state to the provider as an opaque JSON document and takes
//! back whatever the handler leaves behind. An empty [`State`] means the
//! resource is gone and the host should forget it.

use crate::error::{FrameworkError, Result};
use crate::value::{UNKNOWN_SENTINEL, find_unknown};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// State document exchanged with the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    raw: Option<serde_json::Value>,
}

impl State {
    /// State of a resource that does not exist
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        if value.is_null() {
            Self::empty()
        } else {
            Self { raw: Some(value) }
        }
    }

    /// Decode the stored document into a typed model
    pub fn get<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self.raw.as_ref().ok_or(FrameworkError::ResourceRemoved)?;
        serde_json::from_value(raw.clone()).map_err(|source| FrameworkError::Decode {
            what: "state",
            source,
        })
    }

    /// Replace the stored document with a flattened model
    ///
    /// Every attribute must be Known or Null by now.
    pub fn set<T: Serialize>(&mut self, model: &T) -> Result<()> {
        let value = serde_json::to_value(model)?;
        if let Some(path) = find_unknown(&value) {
            return Err(FrameworkError::UnknownInState(path));
        }
        self.raw = Some(value);
        Ok(())
    }

    /// Store a model left half-built by a failed operation
    ///
    /// Attributes that were still unknown are written as null.
    pub fn set_partial<T: Serialize>(&mut self, model: &T) -> Result<()> {
        let mut value = serde_json::to_value(model)?;
        null_unknowns(&mut value);
        self.raw = Some(value);
        Ok(())
    }

    pub fn get_attribute<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.raw
            .as_ref()
            .and_then(|raw| raw.get(key))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        let raw = self
            .raw
            .get_or_insert_with(|| serde_json::Value::Object(Default::default()));
        if let serde_json::Value::Object(map) = raw {
            map.insert(key.into(), value);
        }
    }

    /// Drop the resource; the host forgets it
    pub fn remove_resource(&mut self) {
        self.raw = None;
    }

    pub fn is_removed(&self) -> bool {
        self.raw.is_none()
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        self.raw.as_ref()
    }

    pub fn into_json(self) -> serde_json::Value {
        self.raw.unwrap_or(serde_json::Value::Null)
    }
}

fn null_unknowns(value: &mut serde_json::Value) {
    if value.as_str() == Some(UNKNOWN_SENTINEL) {
        *value = serde_json::Value::Null;
        return;
    }
    match value {
        serde_json::Value::Array(items) => items.iter_mut().for_each(null_unknowns),
        serde_json::Value::Object(map) => map.values_mut().for_each(null_unknowns),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct BridgeLike {
        id: Value<String>,
        name: Value<String>,
    }

    #[test]
    fn test_set_and_get() {
        let mut state = State::empty();
        assert!(state.is_removed());

        let model = BridgeLike {
            id: Value::known("113000000001"),
            name: Value::known("foo"),
        };
        state.set(&model).unwrap();

        let back: BridgeLike = state.get().unwrap();
        assert_eq!(back.id.as_str(), Some("113000000001"));
        assert_eq!(state.get_attribute::<String>("name").as_deref(), Some("foo"));
    }

    #[test]
    fn test_set_rejects_unknown() {
        let mut state = State::empty();
        let model = BridgeLike {
            id: Value::Unknown,
            name: Value::known("foo"),
        };
        let err = state.set(&model).unwrap_err();
        assert!(matches!(err, FrameworkError::UnknownInState(ref p) if p == "id"));
        assert!(state.is_removed());
    }

    #[test]
    fn test_set_partial_nulls_unknown() {
        let mut state = State::empty();
        let model = BridgeLike {
            id: Value::known("1"),
            name: Value::Unknown,
        };
        state.set_partial(&model).unwrap();
        assert_eq!(state.into_json(), json!({"id": "1", "name": null}));
    }

    #[test]
    fn test_remove_resource() {
        let mut state = State::from_json(json!({"id": "1"}));
        assert!(!state.is_removed());
        state.remove_resource();
        assert!(state.is_removed());
        assert!(matches!(
            state.get::<BridgeLike>(),
            Err(FrameworkError::ResourceRemoved)
        ));
    }

    #[test]
    fn test_set_attribute_on_empty_state() {
        let mut state = State::empty();
        state.set_attribute("id", json!("123"));
        let model: BridgeLike = state.get().unwrap();
        assert_eq!(model.id.as_str(), Some("123"));
        assert!(model.name.is_null());
    }
}
