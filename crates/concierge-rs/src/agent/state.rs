//! The shared key-value context threaded through a workflow.

use crate::Error;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// State key holding the raw user request.
pub const INPUT_KEY: &str = "user_input";

/// Ordered map of state keys to JSON values.
///
/// Each step reads the keys it declares and writes exactly one output key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SessionState {
    values: BTreeMap<String, Value>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state holding only `input` under [`INPUT_KEY`].
    pub fn with_input(input: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.insert(INPUT_KEY, Value::String(input.into()));
        state
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The value under `key` if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Deserialize the value under `key`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, Error> {
        let value = self.values.get(key).ok_or_else(|| Error::StateKey {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
            reason: "key not present".into(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| Error::StateKey {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
            reason: e.to_string(),
        })
    }

    /// Write `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The user input, or `""` when absent.
    pub fn input(&self) -> &str {
        self.get_str(INPUT_KEY).unwrap_or_default()
    }

    /// Prompt-ready text for `key`: strings verbatim, anything else as pretty JSON.
    pub fn render(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        })
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.values
    }
}
