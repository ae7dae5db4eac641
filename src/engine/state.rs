// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow sessions
//!
//! State is an open JSON record. Steps never mutate it; they return a
//! [`StatePatch`] and the executor builds the next state with
//! [`WorkflowState::merge`], a shallow key-level overwrite.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Accumulated workflow knowledge for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowState {
    fields: Map<String, Value>,
}

/// Partial update produced by a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatePatch {
    fields: Map<String, Value>,
}

impl WorkflowState {
    /// Create an empty WorkflowState
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a state from a JSON object. Non-object values yield `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Shallow-merge a patch, returning the new state. `self` is untouched.
    pub fn merge(&self, patch: StatePatch) -> Self {
        let mut fields = self.fields.clone();
        for (key, value) in patch.fields {
            fields.insert(key, value);
        }
        Self { fields }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested field value using dot notation (e.g., "device.name")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Boolean field; anything that is not a JSON bool reads as absent
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    /// Integer field; accepts integral JSON numbers only
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    /// Non-empty string field. `null`, absent and `""` are all `None`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// True when the field holds a meaningful value
    pub fn is_present(&self, key: &str) -> bool {
        match self.fields.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// String array field; non-string members are skipped
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, builder style
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Set a field in place
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Copy every member of a JSON object into the patch.
    /// Returns false (and changes nothing) for non-objects.
    pub fn extend_from_object(&mut self, value: &Value) -> bool {
        match value.as_object() {
            Some(obj) => {
                for (k, v) in obj {
                    self.fields.insert(k.clone(), v.clone());
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
