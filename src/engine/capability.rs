// SPDX-License-Identifier: MIT

//! External capabilities that a step can delegate to
//!
//! A capability is something the external actor can invoke on our behalf
//! (for instance another tool exposed next to this workflow). The engine never
//! calls it; it only describes it inside a delegate interrupt.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Descriptor of an externally invocable capability.
///
/// Descriptors are usually built once per step and kept in a `Lazy`, since
/// the input contract is derived from a Rust type via `schemars`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// Unique capability id, as known by the external actor
    pub id: String,
    /// Human-readable description of what the capability does
    pub description: String,
    /// JSON schema of the input the capability accepts
    pub input_schema: Value,
}

impl Capability {
    pub fn new(id: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Build a descriptor whose input contract is the JSON schema of `T`
    pub fn for_input<T: JsonSchema>(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(id, description, schema_of::<T>())
    }
}

/// JSON schema of `T` as a plain value
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}
