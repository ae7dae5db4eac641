// SPDX-License-Identifier: MIT

//! Suspension payloads
//!
//! An [`Interrupt`] is how a step hands control to the external actor. The
//! set of variants is closed: the orchestrator renders each one explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capability::Capability;

/// What the external actor must do before the session can resume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Interrupt {
    /// Invoke a named capability with the given input, then resume with its result
    #[serde(rename_all = "camelCase")]
    Delegate {
        capability: Capability,
        input: Value,
    },
    /// Follow free-form instructions, then resume with a value matching `result_schema`
    #[serde(rename_all = "camelCase")]
    Guidance {
        instructions: String,
        result_schema: Value,
    },
}

impl Interrupt {
    pub fn delegate(capability: Capability, input: Value) -> Self {
        Self::Delegate { capability, input }
    }

    pub fn guidance(instructions: impl Into<String>, result_schema: Value) -> Self {
        Self::Guidance {
            instructions: instructions.into(),
            result_schema,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delegate { .. } => "delegate",
            Self::Guidance { .. } => "guidance",
        }
    }
}
