// SPDX-License-Identifier: MIT

//! Typed error handling for the workflow engine
//!
//! Every layer of the engine gets its own error enum so callers can match on
//! what actually went wrong; `EngineError` is what the executor and the
//! orchestrator surface to their callers.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for graph execution and session handling
#[derive(Debug, Error)]
pub enum EngineError {
    /// A step failed. Its partial output was discarded.
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: StepError,
    },

    /// The cursor points at a step the graph does not contain
    #[error("Step '{0}' is not part of the graph")]
    UnknownStep(String),

    /// A router returned a name outside of its declared destinations
    #[error("Router after '{from}' returned undeclared destination '{route}'")]
    UnknownRoute { from: String, route: String },

    /// Safety limit for runaway retry loops
    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    /// Graph construction errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Checkpoint persistence errors
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Errors detected while assembling a graph
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// Two steps registered under the same name
    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    /// A step tried to use one of the reserved START/END names
    #[error("Step name '{0}' is reserved")]
    ReservedName(String),

    /// No edge leaves START
    #[error("Graph has no entry edge from START")]
    MissingEntry,

    /// An edge refers to a step that was never registered
    #[error("Edge from '{from}' refers to unknown step '{to}'")]
    UnknownTarget { from: String, to: String },

    /// An edge starts at a step that was never registered
    #[error("Edge source '{0}' is not a registered step")]
    UnknownSource(String),

    /// More than one outgoing edge from a step
    #[error("Step '{0}' already has an outgoing edge")]
    DuplicateEdge(String),

    /// A step with no way forward
    #[error("Step '{0}' has no outgoing edge")]
    DeadEnd(String),

    /// A router declared without any destination
    #[error("Router after '{0}' declares no destinations")]
    EmptyRouter(String),
}

/// Errors a step may return. Business failures are never errors; they are
/// state fields inspected by routers.
#[derive(Debug, Error)]
pub enum StepError {
    /// The step was resumed but never suspends
    #[error("Step '{0}' has no suspension point and cannot be resumed")]
    NotResumable(String),

    /// The resume value does not have the expected shape
    #[error("Invalid resume value: {0}")]
    InvalidResumeValue(String),

    /// A required state field is missing
    #[error("Missing state field '{0}'")]
    MissingField(String),

    /// External command failure that the step chose not to absorb
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Checkpoint store errors. A missing session is not an error.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Session id cannot be mapped onto the backing store
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Stored checkpoint could not be decoded
    #[error("Corrupt checkpoint for session {session_id}: {message}")]
    Corrupt { session_id: String, message: String },

    /// Backend storage error
    #[error("Checkpoint backend error: {0}")]
    Backend(String),
}

/// Transport-level failures of the command runner. A nonzero exit status is
/// reported through `CommandOutput::success`, never through this type.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be found on PATH
    #[error("Program not found: {program}")]
    NotFound { program: String },

    /// The program exceeded its timeout and was killed
    #[error("Program '{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// Any other failure to launch or wait for the process
    #[error("Failed to run '{program}': {message}")]
    Spawn { program: String, message: String },
}

impl EngineError {
    /// Wrap a step failure
    pub fn step(step: impl Into<String>, source: StepError) -> Self {
        Self::Step {
            step: step.into(),
            source,
        }
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl StepError {
    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl CommandError {
    /// Name of the program that failed
    pub fn program(&self) -> &str {
        match self {
            Self::NotFound { program } => program,
            Self::Timeout { program, .. } => program,
            Self::Spawn { program, .. } => program,
        }
    }
}

// Allow conversion from &str for backward compatibility
impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for StepError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for StepError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_wraps_source() {
        let err = EngineError::step("build", StepError::MissingField("projectPath".into()));
        let text = err.to_string();
        assert!(text.contains("build"));
        assert!(text.contains("projectPath"));
    }

    #[test]
    fn test_command_error_program() {
        let err = CommandError::Timeout {
            program: "xcodebuild".into(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.program(), "xcodebuild");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_engine_error_from_str() {
        let err: EngineError = "Something went wrong".into();
        assert_eq!(err.to_string(), "Something went wrong");
    }

    #[test]
    fn test_command_error_converts_into_step_error() {
        let err: StepError = CommandError::NotFound {
            program: "adb".into(),
        }
        .into();
        assert!(err.to_string().contains("adb"));
    }
}
