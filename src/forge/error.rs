// SPDX-License-Identifier: MIT

//! Errors of the mobile scaffolding layer
//!
//! Steps convert most of these into `fatalErrorMessages` state entries; the
//! types exist so the conversion can say precisely what went wrong.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::engine::error::{CommandError, StepError};

/// Device listing, creation and readiness failures
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The named device never became booted and responsive
    #[error("Device '{name}' was not ready after {elapsed:?}")]
    ReadinessTimeout { name: String, elapsed: Duration },

    /// A device tool exited unsuccessfully
    #[error("'{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Device tool output could not be understood
    #[error("Could not parse device listing: {0}")]
    Parse(String),

    /// No runtime or system image to create a device from
    #[error("No installed runtime available to create a device")]
    NoRuntime,

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Bundle identifier extraction failures
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("No .xcodeproj found in {0:?}")]
    NoProject(PathBuf),

    #[error("Several .xcodeproj directories found in {dir:?}: {found:?}")]
    AmbiguousProject { dir: PathBuf, found: Vec<String> },

    #[error("PRODUCT_BUNDLE_IDENTIFIER not found in {0:?}")]
    BundleIdNotFound(PathBuf),

    /// The identifier still contains a build variable such as `$(PRODUCT_NAME)`
    #[error("Bundle identifier '{0}' contains an unresolved build variable")]
    UnresolvedBundleId(String),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

impl DeviceError {
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl From<DeviceError> for StepError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Command(e) => StepError::Command(e),
            other => StepError::Other(other.to_string()),
        }
    }
}

impl From<BundleError> for StepError {
    fn from(e: BundleError) -> Self {
        match e {
            BundleError::Io { source, .. } => StepError::Io(source),
            other => StepError::Other(other.to_string()),
        }
    }
}
