// SPDX-License-Identifier: MIT

//! Forge configuration - YAML file loading and parsing
//!
//! Every field has a default, so an empty document (or no file at all) is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::device::ios::DEFAULT_DEVICE_TYPE;
use super::error::ConfigError;
use crate::engine::graph::DEFAULT_STEP_LIMIT;
use crate::engine::orchestrator::DEFAULT_SESSION_PREFIX;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "MOBILE_FORGE_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    /// Root directory of the file backend
    pub dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::File,
            dir: PathBuf::from(".mobile-forge/sessions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            max_wait_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub session_prefix: String,
    pub checkpoint: CheckpointConfig,
    pub max_build_retries: u32,
    pub command_timeout_secs: u64,
    pub build_timeout_secs: u64,
    pub readiness: ReadinessConfig,
    pub step_limit: usize,
    /// Fallback SDK locations used when the session does not supply its own
    pub android_home: Option<String>,
    pub java_home: Option<String>,
    /// Name given to a simulator or emulator created for deployment
    pub device_name: String,
    pub ios_device_type: String,
    /// Required before an AVD can be created, e.g. `system-images;android-34;google_apis;x86_64`
    pub android_system_image: Option<String>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            session_prefix: DEFAULT_SESSION_PREFIX.to_string(),
            checkpoint: CheckpointConfig::default(),
            max_build_retries: 3,
            command_timeout_secs: 60,
            build_timeout_secs: 900,
            readiness: ReadinessConfig::default(),
            step_limit: DEFAULT_STEP_LIMIT,
            android_home: None,
            java_home: None,
            device_name: "MobileForge".to_string(),
            ios_device_type: DEFAULT_DEVICE_TYPE.to_string(),
            android_system_image: None,
        }
    }
}

impl ForgeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.session_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("session_prefix must not be empty".into()));
        }
        if self.session_prefix.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(
                "session_prefix must not contain path separators".into(),
            ));
        }
        if self.device_name.trim().is_empty() {
            return Err(ConfigError::Invalid("device_name must not be empty".into()));
        }
        if self.step_limit == 0 {
            return Err(ConfigError::Invalid("step_limit must be positive".into()));
        }
        if self.readiness.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "readiness.poll_interval_ms must be positive".into(),
            ));
        }
        Ok(self)
    }
}

/// Loads [`ForgeConfig`] from YAML
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a config from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ForgeConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {:?}", path);
        Self::parse_yaml(&content)
    }

    /// Parse a config from a YAML string
    pub fn parse_yaml(content: &str) -> Result<ForgeConfig, ConfigError> {
        if content.trim().is_empty() {
            return Ok(ForgeConfig::default());
        }
        let config: ForgeConfig = serde_yaml::from_str(content)?;
        config.validate()
    }

    /// Explicit path, else `$MOBILE_FORGE_CONFIG`, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<ForgeConfig, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => match std::env::var(CONFIG_ENV) {
                Ok(path) if !path.trim().is_empty() => Self::load(path),
                _ => Ok(ForgeConfig::default()),
            },
        }
    }
}
