// SPDX-License-Identifier: MIT

//! Simulator and emulator resolution
//!
//! This module provides:
//! - `Device` / `DeviceState` - parsed records from device-listing tools
//! - `DeviceProvider` - per-platform operations over the command runner
//! - `parse_version` / `select_best` - ranking of candidates
//! - `wait_until_ready` - bounded readiness polling
//! - `IosSimulators` / `AndroidEmulators` - the two providers

pub mod android;
pub mod ios;
pub mod readiness;
pub mod version;

pub use android::AndroidEmulators;
pub use ios::IosSimulators;
pub use readiness::{wait_until_ready, PollPolicy};
pub use version::{parse_version, select_best};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Booted,
    /// Started but not yet usable (e.g. an emulator reported `offline`)
    Booting,
    Shutdown,
}

/// A simulator or emulator known to the platform tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Stable identifier: simulator UDID or AVD name
    pub id: String,
    pub name: String,
    /// Display form of the OS version, e.g. `17.5`
    pub os_version: String,
    /// Ranking ordinal of `os_version`, see [`parse_version`]
    pub version: u32,
    pub state: DeviceState,
    /// adb serial of a running emulator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        os_version: &str,
        state: DeviceState,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            os_version: os_version.to_string(),
            version: parse_version(os_version),
            state,
            serial: None,
        }
    }

    pub fn is_booted(&self) -> bool {
        self.state == DeviceState::Booted
    }

    /// True when `name` is either the display name or the id
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.id == name
    }
}

/// Platform-specific device operations
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Platform label for logs and messages
    fn platform(&self) -> &str;

    /// Re-list all candidate devices
    async fn list(&self) -> Result<Vec<Device>, DeviceError>;

    /// Create a new device; used when no candidate exists
    async fn create(&self, name: &str) -> Result<Device, DeviceError>;

    /// Start booting; completion is observed through [`wait_until_ready`]
    async fn boot(&self, device: &Device) -> Result<(), DeviceError>;

    /// Lightweight responsiveness check of a booted device
    async fn check_ready(&self, device: &Device) -> Result<bool, DeviceError>;

    async fn install(&self, device: &Device, artifact: &Path) -> Result<(), DeviceError>;

    async fn launch(&self, device: &Device, app_id: &str) -> Result<(), DeviceError>;
}
