// SPDX-License-Identifier: MIT

//! iOS simulators through `xcrun simctl`

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::{parse_version, Device, DeviceProvider, DeviceState};
use crate::engine::command::{CommandOptions, CommandOutput, CommandRunner};
use crate::forge::error::DeviceError;

const RUNTIME_PREFIX: &str = "com.apple.CoreSimulator.SimRuntime.iOS-";

/// Device type used when a simulator has to be created
pub const DEFAULT_DEVICE_TYPE: &str = "iPhone 15";

#[derive(Debug, Deserialize)]
struct SimctlDevices {
    devices: BTreeMap<String, Vec<SimctlDevice>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimctlDevice {
    udid: String,
    name: String,
    state: String,
    #[serde(default = "available")]
    is_available: bool,
}

#[derive(Debug, Deserialize)]
struct SimctlRuntimes {
    runtimes: Vec<SimctlRuntime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimctlRuntime {
    identifier: String,
    name: String,
    version: String,
    #[serde(default = "available")]
    is_available: bool,
}

fn available() -> bool {
    true
}

fn parse_state(state: &str) -> DeviceState {
    match state {
        "Booted" => DeviceState::Booted,
        "Booting" => DeviceState::Booting,
        _ => DeviceState::Shutdown,
    }
}

/// Parse `xcrun simctl list devices --json`, keeping available iOS simulators
pub fn parse_simctl_devices(json: &str) -> Result<Vec<Device>, DeviceError> {
    let listing: SimctlDevices =
        serde_json::from_str(json).map_err(|e| DeviceError::Parse(e.to_string()))?;

    // Other runtimes (watchOS, tvOS, ...) are not deploy targets
    let mut runtimes: Vec<(String, Vec<SimctlDevice>)> = listing
        .devices
        .into_iter()
        .filter_map(|(runtime, entries)| {
            let version = runtime.strip_prefix(RUNTIME_PREFIX)?;
            Some((version.replace('-', "."), entries))
        })
        .collect();
    // Runtime keys sort as text ("iOS-18-0" < "iOS-9-3"); order by version instead
    runtimes.sort_by_key(|(os_version, _)| parse_version(os_version));

    let mut devices = Vec::new();
    for (os_version, entries) in runtimes {
        for entry in entries.into_iter().filter(|d| d.is_available) {
            devices.push(Device::new(
                entry.udid,
                entry.name,
                &os_version,
                parse_state(&entry.state),
            ));
        }
    }
    Ok(devices)
}

/// Pick the newest available iOS runtime from `xcrun simctl list runtimes --json`.
/// Returns `(identifier, version)`.
pub fn parse_latest_runtime(json: &str) -> Result<Option<(String, String)>, DeviceError> {
    let listing: SimctlRuntimes =
        serde_json::from_str(json).map_err(|e| DeviceError::Parse(e.to_string()))?;

    let best = listing
        .runtimes
        .into_iter()
        .filter(|r| r.is_available && r.name.starts_with("iOS"))
        .fold(None, |best: Option<SimctlRuntime>, r| match best {
            Some(b) if parse_version(&b.version) >= parse_version(&r.version) => Some(b),
            _ => Some(r),
        });

    Ok(best.map(|r| (r.identifier, r.version)))
}

/// [`DeviceProvider`] for iOS simulators
pub struct IosSimulators {
    runner: Arc<dyn CommandRunner>,
    options: CommandOptions,
    device_type: String,
}

impl IosSimulators {
    pub fn new(runner: Arc<dyn CommandRunner>, options: CommandOptions) -> Self {
        Self {
            runner,
            options,
            device_type: DEFAULT_DEVICE_TYPE.to_string(),
        }
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    async fn simctl(&self, args: &[&str]) -> Result<CommandOutput, DeviceError> {
        let mut full = vec!["simctl".to_string()];
        full.extend(args.iter().map(|a| a.to_string()));
        Ok(self.runner.execute("xcrun", &full, &self.options).await?)
    }

    async fn simctl_ok(&self, args: &[&str]) -> Result<CommandOutput, DeviceError> {
        let output = self.simctl(args).await?;
        if !output.success {
            return Err(DeviceError::command_failed(
                format!("xcrun simctl {}", args.join(" ")),
                output.stderr.trim(),
            ));
        }
        Ok(output)
    }
}

#[async_trait]
impl DeviceProvider for IosSimulators {
    fn platform(&self) -> &str {
        "iOS"
    }

    async fn list(&self) -> Result<Vec<Device>, DeviceError> {
        let output = self.simctl_ok(&["list", "devices", "--json"]).await?;
        parse_simctl_devices(&output.stdout)
    }

    async fn create(&self, name: &str) -> Result<Device, DeviceError> {
        let output = self.simctl_ok(&["list", "runtimes", "--json"]).await?;
        let (runtime, version) =
            parse_latest_runtime(&output.stdout)?.ok_or(DeviceError::NoRuntime)?;

        log::info!("Creating simulator '{}' ({}, iOS {})", name, self.device_type, version);
        let output = self
            .simctl_ok(&["create", name, self.device_type.as_str(), runtime.as_str()])
            .await?;
        let udid = output.stdout_trimmed();
        if udid.is_empty() {
            return Err(DeviceError::Parse("simctl create printed no UDID".into()));
        }
        Ok(Device::new(udid, name, &version, DeviceState::Shutdown))
    }

    async fn boot(&self, device: &Device) -> Result<(), DeviceError> {
        log::info!("Booting simulator {} ({})", device.name, device.id);
        let output = self.simctl(&["boot", device.id.as_str()]).await?;
        if output.success || output.stderr.contains("current state: Booted") {
            return Ok(());
        }
        Err(DeviceError::command_failed(
            "xcrun simctl boot",
            output.stderr.trim(),
        ))
    }

    async fn check_ready(&self, device: &Device) -> Result<bool, DeviceError> {
        let output = self
            .simctl(&["spawn", device.id.as_str(), "launchctl", "print", "system"])
            .await?;
        Ok(output.success)
    }

    async fn install(&self, device: &Device, artifact: &Path) -> Result<(), DeviceError> {
        let artifact = artifact.to_string_lossy();
        self.simctl_ok(&["install", device.id.as_str(), &*artifact]).await?;
        Ok(())
    }

    async fn launch(&self, device: &Device, app_id: &str) -> Result<(), DeviceError> {
        self.simctl_ok(&["launch", device.id.as_str(), app_id]).await?;
        Ok(())
    }
}
