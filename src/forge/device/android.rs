// SPDX-License-Identifier: MIT

//! Android emulators through `avdmanager`, `adb` and `emulator`

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

use super::{Device, DeviceProvider, DeviceState};
use crate::engine::command::{CommandOptions, CommandOutput, CommandRunner};
use crate::forge::error::DeviceError;

static BASED_ON: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"Android\s+(?:API\s+)?(\d+(?:\.\d+)*)").ok());

/// Environment for Android tooling, derived from explicit SDK locations.
///
/// The variables are passed to children through `CommandOptions::env`; the
/// current process environment is only read, to extend `PATH`.
pub fn sdk_env(android_home: Option<&str>, java_home: Option<&str>) -> Vec<(String, String)> {
    let mut env = Vec::new();
    let mut path_dirs = Vec::new();

    if let Some(home) = android_home.filter(|h| !h.trim().is_empty()) {
        env.push(("ANDROID_HOME".to_string(), home.to_string()));
        env.push(("ANDROID_SDK_ROOT".to_string(), home.to_string()));
        for sub in ["platform-tools", "emulator", "cmdline-tools/latest/bin"] {
            path_dirs.push(format!("{}/{}", home.trim_end_matches('/'), sub));
        }
    }
    if let Some(home) = java_home.filter(|h| !h.trim().is_empty()) {
        env.push(("JAVA_HOME".to_string(), home.to_string()));
        path_dirs.push(format!("{}/bin", home.trim_end_matches('/')));
    }

    if !path_dirs.is_empty() {
        if let Ok(current) = std::env::var("PATH") {
            path_dirs.push(current);
        }
        env.push(("PATH".to_string(), path_dirs.join(":")));
    }
    env
}

/// `(name, os_version)` of every AVD in `avdmanager list avd` output
pub fn parse_avd_list(output: &str) -> Vec<(String, String)> {
    let mut avds = Vec::new();
    let mut current: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix("Name:") {
            if let Some(previous) = current.take() {
                avds.push((previous, String::new()));
            }
            current = Some(name.trim().to_string());
        } else if let Some(based_on) = line.strip_prefix("Based on:") {
            if let Some(name) = current.take() {
                let version = BASED_ON
                    .as_ref()
                    .and_then(|re| re.captures(based_on))
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                avds.push((name, version));
            }
        }
    }
    if let Some(name) = current {
        avds.push((name, String::new()));
    }
    avds
}

/// `(serial, status)` of every emulator in `adb devices` output
pub fn parse_adb_devices(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .skip_while(|l| !l.starts_with("List of devices"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let status = parts.next()?;
            serial
                .starts_with("emulator-")
                .then(|| (serial.to_string(), status.to_string()))
        })
        .collect()
}

/// [`DeviceProvider`] for Android emulators
pub struct AndroidEmulators {
    runner: Arc<dyn CommandRunner>,
    options: CommandOptions,
    system_image: Option<String>,
}

impl AndroidEmulators {
    pub fn new(runner: Arc<dyn CommandRunner>, options: CommandOptions) -> Self {
        Self {
            runner,
            options,
            system_image: None,
        }
    }

    /// System image package used when an AVD has to be created,
    /// e.g. `system-images;android-34;google_apis;x86_64`
    pub fn with_system_image(mut self, image: impl Into<String>) -> Self {
        self.system_image = Some(image.into());
        self
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, DeviceError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Ok(self.runner.execute(program, &args, &self.options).await?)
    }

    async fn run_ok(&self, program: &str, args: &[&str]) -> Result<CommandOutput, DeviceError> {
        let output = self.run(program, args).await?;
        if !output.success {
            let message = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            return Err(DeviceError::command_failed(
                format!("{} {}", program, args.join(" ")),
                message,
            ));
        }
        Ok(output)
    }

    fn serial<'a>(&self, device: &'a Device) -> Result<&'a str, DeviceError> {
        device.serial.as_deref().ok_or_else(|| {
            DeviceError::command_failed("adb", format!("emulator '{}' is not running", device.name))
        })
    }
}

#[async_trait]
impl DeviceProvider for AndroidEmulators {
    fn platform(&self) -> &str {
        "Android"
    }

    async fn list(&self) -> Result<Vec<Device>, DeviceError> {
        let avds = parse_avd_list(&self.run_ok("avdmanager", &["list", "avd"]).await?.stdout);
        let running = parse_adb_devices(&self.run_ok("adb", &["devices"]).await?.stdout);

        // Map each running emulator back to its AVD name
        let mut running_avds = Vec::new();
        for (serial, status) in running {
            let output = self.run("adb", &["-s", serial.as_str(), "emu", "avd", "name"]).await?;
            if let Some(name) = output.stdout.lines().next().map(str::trim) {
                running_avds.push((name.to_string(), serial, status));
            }
        }

        Ok(avds
            .into_iter()
            .map(|(name, version)| {
                let mut device = Device::new(name.clone(), name, &version, DeviceState::Shutdown);
                let running = running_avds.iter().find(|(n, _, _)| *n == device.name);
                if let Some((_, serial, status)) = running {
                    device.state = if status == "device" {
                        DeviceState::Booted
                    } else {
                        DeviceState::Booting
                    };
                    device.serial = Some(serial.clone());
                }
                device
            })
            .collect())
    }

    async fn create(&self, name: &str) -> Result<Device, DeviceError> {
        let image = self.system_image.as_deref().ok_or(DeviceError::NoRuntime)?;
        log::info!("Creating AVD '{}' from {}", name, image);
        self.run_ok(
            "avdmanager",
            &["create", "avd", "-n", name, "-k", image, "-d", "pixel", "--force"],
        )
        .await?;

        let api_level = image
            .split(';')
            .find_map(|part| part.strip_prefix("android-"))
            .unwrap_or_default();
        Ok(Device::new(name, name, api_level, DeviceState::Shutdown))
    }

    async fn boot(&self, device: &Device) -> Result<(), DeviceError> {
        let args: Vec<String> = ["-avd", device.id.as_str(), "-no-snapshot-load", "-no-boot-anim"]
            .iter()
            .map(|a| a.to_string())
            .collect();
        let pid = self.runner.spawn_detached("emulator", &args, &self.options).await?;
        log::info!("Started emulator {} (pid {:?})", device.id, pid);
        Ok(())
    }

    async fn check_ready(&self, device: &Device) -> Result<bool, DeviceError> {
        let serial = self.serial(device)?;
        let output = self
            .run("adb", &["-s", serial, "shell", "getprop", "sys.boot_completed"])
            .await?;
        Ok(output.success && output.stdout_trimmed() == "1")
    }

    async fn install(&self, device: &Device, artifact: &Path) -> Result<(), DeviceError> {
        let serial = self.serial(device)?;
        let artifact = artifact.to_string_lossy();
        self.run_ok("adb", &["-s", serial, "install", "-r", &*artifact]).await?;
        Ok(())
    }

    async fn launch(&self, device: &Device, app_id: &str) -> Result<(), DeviceError> {
        let serial = self.serial(device)?;
        self.run_ok(
            "adb",
            &[
                "-s",
                serial,
                "shell",
                "monkey",
                "-p",
                app_id,
                "-c",
                "android.intent.category.LAUNCHER",
                "1",
            ],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::{ScriptedReply, ScriptedRunner};

    const AVDS: &str = "Available Android Virtual Devices:
    Name: Pixel_6_API_33
  Device: pixel_6 (Google)
    Path: /home/me/.android/avd/Pixel_6_API_33.avd
  Target: Google APIs (Google Inc.)
          Based on: Android 13.0 (Tiramisu) Tag/ABI: google_apis/x86_64
---------
    Name: Pixel_7_API_34
  Device: pixel_7 (Google)
    Path: /home/me/.android/avd/Pixel_7_API_34.avd
  Target: Google Play (Google Inc.)
          Based on: Android 14.0 (UpsideDownCake) Tag/ABI: google_apis_playstore/arm64-v8a
";

    const ADB: &str = "List of devices attached
emulator-5554\tdevice
R58M123ABC\tdevice

";

    #[test]
    fn test_parse_avd_list() {
        let avds = parse_avd_list(AVDS);
        assert_eq!(
            avds,
            vec![
                ("Pixel_6_API_33".to_string(), "13.0".to_string()),
                ("Pixel_7_API_34".to_string(), "14.0".to_string()),
            ]
        );
        assert!(parse_avd_list("Available Android Virtual Devices:\n").is_empty());
    }

    #[test]
    fn test_parse_adb_devices_keeps_emulators() {
        let devices = parse_adb_devices(ADB);
        assert_eq!(devices, vec![("emulator-5554".to_string(), "device".to_string())]);
        assert!(parse_adb_devices("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn test_sdk_env() {
        let env = sdk_env(Some("/opt/android/"), Some("/opt/jdk"));
        let get = |k: &str| env.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());

        assert_eq!(get("ANDROID_HOME").as_deref(), Some("/opt/android/"));
        assert_eq!(get("JAVA_HOME").as_deref(), Some("/opt/jdk"));
        let path = get("PATH").unwrap();
        assert!(path.starts_with("/opt/android/platform-tools:/opt/android/emulator:"));
        assert!(path.contains("/opt/jdk/bin"));

        assert!(sdk_env(None, Some("")).is_empty());
    }

    #[tokio::test]
    async fn test_list_marks_running_emulators() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("avdmanager", &["list"], vec![ScriptedReply::ok(AVDS)])
                .on("adb", &["emu"], vec![ScriptedReply::ok("Pixel_7_API_34\nOK\n")])
                .on("adb", &["devices"], vec![ScriptedReply::ok(ADB)]),
        );
        let emulators = AndroidEmulators::new(runner, CommandOptions::default());

        let devices = emulators.list().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].state, DeviceState::Shutdown);
        assert!(devices[0].serial.is_none());
        assert_eq!(devices[1].state, DeviceState::Booted);
        assert_eq!(devices[1].serial.as_deref(), Some("emulator-5554"));
        assert_eq!(devices[1].version, 14000);
    }

    #[tokio::test]
    async fn test_check_ready_reads_boot_completed() {
        let runner = Arc::new(ScriptedRunner::new().on(
            "adb",
            &["sys.boot_completed"],
            vec![ScriptedReply::ok("\n"), ScriptedReply::ok("1\n")],
        ));
        let emulators = AndroidEmulators::new(runner, CommandOptions::default());
        let mut device = Device::new("Pixel", "Pixel", "14.0", DeviceState::Booted);

        assert!(emulators.check_ready(&device).await.is_err());

        device.serial = Some("emulator-5554".into());
        assert!(!emulators.check_ready(&device).await.unwrap());
        assert!(emulators.check_ready(&device).await.unwrap());
    }

    #[tokio::test]
    async fn test_boot_is_detached_and_create_needs_image() {
        let runner = Arc::new(ScriptedRunner::new().on(
            "emulator",
            &["-avd"],
            vec![ScriptedReply::ok("")],
        ));
        let emulators = AndroidEmulators::new(runner.clone(), CommandOptions::default());
        let device = Device::new("Pixel", "Pixel", "14.0", DeviceState::Shutdown);

        emulators.boot(&device).await.unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].detached);
        assert_eq!(calls[0].args[..2], ["-avd".to_string(), "Pixel".to_string()]);

        assert!(matches!(
            emulators.create("Forge").await,
            Err(DeviceError::NoRuntime)
        ));
    }
}
