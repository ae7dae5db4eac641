// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::build::DERIVED_DATA_DIR;
use super::{append_messages, ForgeContext};
use crate::engine::error::StepError;
use crate::engine::graph::{Step, StepOutcome};
use crate::engine::state::{StatePatch, WorkflowState};
use crate::forge::bundle::extract_bundle_id;
use crate::forge::device::{
    select_best, wait_until_ready, AndroidEmulators, Device, DeviceProvider, DeviceState,
    IosSimulators, PollPolicy,
};
use crate::forge::error::DeviceError;
use crate::forge::keys;
use crate::forge::routing::{is_android, is_ios, DEPLOYMENT};

/// Debug APK produced by `gradlew assembleDebug`
const ANDROID_APK: &str = "app/build/outputs/apk/debug/app-debug.apk";

/// Installs and launches the built app on a simulator or emulator.
///
/// Device problems end up in `fatalErrorMessages` with
/// `deploymentSuccessful = false`; the step only fails on state errors.
pub struct Deployment {
    ctx: Arc<ForgeContext>,
}

impl Deployment {
    pub fn new(ctx: Arc<ForgeContext>) -> Self {
        Self { ctx }
    }

    fn provider(&self, state: &WorkflowState) -> Option<Box<dyn DeviceProvider>> {
        let options = self.ctx.command_options(state);
        if is_ios(state) {
            Some(Box::new(
                IosSimulators::new(self.ctx.runner.clone(), options)
                    .with_device_type(self.ctx.config.ios_device_type.clone()),
            ))
        } else if is_android(state) {
            let mut emulators = AndroidEmulators::new(self.ctx.runner.clone(), options);
            if let Some(image) = &self.ctx.config.android_system_image {
                emulators = emulators.with_system_image(image.clone());
            }
            Some(Box::new(emulators))
        } else {
            None
        }
    }

    fn artifact(&self, state: &WorkflowState, project: &Path) -> PathBuf {
        if is_ios(state) {
            let app = format!("{}.app", state.get_str(keys::PROJECT_NAME).unwrap_or_default());
            project
                .join(DERIVED_DATA_DIR)
                .join("Build/Products/Debug-iphonesimulator")
                .join(app)
        } else {
            project.join(ANDROID_APK)
        }
    }

    /// The id the platform launches the app by
    fn app_id(&self, state: &WorkflowState, project: &Path) -> Result<String, String> {
        if is_ios(state) {
            extract_bundle_id(self.ctx.fs.as_ref(), project).map_err(|e| e.to_string())
        } else {
            state
                .get_str(keys::PACKAGE_NAME)
                .map(str::to_string)
                .ok_or_else(|| "No package name to launch".to_string())
        }
    }

    async fn deploy(
        &self,
        provider: &dyn DeviceProvider,
        artifact: &Path,
        app_id: &str,
    ) -> Result<Device, DeviceError> {
        let devices = provider.list().await?;
        let device = match select_best(&devices) {
            Some(device) => device.clone(),
            None => {
                log::info!("No {} device available, creating one", provider.platform());
                provider.create(&self.ctx.config.device_name).await?
            }
        };

        // A device that is already booting only needs waiting for
        if device.state == DeviceState::Shutdown {
            provider.boot(&device).await?;
        }
        let policy = PollPolicy::from(&self.ctx.config.readiness);
        let device = wait_until_ready(provider, &device.id, policy).await?;

        log::info!("Installing {:?} on {} ({})", artifact, device.name, device.id);
        provider.install(&device, artifact).await?;
        provider.launch(&device, app_id).await?;
        Ok(device)
    }

    fn failed(state: &WorkflowState, message: String) -> StepOutcome {
        log::warn!("Deployment failed: {}", message);
        StepOutcome::Patch(
            StatePatch::new()
                .with(keys::DEPLOYMENT_SUCCESSFUL, false)
                .with(keys::FATAL_ERROR_MESSAGES, append_messages(state, &[message])),
        )
    }
}

#[async_trait]
impl Step for Deployment {
    fn name(&self) -> &str {
        DEPLOYMENT
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let Some(project) = state.get_str(keys::PROJECT_PATH).map(PathBuf::from) else {
            return Ok(Self::failed(state, "No project path to deploy".to_string()));
        };
        let Some(provider) = self.provider(state) else {
            return Ok(Self::failed(state, "Unsupported platform".to_string()));
        };

        let artifact = self.artifact(state, &project);
        if !self.ctx.fs.exists(&artifact) {
            return Ok(Self::failed(
                state,
                format!("Build artifact not found at {}", artifact.display()),
            ));
        }
        let app_id = match self.app_id(state, &project) {
            Ok(id) => id,
            Err(message) => return Ok(Self::failed(state, message)),
        };

        match self.deploy(provider.as_ref(), &artifact, &app_id).await {
            Ok(device) => {
                log::info!("Launched {} on {}", app_id, device.name);
                Ok(StepOutcome::Patch(
                    StatePatch::new()
                        .with(keys::DEPLOYMENT_SUCCESSFUL, true)
                        .with(keys::TARGET_DEVICE, serde_json::to_value(&device)?)
                        .with(keys::BUNDLE_IDENTIFIER, app_id),
                ))
            }
            Err(e) => Ok(Self::failed(state, e.to_string())),
        }
    }
}
