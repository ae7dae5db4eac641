// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use super::{append_messages, as_object, project_path, ForgeContext};
use crate::engine::capability::Capability;
use crate::engine::command::{args, CommandOutput};
use crate::engine::error::{CommandError, StepError};
use crate::engine::graph::{Step, StepOutcome};
use crate::engine::interrupt::Interrupt;
use crate::engine::state::{StatePatch, WorkflowState};
use crate::forge::bundle::find_xcodeproj;
use crate::forge::error::BundleError;
use crate::forge::keys;
use crate::forge::routing::{is_android, is_ios, BUILD, BUILD_RECOVERY};

pub const BUILD_RECOVERY_CAPABILITY: &str = "build-recovery";

/// Lines of build output kept for recovery
const OUTPUT_TAIL_LINES: usize = 60;

/// Where `xcodebuild` puts its products, relative to the project
pub const DERIVED_DATA_DIR: &str = "build";

/// Runs the platform build once per invocation
pub struct Build {
    ctx: Arc<ForgeContext>,
}

enum Attempt {
    Finished(CommandOutput),
    /// Could not even start the build
    Blocked(String),
}

impl Build {
    pub fn new(ctx: Arc<ForgeContext>) -> Self {
        Self { ctx }
    }

    async fn build_ios(
        &self,
        state: &WorkflowState,
        project: &Path,
    ) -> Result<Attempt, StepError> {
        let xcodeproj = match find_xcodeproj(self.ctx.fs.as_ref(), project) {
            Ok(p) => p,
            // Unreadable project directory is not something recovery can fix
            Err(e @ BundleError::Io { .. }) => return Err(e.into()),
            Err(e) => return Ok(Attempt::Blocked(e.to_string())),
        };
        let scheme = state
            .get_str(keys::PROJECT_NAME)
            .map(str::to_string)
            .or_else(|| xcodeproj.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();

        let xcodeproj = xcodeproj.to_string_lossy();
        let derived = project.join(DERIVED_DATA_DIR);
        let derived = derived.to_string_lossy();
        let build_args = args(&[
            "-project",
            &*xcodeproj,
            "-scheme",
            scheme.as_str(),
            "-configuration",
            "Debug",
            "-sdk",
            "iphonesimulator",
            "-derivedDataPath",
            &*derived,
            "build",
        ]);
        let options = self.ctx.build_options(state).cwd(project);
        let result = self
            .ctx
            .runner
            .execute("xcodebuild", &build_args, &options)
            .await;
        Ok(self.finish("xcodebuild", result))
    }

    async fn build_android(
        &self,
        state: &WorkflowState,
        project: &Path,
    ) -> Result<Attempt, StepError> {
        let gradlew = project.join("gradlew");
        if !self.ctx.fs.exists(&gradlew) {
            return Ok(Attempt::Blocked(format!("No Gradle wrapper at {:?}", gradlew)));
        }
        let program = gradlew.to_string_lossy();
        let options = self.ctx.build_options(state).cwd(project);
        let result = self
            .ctx
            .runner
            .execute(&program, &args(&["assembleDebug"]), &options)
            .await;
        Ok(self.finish("gradlew", result))
    }

    fn finish(&self, tool: &str, result: Result<CommandOutput, CommandError>) -> Attempt {
        match result {
            Ok(output) => Attempt::Finished(output),
            Err(e) => Attempt::Blocked(format!("{} could not run: {}", tool, e)),
        }
    }
}

#[async_trait]
impl Step for Build {
    fn name(&self) -> &str {
        BUILD
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let mut patch = StatePatch::new();
        if state.get(keys::MAX_BUILD_RETRIES).is_none() {
            patch.set(keys::MAX_BUILD_RETRIES, self.ctx.config.max_build_retries);
        }

        // Recovery already said it cannot help; leave the refusal for the router
        if state.get_bool(keys::RECOVERY_READY_FOR_RETRY) == Some(false) {
            log::warn!("Skipping build, recovery declined to retry");
            patch.set(keys::BUILD_SUCCESSFUL, false);
            return Ok(StepOutcome::Patch(patch));
        }

        let attempt = state.get_i64(keys::BUILD_ATTEMPT_COUNT).unwrap_or(0) + 1;
        patch.set(keys::BUILD_ATTEMPT_COUNT, attempt);
        patch.set(keys::RECOVERY_READY_FOR_RETRY, Value::Null);

        let Some(project) = state.get_str(keys::PROJECT_PATH).map(Path::new) else {
            patch.set(keys::BUILD_SUCCESSFUL, false);
            patch.set(
                keys::FATAL_ERROR_MESSAGES,
                append_messages(state, &["No project path to build".to_string()]),
            );
            return Ok(StepOutcome::Patch(patch));
        };

        log::info!("Build attempt {} for {:?}", attempt, project);
        let outcome = if is_ios(state) {
            self.build_ios(state, project).await?
        } else if is_android(state) {
            self.build_android(state, project).await?
        } else {
            Attempt::Blocked("Unsupported platform".to_string())
        };

        match outcome {
            Attempt::Finished(output) if output.success => {
                log::info!("Build attempt {} succeeded in {:?}", attempt, output.duration);
                patch.set(keys::BUILD_SUCCESSFUL, true);
                patch.set(keys::BUILD_OUTPUT_TAIL, output.tail(OUTPUT_TAIL_LINES));
            }
            Attempt::Finished(output) => {
                let message = format!(
                    "Build attempt {} failed with exit code {}",
                    attempt, output.exit_code
                );
                log::warn!("{}", message);
                patch.set(keys::BUILD_SUCCESSFUL, false);
                patch.set(keys::BUILD_OUTPUT_TAIL, output.tail(OUTPUT_TAIL_LINES));
                patch.set(keys::FATAL_ERROR_MESSAGES, append_messages(state, &[message]));
            }
            Attempt::Blocked(message) => {
                log::warn!("Build attempt {} blocked: {}", attempt, message);
                patch.set(keys::BUILD_SUCCESSFUL, false);
                patch.set(keys::BUILD_OUTPUT_TAIL, message.clone());
                patch.set(keys::FATAL_ERROR_MESSAGES, append_messages(state, &[message]));
            }
        }
        Ok(StepOutcome::Patch(patch))
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct BuildRecoveryInput {
    platform: String,
    project_path: String,
    /// Last lines of the failing build
    build_output: String,
    attempt: i64,
    max_attempts: i64,
}

static RECOVERY: Lazy<Capability> = Lazy::new(|| {
    Capability::for_input::<BuildRecoveryInput>(
        BUILD_RECOVERY_CAPABILITY,
        "Diagnoses a failed build and fixes the project. Returns `{\"readyForRetry\": bool}`",
    )
});

/// Delegates diagnosis of a failed build
pub struct BuildRecovery;

#[async_trait]
impl Step for BuildRecovery {
    fn name(&self) -> &str {
        BUILD_RECOVERY
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let input = BuildRecoveryInput {
            platform: state.get_str(keys::PLATFORM).unwrap_or_default().to_string(),
            project_path: project_path(state)?.to_string_lossy().into_owned(),
            build_output: state.get_str(keys::BUILD_OUTPUT_TAIL).unwrap_or_default().to_string(),
            attempt: state.get_i64(keys::BUILD_ATTEMPT_COUNT).unwrap_or(0),
            max_attempts: state.get_i64(keys::MAX_BUILD_RETRIES).unwrap_or(0),
        };
        Ok(StepOutcome::Suspend(Interrupt::delegate(
            RECOVERY.clone(),
            serde_json::to_value(input)?,
        )))
    }

    async fn resume(
        &self,
        _state: &WorkflowState,
        value: Value,
    ) -> Result<StepOutcome, StepError> {
        let ready = match &value {
            Value::Bool(b) => Some(*b),
            _ => as_object(value.clone()).and_then(|map| {
                ["readyForRetry", keys::RECOVERY_READY_FOR_RETRY]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_bool))
            }),
        };

        let Some(ready) = ready else {
            return Err(StepError::InvalidResumeValue(format!(
                "expected a boolean readyForRetry, got {}",
                value
            )));
        };

        log::info!("Build recovery finished, ready for retry: {}", ready);
        Ok(StepOutcome::Patch(
            StatePatch::new().with(keys::RECOVERY_READY_FOR_RETRY, ready),
        ))
    }
}
