// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use super::{as_object, ForgeContext};
use crate::engine::capability::schema_of;
use crate::engine::command::{args, CommandOptions};
use crate::engine::error::StepError;
use crate::engine::graph::{Step, StepOutcome};
use crate::engine::interrupt::Interrupt;
use crate::engine::state::{StatePatch, WorkflowState};
use crate::forge::keys;
use crate::forge::routing::{is_android, is_ios, ANDROID_SETUP_RECOVERY, PLATFORM_CHECK};

/// Verifies the toolchain for the chosen platform.
///
/// Every problem found becomes a fatal message; the step itself never fails
/// because a tool is missing.
pub struct PlatformCheck {
    ctx: Arc<ForgeContext>,
}

impl PlatformCheck {
    pub fn new(ctx: Arc<ForgeContext>) -> Self {
        Self { ctx }
    }

    /// Run one tool check; `None` when it worked, else a message
    async fn check_tool(
        &self,
        program: &str,
        tool_args: &[&str],
        options: &CommandOptions,
    ) -> Option<String> {
        match self.ctx.runner.execute(program, &args(tool_args), options).await {
            Ok(output) if output.success => None,
            Ok(output) => Some(format!(
                "'{} {}' failed with exit code {}: {}",
                program,
                tool_args.join(" "),
                output.exit_code,
                output.tail(3)
            )),
            Err(e) => Some(e.to_string()),
        }
    }

    async fn check_ios(&self, state: &WorkflowState) -> Vec<String> {
        let options = self.ctx.command_options(state);
        let mut problems = Vec::new();
        if let Some(p) = self.check_tool("xcodebuild", &["-version"], &options).await {
            problems.push(p);
        }
        if let Some(p) = self.check_tool("xcrun", &["simctl", "help"], &options).await {
            problems.push(p);
        }
        problems
    }

    async fn check_android(&self, state: &WorkflowState) -> Vec<String> {
        let mut problems = Vec::new();

        for (label, home) in [
            ("ANDROID_HOME", self.ctx.android_home(state)),
            ("JAVA_HOME", self.ctx.java_home(state)),
        ] {
            match home {
                None => problems.push(format!("{} is not set", label)),
                Some(path) if !self.ctx.fs.is_dir(Path::new(&path)) => {
                    problems.push(format!("{} points to a missing directory: {}", label, path))
                }
                Some(_) => {}
            }
        }
        // Tool checks would only repeat the path problems
        if !problems.is_empty() {
            return problems;
        }

        let options = self.ctx.command_options(state);
        if let Some(p) = self.check_tool("java", &["-version"], &options).await {
            problems.push(p);
        }
        if let Some(p) = self.check_tool("adb", &["version"], &options).await {
            problems.push(p);
        }
        problems
    }
}

#[async_trait]
impl Step for PlatformCheck {
    fn name(&self) -> &str {
        PLATFORM_CHECK
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let platform = state.get_str(keys::PLATFORM).unwrap_or_default().to_string();

        let problems = if is_ios(state) {
            self.check_ios(state).await
        } else if is_android(state) {
            self.check_android(state).await
        } else {
            vec![format!("Unsupported platform '{}'", platform)]
        };

        let valid = problems.is_empty();
        if valid {
            log::info!("{} toolchain looks good", platform);
        } else {
            log::warn!("{} toolchain problems: {:?}", platform, problems);
        }

        // Each check is a fresh evaluation; earlier findings are replaced
        let mut patch = StatePatch::new()
            .with(keys::VALID_PLATFORM_SETUP, valid)
            .with(keys::FATAL_ERROR_MESSAGES, problems);

        if valid && is_android(state) {
            // Remember the locations that worked, including config defaults
            if let Some(home) = self.ctx.android_home(state) {
                patch.set(keys::ANDROID_HOME, home);
            }
            if let Some(home) = self.ctx.java_home(state) {
                patch.set(keys::JAVA_HOME, home);
            }
        }
        Ok(StepOutcome::Patch(patch))
    }
}

/// SDK locations requested from the user
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SdkLocations {
    /// Absolute path of the Android SDK
    pub android_home: Option<String>,
    /// Absolute path of a JDK (17 or newer)
    pub java_home: Option<String>,
}

/// Asks for Android SDK and JDK locations
pub struct AndroidSetupRecovery;

#[async_trait]
impl Step for AndroidSetupRecovery {
    fn name(&self) -> &str {
        ANDROID_SETUP_RECOVERY
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let mut instructions = String::from(
            "The Android toolchain could not be verified. Find or install the Android SDK \
             (with platform-tools, emulator and cmdline-tools) and a JDK, then return their \
             absolute paths.",
        );
        let problems = state.get_strings(keys::FATAL_ERROR_MESSAGES);
        if !problems.is_empty() {
            instructions.push_str("\n\nProblems found:\n- ");
            instructions.push_str(&problems.join("\n- "));
        }
        Ok(StepOutcome::Suspend(Interrupt::guidance(
            instructions,
            schema_of::<SdkLocations>(),
        )))
    }

    async fn resume(&self, _state: &WorkflowState, value: Value) -> Result<StepOutcome, StepError> {
        let mut patch = StatePatch::new();
        if let Some(map) = as_object(value) {
            for key in [keys::ANDROID_HOME, keys::JAVA_HOME] {
                if let Some(path) = map.get(key).and_then(Value::as_str).map(str::trim) {
                    if !path.is_empty() {
                        patch.set(key, path);
                    }
                }
            }
        }
        if patch.is_empty() {
            log::warn!("Android setup answer carried no SDK locations");
        }
        Ok(StepOutcome::Patch(patch))
    }
}
