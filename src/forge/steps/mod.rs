// SPDX-License-Identifier: MIT

//! Steps of the mobile scaffolding workflow
//!
//! Steps hold no per-session data: everything they know about a session comes
//! from the state they are handed, and everything they need from the outside
//! world goes through [`ForgeContext`].

mod build;
mod conclusion;
mod deployment;
mod platform;
mod project;
mod properties;

pub use build::{Build, BuildRecovery, BUILD_RECOVERY_CAPABILITY};
pub use conclusion::{Completion, Failure};
pub use deployment::Deployment;
pub use platform::{AndroidSetupRecovery, PlatformCheck};
pub use project::{ProjectGeneration, PROJECT_GENERATION_CAPABILITY};
pub use properties::{
    ExtractProperties, GetUserInput, ProjectProperties, PROPERTY_EXTRACTION_CAPABILITY,
};

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::config::ForgeConfig;
use super::device::android::sdk_env;
use super::keys;
use crate::engine::command::{CommandOptions, CommandRunner, ProgressReporter};
use crate::engine::error::StepError;
use crate::engine::fs::FileSystem;
use crate::engine::state::WorkflowState;

/// Collaborators shared by all steps
#[derive(Clone)]
pub struct ForgeContext {
    pub runner: Arc<dyn CommandRunner>,
    pub fs: Arc<dyn FileSystem>,
    pub config: ForgeConfig,
    /// Receives progress of long-running builds
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

impl ForgeContext {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
        config: ForgeConfig,
    ) -> Self {
        Self {
            runner,
            fs,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Android SDK location: the session's value first, then the config default
    pub fn android_home(&self, state: &WorkflowState) -> Option<String> {
        state
            .get_str(keys::ANDROID_HOME)
            .map(str::to_string)
            .or_else(|| self.config.android_home.clone())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn java_home(&self, state: &WorkflowState) -> Option<String> {
        state
            .get_str(keys::JAVA_HOME)
            .map(str::to_string)
            .or_else(|| self.config.java_home.clone())
            .filter(|s| !s.trim().is_empty())
    }

    /// Options for short tool invocations, with SDK variables for Android
    pub fn command_options(&self, state: &WorkflowState) -> CommandOptions {
        self.with_sdk_env(CommandOptions::new(self.config.command_timeout()), state)
    }

    /// Options for builds, reporting to the progress sink when there is one
    pub fn build_options(&self, state: &WorkflowState) -> CommandOptions {
        let options = self.with_sdk_env(CommandOptions::new(self.config.build_timeout()), state);
        match &self.progress {
            Some(reporter) => options.progress(reporter.clone()),
            None => options,
        }
    }

    fn with_sdk_env(&self, mut options: CommandOptions, state: &WorkflowState) -> CommandOptions {
        let android_home = self.android_home(state);
        let java_home = self.java_home(state);
        options.env = sdk_env(android_home.as_deref(), java_home.as_deref());
        options
    }
}

/// Existing fatal messages plus `new`
pub(crate) fn append_messages(state: &WorkflowState, new: &[String]) -> Value {
    let mut messages = state.get_strings(keys::FATAL_ERROR_MESSAGES);
    messages.extend(new.iter().cloned());
    Value::from(messages)
}

pub(crate) fn project_path(state: &WorkflowState) -> Result<PathBuf, StepError> {
    state
        .get_str(keys::PROJECT_PATH)
        .map(PathBuf::from)
        .ok_or_else(|| StepError::MissingField(keys::PROJECT_PATH.to_string()))
}

/// Resume values may arrive either as objects or as JSON text inside a string
pub(crate) fn as_object(value: Value) -> Option<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::String(text) => match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::engine::command::ScriptedRunner;
    use crate::engine::fs::MemoryFileSystem;
    use serde_json::json;

    pub fn context(
        runner: ScriptedRunner,
        fs: MemoryFileSystem,
    ) -> (Arc<ForgeContext>, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let ctx = ForgeContext::new(runner.clone(), Arc::new(fs), ForgeConfig::default());
        (Arc::new(ctx), runner)
    }

    pub fn state(value: Value) -> WorkflowState {
        WorkflowState::from_json(value).unwrap_or_default()
    }

    #[test]
    fn test_sdk_paths_prefer_state() {
        let mut config = ForgeConfig::default();
        config.android_home = Some("/config/android".into());
        let ctx = ForgeContext::new(
            Arc::new(ScriptedRunner::new()),
            Arc::new(MemoryFileSystem::new()),
            config,
        );

        let s = state(json!({"androidHome": "/state/android", "javaHome": ""}));
        assert_eq!(ctx.android_home(&s).as_deref(), Some("/state/android"));
        assert!(ctx.java_home(&s).is_none());
        assert_eq!(
            ctx.android_home(&WorkflowState::empty()).as_deref(),
            Some("/config/android")
        );

        let options = ctx.command_options(&s);
        assert!(options
            .env
            .iter()
            .any(|(k, v)| k == "ANDROID_HOME" && v == "/state/android"));
    }

    #[test]
    fn test_append_and_objects() {
        let s = state(json!({"fatalErrorMessages": ["first"]}));
        assert_eq!(append_messages(&s, &["second".into()]), json!(["first", "second"]));

        assert!(as_object(json!({"a": 1})).is_some());
        assert!(as_object(json!("{\"a\": 1}")).is_some());
        assert!(as_object(json!("plain text")).is_none());
        assert!(as_object(json!(3)).is_none());
    }
}
