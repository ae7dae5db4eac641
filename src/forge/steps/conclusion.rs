// SPDX-License-Identifier: MIT

//! Terminal steps

use async_trait::async_trait;

use crate::engine::error::StepError;
use crate::engine::graph::{Step, StepOutcome};
use crate::engine::state::{StatePatch, WorkflowState};
use crate::forge::keys;
use crate::forge::routing::{COMPLETION, FAILURE};

pub struct Completion;

#[async_trait]
impl Step for Completion {
    fn name(&self) -> &str {
        COMPLETION
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let project = state.get_str(keys::PROJECT_NAME).unwrap_or("The app");
        let mut summary = format!("{} was generated, built and launched", project);
        if let Some(device) = state.get_path("targetDevice.name").and_then(|v| v.as_str()) {
            summary.push_str(&format!(" on {}", device));
        }
        if let Some(id) = state.get_str(keys::BUNDLE_IDENTIFIER) {
            summary.push_str(&format!(" as {}", id));
        }
        summary.push('.');
        if let Some(path) = state.get_str(keys::PROJECT_PATH) {
            summary.push_str(&format!(" Project: {}", path));
        }

        log::info!("Workflow succeeded: {}", summary);
        Ok(StepOutcome::Patch(
            StatePatch::new()
                .with(keys::WORKFLOW_CONCLUDED, true)
                .with(keys::WORKFLOW_STATUS, "success")
                .with(keys::WORKFLOW_SUMMARY, summary),
        ))
    }
}

pub struct Failure;

#[async_trait]
impl Step for Failure {
    fn name(&self) -> &str {
        FAILURE
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let messages = state.get_strings(keys::FATAL_ERROR_MESSAGES);
        let summary = if messages.is_empty() {
            "The workflow failed without a recorded reason.".to_string()
        } else {
            format!("The workflow failed:\n- {}", messages.join("\n- "))
        };

        log::error!("Workflow failed with {} message(s)", messages.len());
        Ok(StepOutcome::Patch(
            StatePatch::new()
                .with(keys::WORKFLOW_CONCLUDED, true)
                .with(keys::WORKFLOW_STATUS, "failed")
                .with(keys::WORKFLOW_SUMMARY, summary),
        ))
    }
}
