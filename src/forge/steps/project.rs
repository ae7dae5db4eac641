// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use super::{as_object, ForgeContext};
use crate::engine::capability::Capability;
use crate::engine::error::StepError;
use crate::engine::graph::{Step, StepOutcome};
use crate::engine::interrupt::Interrupt;
use crate::engine::state::{StatePatch, WorkflowState};
use crate::forge::keys;
use crate::forge::routing::PROJECT_GENERATION;

pub const PROJECT_GENERATION_CAPABILITY: &str = "project-generation";

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ProjectGenerationInput {
    platform: String,
    project_name: String,
    package_name: String,
    organization: String,
}

static GENERATION: Lazy<Capability> = Lazy::new(|| {
    Capability::for_input::<ProjectGenerationInput>(
        PROJECT_GENERATION_CAPABILITY,
        "Generates a new mobile project from a template and returns its absolute path \
         as `projectPath`",
    )
});

/// Delegates project scaffolding and records where it landed
pub struct ProjectGeneration {
    ctx: Arc<ForgeContext>,
}

impl ProjectGeneration {
    pub fn new(ctx: Arc<ForgeContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for ProjectGeneration {
    fn name(&self) -> &str {
        PROJECT_GENERATION
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let field = |key: &str| state.get_str(key).unwrap_or_default().to_string();
        let input = ProjectGenerationInput {
            platform: field(keys::PLATFORM),
            project_name: field(keys::PROJECT_NAME),
            package_name: field(keys::PACKAGE_NAME),
            organization: field(keys::ORGANIZATION),
        };
        Ok(StepOutcome::Suspend(Interrupt::delegate(
            GENERATION.clone(),
            serde_json::to_value(input)?,
        )))
    }

    async fn resume(&self, _state: &WorkflowState, value: Value) -> Result<StepOutcome, StepError> {
        let path = match value {
            Value::String(text) if !text.trim_start().starts_with('{') => {
                Some(text.trim().to_string())
            }
            other => as_object(other)
                .and_then(|map| map.get(keys::PROJECT_PATH).cloned())
                .and_then(|v| v.as_str().map(|s| s.trim().to_string())),
        }
        .filter(|p| !p.is_empty());

        let Some(path) = path else {
            return Err(StepError::InvalidResumeValue(format!(
                "expected {} in the project generation result",
                keys::PROJECT_PATH
            )));
        };

        // Rejected before anything is recorded, so the actor can send a corrected path
        if !self.ctx.fs.is_dir(Path::new(&path)) {
            log::warn!("Generated project path {} does not exist", path);
            return Err(StepError::InvalidResumeValue(format!(
                "generated project directory {} does not exist",
                path
            )));
        }

        log::info!("Project generated at {}", path);
        Ok(StepOutcome::Patch(StatePatch::new().with(keys::PROJECT_PATH, path)))
    }
}
