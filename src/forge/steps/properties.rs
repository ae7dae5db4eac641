// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::as_object;
use crate::engine::capability::{schema_of, Capability};
use crate::engine::error::StepError;
use crate::engine::graph::{Step, StepOutcome};
use crate::engine::interrupt::Interrupt;
use crate::engine::state::{StatePatch, WorkflowState};
use crate::forge::keys;
use crate::forge::routing::{self, EXTRACT_PROPERTIES, GET_USER_INPUT};

pub const PROPERTY_EXTRACTION_CAPABILITY: &str = "project-property-extraction";

/// The project properties the workflow needs before it can do anything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProperties {
    /// Target platform: `iOS` or `Android`
    pub platform: Option<String>,
    /// Human-readable app name, also used as the Xcode scheme
    pub project_name: Option<String>,
    /// Reverse-DNS identifier, e.g. `com.acme.demo`
    pub package_name: Option<String>,
    pub organization: Option<String>,
}

/// Input handed to the property extraction capability
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct PropertyExtractionInput {
    /// What the user asked for, verbatim
    user_input: Value,
    /// JSON schema the extracted properties must follow
    properties_schema: Value,
}

static EXTRACTION: Lazy<Capability> = Lazy::new(|| {
    Capability::for_input::<PropertyExtractionInput>(
        PROPERTY_EXTRACTION_CAPABILITY,
        "Extracts mobile project properties (platform, project name, package name, \
         organization) from a free-form request",
    )
});

/// Canonical spelling of a platform name, when recognized
fn normalize_platform(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ios" | "iphone" | "apple" => "iOS".to_string(),
        "android" => "Android".to_string(),
        _ => raw.trim().to_string(),
    }
}

/// Merge whatever known properties `value` carries. Unknown keys and blank
/// values are ignored, so a partial answer never erases earlier ones.
fn properties_patch(value: Value) -> StatePatch {
    let mut patch = StatePatch::new();
    let Some(mut map) = as_object(value) else {
        log::warn!("Ignoring property answer that is not an object");
        return patch;
    };

    // Some extractors wrap the answer
    if let Some(Value::Object(inner)) = map.remove("properties") {
        map = inner;
    }

    for key in keys::REQUIRED_PROPERTIES {
        if let Some(text) = map.get(key).and_then(Value::as_str).map(str::trim) {
            if text.is_empty() {
                continue;
            }
            if key == keys::PLATFORM {
                patch.set(key, normalize_platform(text));
            } else {
                patch.set(key, text);
            }
        }
    }
    patch
}

/// Delegates property extraction from the raw user request
pub struct ExtractProperties;

#[async_trait]
impl Step for ExtractProperties {
    fn name(&self) -> &str {
        EXTRACT_PROPERTIES
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let user_input = state.get(keys::USER_INPUT).cloned().unwrap_or(Value::Null);
        Ok(StepOutcome::Suspend(Interrupt::delegate(
            EXTRACTION.clone(),
            json!({
                "userInput": user_input,
                "propertiesSchema": schema_of::<ProjectProperties>(),
            }),
        )))
    }

    async fn resume(&self, _state: &WorkflowState, value: Value) -> Result<StepOutcome, StepError> {
        let patch = properties_patch(value);
        log::info!("Extracted {} project properties", patch_len(&patch));
        Ok(StepOutcome::Patch(patch))
    }
}

/// Asks the user for whatever is still missing
pub struct GetUserInput;

#[async_trait]
impl Step for GetUserInput {
    fn name(&self) -> &str {
        GET_USER_INPUT
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let missing = routing::missing_properties(state);
        let instructions = format!(
            "Some project details are still missing. Ask the user for: {}. \
             Return only the values they provide.",
            missing.join(", ")
        );
        Ok(StepOutcome::Suspend(Interrupt::guidance(
            instructions,
            schema_of::<ProjectProperties>(),
        )))
    }

    async fn resume(&self, _state: &WorkflowState, value: Value) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Patch(properties_patch(value)))
    }
}

fn patch_len(patch: &StatePatch) -> usize {
    keys::REQUIRED_PROPERTIES
        .iter()
        .filter(|k| patch.get(k).is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_delegates_with_user_input() {
        let state = WorkflowState::empty()
            .merge(StatePatch::new().with(keys::USER_INPUT, "a todo app for iOS"));
        let outcome = ExtractProperties.run(&state).await.unwrap();

        match outcome {
            StepOutcome::Suspend(Interrupt::Delegate { capability, input }) => {
                assert_eq!(capability.id, PROPERTY_EXTRACTION_CAPABILITY);
                assert_eq!(input["userInput"], "a todo app for iOS");
                assert!(input["propertiesSchema"].is_object());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resume_merges_known_properties() {
        let answer = json!({
            "platform": "android",
            "projectName": "Todo",
            "packageName": " ",
            "color": "blue",
        });
        let outcome = ExtractProperties
            .resume(&WorkflowState::empty(), answer)
            .await
            .unwrap();

        let StepOutcome::Patch(patch) = outcome else {
            panic!("expected a patch");
        };
        assert_eq!(patch.get("platform"), Some(&json!("Android")));
        assert_eq!(patch.get("projectName"), Some(&json!("Todo")));
        assert!(patch.get("packageName").is_none());
        assert!(patch.get("color").is_none());
    }

    #[tokio::test]
    async fn test_resume_accepts_wrapped_and_textual_answers() {
        let wrapped = json!({"properties": {"organization": "Acme"}});
        let StepOutcome::Patch(patch) = GetUserInput
            .resume(&WorkflowState::empty(), wrapped)
            .await
            .unwrap()
        else {
            panic!("expected a patch");
        };
        assert_eq!(patch.get("organization"), Some(&json!("Acme")));

        let text = json!("{\"platform\": \"iOS\"}");
        let StepOutcome::Patch(patch) = GetUserInput
            .resume(&WorkflowState::empty(), text)
            .await
            .unwrap()
        else {
            panic!("expected a patch");
        };
        assert_eq!(patch.get("platform"), Some(&json!("iOS")));

        let StepOutcome::Patch(patch) = GetUserInput
            .resume(&WorkflowState::empty(), json!("no idea"))
            .await
            .unwrap()
        else {
            panic!("expected a patch");
        };
        assert!(patch.is_empty());
    }

    #[tokio::test]
    async fn test_get_user_input_lists_missing() {
        let state =
            WorkflowState::from_json(json!({"platform": "iOS", "projectName": "Todo"})).unwrap();
        match GetUserInput.run(&state).await.unwrap() {
            StepOutcome::Suspend(Interrupt::Guidance { instructions, .. }) => {
                assert!(instructions.contains("packageName, organization"));
                assert!(!instructions.contains("projectName"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
