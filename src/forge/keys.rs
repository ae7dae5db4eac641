// SPDX-License-Identifier: MIT

//! State field names of the mobile workflow

pub use crate::engine::orchestrator::{
    SUMMARY_KEY as WORKFLOW_SUMMARY, USER_INPUT_KEY as USER_INPUT,
};

pub const PLATFORM: &str = "platform";
pub const PROJECT_NAME: &str = "projectName";
pub const PACKAGE_NAME: &str = "packageName";
pub const ORGANIZATION: &str = "organization";

pub const VALID_PLATFORM_SETUP: &str = "validPlatformSetup";
pub const ANDROID_HOME: &str = "androidHome";
pub const JAVA_HOME: &str = "javaHome";
pub const FATAL_ERROR_MESSAGES: &str = "fatalErrorMessages";

pub const PROJECT_PATH: &str = "projectPath";

pub const BUILD_SUCCESSFUL: &str = "buildSuccessful";
pub const BUILD_ATTEMPT_COUNT: &str = "buildAttemptCount";
pub const MAX_BUILD_RETRIES: &str = "maxBuildRetries";
pub const RECOVERY_READY_FOR_RETRY: &str = "recoveryReadyForRetry";
pub const BUILD_OUTPUT_TAIL: &str = "buildOutputTail";

pub const DEPLOYMENT_SUCCESSFUL: &str = "deploymentSuccessful";
pub const TARGET_DEVICE: &str = "targetDevice";
pub const BUNDLE_IDENTIFIER: &str = "bundleIdentifier";

pub const WORKFLOW_CONCLUDED: &str = "workflowConcluded";
pub const WORKFLOW_STATUS: &str = "workflowStatus";

/// Properties that must all be present before platform checks can run
pub const REQUIRED_PROPERTIES: [&str; 4] = [PLATFORM, PROJECT_NAME, PACKAGE_NAME, ORGANIZATION];
