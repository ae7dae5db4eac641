// SPDX-License-Identifier: MIT

//! Routing and retry decisions
//!
//! Every router is a pure decision table over state fields and returns one of
//! the step names below. The graph declares the same names as destinations,
//! so a router can never lead somewhere undeclared.

use super::keys;
use crate::engine::state::WorkflowState;

pub const EXTRACT_PROPERTIES: &str = "extract_properties";
pub const GET_USER_INPUT: &str = "get_user_input";
pub const PLATFORM_CHECK: &str = "platform_check";
pub const ANDROID_SETUP_RECOVERY: &str = "android_setup_recovery";
pub const PROJECT_GENERATION: &str = "project_generation";
pub const BUILD: &str = "build";
pub const BUILD_RECOVERY: &str = "build_recovery";
pub const DEPLOYMENT: &str = "deployment";
pub const COMPLETION: &str = "completion";
pub const FAILURE: &str = "failure";

pub const DEFAULT_MAX_BUILD_RETRIES: i64 = 3;

/// Destinations of [`build_retry_router`]
pub const BUILD_RETRY_ROUTES: [&str; 3] = [DEPLOYMENT, BUILD_RECOVERY, FAILURE];
/// Destinations of [`setup_validation_router`]
pub const SETUP_ROUTES: [&str; 3] = [PROJECT_GENERATION, ANDROID_SETUP_RECOVERY, FAILURE];
/// Destinations of [`properties_router`]
pub const PROPERTIES_ROUTES: [&str; 2] = [PLATFORM_CHECK, GET_USER_INPUT];
/// Destinations of [`deployment_router`]
pub const DEPLOYMENT_ROUTES: [&str; 2] = [COMPLETION, FAILURE];

/// Decide what follows a build attempt.
///
/// Order matters: success beats exhaustion, and exhaustion beats an explicit
/// refusal from recovery. An absent `recoveryReadyForRetry` means recovery has
/// not run yet.
pub fn build_retry_router(state: &WorkflowState) -> &'static str {
    if state.get_bool(keys::BUILD_SUCCESSFUL) == Some(true) {
        return DEPLOYMENT;
    }

    let attempts = state.get_i64(keys::BUILD_ATTEMPT_COUNT).unwrap_or(0);
    let max = state
        .get_i64(keys::MAX_BUILD_RETRIES)
        .unwrap_or(DEFAULT_MAX_BUILD_RETRIES);
    if attempts >= max {
        log::warn!("Build failed after {} of {} attempts", attempts, max);
        return FAILURE;
    }

    if state.get_bool(keys::RECOVERY_READY_FOR_RETRY) == Some(false) {
        return FAILURE;
    }

    BUILD_RECOVERY
}

/// Decide what follows the platform check.
///
/// `null`, absent and empty strings all count as "not supplied".
pub fn setup_validation_router(state: &WorkflowState) -> &'static str {
    if state.get_bool(keys::VALID_PLATFORM_SETUP) == Some(true) {
        return PROJECT_GENERATION;
    }

    if !is_android(state) {
        return FAILURE;
    }

    let paths_supplied = state.is_present(keys::ANDROID_HOME) && state.is_present(keys::JAVA_HOME);
    if paths_supplied {
        // Paths were already provided and still do not work
        FAILURE
    } else {
        ANDROID_SETUP_RECOVERY
    }
}

/// Ask the user until every required project property is known
pub fn properties_router(state: &WorkflowState) -> &'static str {
    if missing_properties(state).is_empty() {
        PLATFORM_CHECK
    } else {
        GET_USER_INPUT
    }
}

pub fn deployment_router(state: &WorkflowState) -> &'static str {
    if state.get_bool(keys::DEPLOYMENT_SUCCESSFUL) == Some(true) {
        COMPLETION
    } else {
        FAILURE
    }
}

/// Required properties that are absent or blank
pub fn missing_properties(state: &WorkflowState) -> Vec<&'static str> {
    keys::REQUIRED_PROPERTIES
        .iter()
        .copied()
        .filter(|key| !state.is_present(key))
        .collect()
}

pub fn is_android(state: &WorkflowState) -> bool {
    state
        .get_str(keys::PLATFORM)
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("android"))
}

pub fn is_ios(state: &WorkflowState) -> bool {
    state
        .get_str(keys::PLATFORM)
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("ios"))
}
