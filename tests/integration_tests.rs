//! Integration tests for sessions and the mobile workflow
//!
//! These tests drive the orchestrator end to end using scripted commands and
//! in-memory or temporary file systems.

use async_trait::async_trait;
use mobile_forge::engine::capability::Capability;
use mobile_forge::engine::checkpoint::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
use mobile_forge::engine::command::{ScriptedReply, ScriptedRunner};
use mobile_forge::engine::error::{EngineError, StepError};
use mobile_forge::engine::fs::{FileSystem, MemoryFileSystem, RealFileSystem};
use mobile_forge::engine::graph::{FnStep, GraphBuilder, Step, StepOutcome, END, START};
use mobile_forge::engine::interrupt::Interrupt;
use mobile_forge::engine::orchestrator::{Orchestrator, OrchestratorResponse, SessionStatus};
use mobile_forge::engine::state::{StatePatch, WorkflowState};
use mobile_forge::forge::config::{CheckpointBackend, ForgeConfig};
use mobile_forge::forge::build_orchestrator;
use mobile_forge::forge::steps::BUILD_RECOVERY_CAPABILITY;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// Mock Components
// ============================================================================

/// Delegates to capability "X" once, then records the answer
struct AskStep;

#[async_trait]
impl Step for AskStep {
    fn name(&self) -> &str {
        "ask"
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        let input = state.get("userInput").cloned().unwrap_or(Value::Null);
        Ok(StepOutcome::Suspend(Interrupt::delegate(
            Capability::new("X", "Answers the question", json!({"type": "object"})),
            json!({ "question": input }),
        )))
    }

    async fn resume(&self, _state: &WorkflowState, value: Value) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Patch(StatePatch::new().with("answer", value)))
    }
}

fn ask_orchestrator(checkpointer: Arc<dyn Checkpointer>) -> Orchestrator {
    let graph = GraphBuilder::new("ask-then-finish")
        .step(Arc::new(AskStep))
        .step(Arc::new(FnStep::new("finish", |state: &WorkflowState| {
            let answer = state.get("answer").cloned().unwrap_or(Value::Null);
            Ok(StatePatch::new().with("workflowSummary", format!("Answer was {}", answer)))
        })))
        .edge(START, "ask")
        .edge("ask", "finish")
        .edge("finish", END)
        .build()
        .unwrap();
    Orchestrator::new(Arc::new(graph), checkpointer).with_session_prefix("prefix")
}

fn delegated_capability(response: &OrchestratorResponse) -> String {
    match &response.interrupt {
        Some(Interrupt::Delegate { capability, .. }) => capability.id.clone(),
        other => panic!("expected a delegate interrupt, got {:?}", other),
    }
}

// ============================================================================
// Session Lifecycle
// ============================================================================

#[tokio::test]
async fn test_new_session_then_resume_to_conclusion() {
    let orchestrator = ask_orchestrator(Arc::new(MemoryCheckpointer::new()));

    let first = orchestrator
        .handle(json!({"userInput": "what now?", "sessionToken": ""}))
        .await
        .unwrap();
    assert_eq!(first.status, SessionStatus::Suspended);
    assert_eq!(delegated_capability(&first), "X");
    assert!(Regex::new(r"^prefix-.+").unwrap().is_match(&first.session_id));
    assert!(first
        .instructions_for_external_actor
        .contains(&first.session_id));
    assert!(first.instructions_for_external_actor.contains("'X'"));

    let second = orchestrator
        .handle(json!({"userInput": {"anything": 1}, "sessionToken": first.session_id}))
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.status, SessionStatus::Completed);
    assert!(second.concluded);
    assert!(second.instructions_for_external_actor.contains("concluded"));
    assert_eq!(second.result.unwrap()["answer"], json!({"anything": 1}));
}

#[tokio::test]
async fn test_resume_twice_gives_same_result() {
    let orchestrator = ask_orchestrator(Arc::new(MemoryCheckpointer::new()));
    let first = orchestrator.handle(json!({"userInput": "q"})).await.unwrap();

    let envelope = json!({"userInput": "same answer", "sessionToken": first.session_id});
    let a = orchestrator.handle(envelope.clone()).await.unwrap();
    let b = orchestrator.handle(envelope).await.unwrap();

    assert_eq!(a.status, b.status);
    assert_eq!(a.result, b.result);
    assert_eq!(
        a.instructions_for_external_actor,
        b.instructions_for_external_actor
    );
}

#[tokio::test]
async fn test_unknown_token_starts_new_session() {
    let orchestrator = ask_orchestrator(Arc::new(MemoryCheckpointer::new()));

    let response = orchestrator
        .handle(json!({"userInput": "hello", "sessionToken": "prefix-does-not-exist"}))
        .await
        .unwrap();
    assert_ne!(response.session_id, "prefix-does-not-exist");
    assert_eq!(response.status, SessionStatus::Suspended);
    match response.interrupt {
        Some(Interrupt::Delegate { input, .. }) => assert_eq!(input["question"], "hello"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_envelope_becomes_input() {
    let orchestrator = ask_orchestrator(Arc::new(MemoryCheckpointer::new()));

    for raw in [json!("just text"), json!({"sessionToken": 7}), json!([1, 2])] {
        let response = orchestrator.handle(raw.clone()).await.unwrap();
        assert_eq!(response.status, SessionStatus::Suspended);
        match response.interrupt {
            Some(Interrupt::Delegate { input, .. }) => assert_eq!(input["question"], raw),
            other => panic!("unexpected {:?}", other),
        }
    }
}

// ============================================================================
// Durable Checkpoints
// ============================================================================

#[tokio::test]
async fn test_resume_across_processes() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sessions");

    let first_process = ask_orchestrator(Arc::new(FileCheckpointer::new(
        Arc::new(RealFileSystem),
        root.clone(),
    )));
    let first = first_process.handle(json!({"userInput": "q"})).await.unwrap();
    assert!(root.join(format!("{}.json", first.session_id)).exists());
    drop(first_process);

    let second_process = ask_orchestrator(Arc::new(FileCheckpointer::new(
        Arc::new(RealFileSystem),
        root,
    )));
    let done = second_process
        .handle(json!({"userInput": 42, "sessionToken": first.session_id}))
        .await
        .unwrap();
    assert!(done.concluded);
    assert_eq!(done.result.unwrap()["answer"], 42);
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let fs = RealFileSystem;
    fs.write(&dir.path().join("prefix-broken.json"), b"{ not json")
        .unwrap();

    let orchestrator = ask_orchestrator(Arc::new(FileCheckpointer::new(
        Arc::new(RealFileSystem),
        dir.path(),
    )));
    let err = orchestrator
        .handle(json!({"userInput": "q", "sessionToken": "prefix-broken"}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Checkpoint(_)));
}

// ============================================================================
// Mobile Workflow
// ============================================================================

const PBXPROJ: &str = r#"
    buildSettings = {
        PRODUCT_BUNDLE_IDENTIFIER = com.acme.todo;
    };
    buildSettings = {
        PRODUCT_BUNDLE_IDENTIFIER = com.acme.todoTests;
    };
"#;

const SIMULATORS: &str = r#"{"devices": {
    "com.apple.CoreSimulator.SimRuntime.iOS-17-5": [
        {"udid": "OLD", "name": "iPhone 15", "state": "Shutdown", "isAvailable": true}
    ],
    "com.apple.CoreSimulator.SimRuntime.iOS-18-0": [
        {"udid": "NEW", "name": "iPhone 16", "state": "Booted", "isAvailable": true}
    ]
}}"#;

fn ios_project() -> MemoryFileSystem {
    let fs = MemoryFileSystem::new();
    fs.add_file("/work/Todo/Todo.xcodeproj/project.pbxproj", PBXPROJ);
    fs.add_dir("/work/Todo/build/Build/Products/Debug-iphonesimulator/Todo.app");
    fs
}

fn ios_runner(build_replies: Vec<ScriptedReply>) -> ScriptedRunner {
    ScriptedRunner::new()
        .on("xcodebuild", &["-version"], vec![ScriptedReply::ok("Xcode 15.4")])
        .on("xcodebuild", &["build"], build_replies)
        .on("xcrun", &["help"], vec![ScriptedReply::ok("usage: simctl")])
        .on("xcrun", &["list", "devices"], vec![ScriptedReply::ok(SIMULATORS)])
        .on("xcrun", &["spawn"], vec![ScriptedReply::ok("")])
        .on("xcrun", &["install"], vec![ScriptedReply::ok("")])
        .on("xcrun", &["launch"], vec![ScriptedReply::ok("com.acme.todo: 4711")])
}

fn forge(runner: Arc<ScriptedRunner>) -> Orchestrator {
    let mut config = ForgeConfig::default();
    config.checkpoint.backend = CheckpointBackend::Memory;
    build_orchestrator(config, runner, Arc::new(ios_project()), None).unwrap()
}

/// Drive a session up to the delegated project generation; returns its token
async fn up_to_generation(orchestrator: &Orchestrator) -> String {
    let first = orchestrator
        .handle(json!({"userInput": "I want an iPhone todo app called Todo"}))
        .await
        .unwrap();
    assert_eq!(delegated_capability(&first), "project-property-extraction");
    let token = first.session_id;

    let generation = orchestrator
        .handle(json!({
            "userInput": {
                "platform": "iOS",
                "projectName": "Todo",
                "packageName": "com.acme.todo",
                "organization": "Acme",
            },
            "sessionToken": token,
        }))
        .await
        .unwrap();
    assert_eq!(delegated_capability(&generation), "project-generation");
    token
}

/// Drive a session from the first request up to the build result
async fn through_generation(orchestrator: &Orchestrator) -> OrchestratorResponse {
    let token = up_to_generation(orchestrator).await;
    orchestrator
        .handle(json!({"userInput": {"projectPath": "/work/Todo"}, "sessionToken": token}))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_ios_happy_path() {
    let runner = Arc::new(ios_runner(vec![ScriptedReply::ok("** BUILD SUCCEEDED **")]));
    let orchestrator = forge(runner.clone());

    let done = through_generation(&orchestrator).await;
    assert!(done.concluded);
    let result = done.result.unwrap();
    assert_eq!(result["workflowStatus"], "success");
    assert_eq!(result["buildAttemptCount"], 1);
    assert_eq!(result["bundleIdentifier"], "com.acme.todo");
    assert_eq!(result["targetDevice"]["id"], "NEW");
    assert!(done.instructions_for_external_actor.contains("launched on iPhone 16"));

    assert_eq!(runner.count("xcodebuild", "build"), 1);
    assert_eq!(runner.count("xcrun", "boot"), 0);
}

#[tokio::test]
async fn test_ios_build_recovery_then_success() {
    let runner = Arc::new(ios_runner(vec![
        ScriptedReply::fail(65, "error: cannot find 'Foo' in scope"),
        ScriptedReply::ok("** BUILD SUCCEEDED **"),
    ]));
    let orchestrator = forge(runner.clone());

    let recovery = through_generation(&orchestrator).await;
    assert_eq!(delegated_capability(&recovery), BUILD_RECOVERY_CAPABILITY);
    match &recovery.interrupt {
        Some(Interrupt::Delegate { input, .. }) => {
            assert_eq!(input["attempt"], 1);
            assert!(input["buildOutput"].as_str().unwrap().contains("cannot find 'Foo'"));
        }
        other => panic!("unexpected {:?}", other),
    }

    let done = orchestrator
        .handle(json!({
            "userInput": {"readyForRetry": true},
            "sessionToken": recovery.session_id,
        }))
        .await
        .unwrap();
    let result = done.result.unwrap();
    assert_eq!(result["workflowStatus"], "success");
    assert_eq!(result["buildAttemptCount"], 2);
    assert_eq!(runner.count("xcodebuild", "build"), 2);
}

#[tokio::test]
async fn test_rejected_recovery_answer_keeps_checkpoint() {
    let runner = Arc::new(ios_runner(vec![
        ScriptedReply::fail(65, "error: cannot find 'Foo' in scope"),
        ScriptedReply::ok("** BUILD SUCCEEDED **"),
    ]));
    let orchestrator = forge(runner.clone());

    let recovery = through_generation(&orchestrator).await;
    assert_eq!(delegated_capability(&recovery), BUILD_RECOVERY_CAPABILITY);
    let token = recovery.session_id.clone();
    let before = orchestrator
        .checkpointer()
        .load(&token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.current_step, "build_recovery");

    let err = orchestrator
        .handle(json!({"userInput": "maybe", "sessionToken": token}))
        .await
        .unwrap_err();
    match err {
        EngineError::Step { step, source } => {
            assert_eq!(step, "build_recovery");
            assert!(matches!(source, StepError::InvalidResumeValue(_)));
        }
        other => panic!("unexpected {:?}", other),
    }

    let after = orchestrator
        .checkpointer()
        .load(&token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.current_step, "build_recovery");
    assert_eq!(after.state, before.state);
    assert_eq!(after.saved_at, before.saved_at);

    let done = orchestrator
        .handle(json!({"userInput": {"readyForRetry": true}, "sessionToken": token}))
        .await
        .unwrap();
    assert!(done.concluded);
    let result = done.result.unwrap();
    assert_eq!(result["workflowStatus"], "success");
    assert_eq!(result["buildAttemptCount"], 2);
    assert_eq!(runner.count("xcodebuild", "build"), 2);
}

#[tokio::test]
async fn test_missing_generated_project_is_rejected() {
    let runner = Arc::new(ios_runner(vec![ScriptedReply::ok("** BUILD SUCCEEDED **")]));
    let orchestrator = forge(runner.clone());
    let token = up_to_generation(&orchestrator).await;

    let err = orchestrator
        .handle(json!({"userInput": {"projectPath": "/nowhere"}, "sessionToken": token}))
        .await
        .unwrap_err();
    match err {
        EngineError::Step { step, source } => {
            assert_eq!(step, "project_generation");
            match source {
                StepError::InvalidResumeValue(message) => assert!(message.contains("/nowhere")),
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(runner.count("xcodebuild", "build"), 0);

    let checkpoint = orchestrator
        .checkpointer()
        .load(&token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.current_step, "project_generation");
    assert!(checkpoint.state.get("projectPath").is_none());

    let done = orchestrator
        .handle(json!({"userInput": {"projectPath": "/work/Todo"}, "sessionToken": token}))
        .await
        .unwrap();
    assert!(done.concluded);
    assert_eq!(done.result.unwrap()["workflowStatus"], "success");
    assert_eq!(runner.count("xcodebuild", "build"), 1);
}

#[tokio::test]
async fn test_ios_recovery_declines() {
    let runner = Arc::new(ios_runner(vec![ScriptedReply::fail(65, "error: broken")]));
    let orchestrator = forge(runner.clone());

    let recovery = through_generation(&orchestrator).await;
    let done = orchestrator
        .handle(json!({"userInput": false, "sessionToken": recovery.session_id}))
        .await
        .unwrap();
    let result = done.result.unwrap();
    assert_eq!(result["workflowStatus"], "failed");
    assert_eq!(result["buildAttemptCount"], 1);
    assert_eq!(runner.count("xcodebuild", "build"), 1);
}

#[tokio::test]
async fn test_ios_build_retries_exhausted() {
    let runner = Arc::new(ios_runner(vec![ScriptedReply::fail(65, "error: still broken")]));
    let orchestrator = forge(runner.clone());

    let mut response = through_generation(&orchestrator).await;
    while !response.concluded {
        assert_eq!(delegated_capability(&response), BUILD_RECOVERY_CAPABILITY);
        response = orchestrator
            .handle(json!({
                "userInput": {"readyForRetry": true},
                "sessionToken": response.session_id,
            }))
            .await
            .unwrap();
    }

    let result = response.result.unwrap();
    assert_eq!(result["workflowStatus"], "failed");
    assert_eq!(result["buildAttemptCount"], 3);
    assert_eq!(runner.count("xcodebuild", "build"), 3);
    assert!(result["workflowSummary"]
        .as_str()
        .unwrap()
        .contains("Build attempt 3 failed"));
}
