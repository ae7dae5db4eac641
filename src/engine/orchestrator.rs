// SPDX-License-Identifier: MIT

//! Session front door
//!
//! The orchestrator turns an inbound `{userInput, sessionToken}` envelope into
//! one executor invocation: it resolves or mints the session, starts or
//! resumes the graph, persists the checkpoint on suspension and renders the
//! outcome into instructions for the external actor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::checkpoint::Checkpointer;
use super::error::EngineError;
use super::graph::{Entry, Graph, RunResult, Suspension};
use super::interrupt::Interrupt;
use super::state::{StatePatch, WorkflowState};

/// State key that receives the user input of a fresh session
pub const USER_INPUT_KEY: &str = "userInput";

/// State key whose text, if any, is appended to the completion instructions
pub const SUMMARY_KEY: &str = "workflowSummary";

/// Default prefix of generated session ids
pub const DEFAULT_SESSION_PREFIX: &str = "mobile";

/// Inbound envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    pub user_input: Value,
    /// Empty or absent means "start fresh"
    #[serde(default)]
    pub session_token: Option<String>,
}

impl InboundRequest {
    /// Validate the envelope shape; `None` when it does not match
    pub fn parse(raw: &Value) -> Option<Self> {
        if !raw.as_object()?.contains_key("userInput") {
            return None;
        }
        serde_json::from_value(raw.clone()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Suspended,
    Completed,
}

/// What the caller gets back from one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorResponse {
    pub instructions_for_external_actor: String,
    pub session_id: String,
    pub status: SessionStatus,
    /// True once the workflow reached its end
    pub concluded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<Interrupt>,
    /// Final state of a completed session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Drives sessions of one graph against one checkpoint store
pub struct Orchestrator {
    graph: Arc<Graph>,
    checkpointer: Arc<dyn Checkpointer>,
    session_prefix: String,
}

impl Orchestrator {
    pub fn new(graph: Arc<Graph>, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            graph,
            checkpointer,
            session_prefix: DEFAULT_SESSION_PREFIX.to_string(),
        }
    }

    pub fn with_session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = prefix.into();
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Mint a fresh `<prefix>-<uuid>` session id
    pub fn new_session_id(&self) -> String {
        format!("{}-{}", self.session_prefix, uuid::Uuid::new_v4())
    }

    /// Entry point for raw inbound payloads.
    ///
    /// A payload that is not a valid envelope is not rejected: it becomes the
    /// user input of a brand-new session.
    pub async fn handle(&self, raw: Value) -> Result<OrchestratorResponse, EngineError> {
        match InboundRequest::parse(&raw) {
            Some(request) => {
                self.begin_session(request.user_input, request.session_token.as_deref())
                    .await
            }
            None => {
                log::warn!(
                    "Malformed inbound envelope, starting a new session with the raw payload"
                );
                self.begin_session(raw, None).await
            }
        }
    }

    /// Start a new session or resume the one named by `token`
    pub async fn begin_session(
        &self,
        input: Value,
        token: Option<&str>,
    ) -> Result<OrchestratorResponse, EngineError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());

        let checkpoint = match token {
            Some(token) => {
                let found = self.checkpointer.load(token).await?;
                if found.is_none() {
                    log::warn!("No checkpoint for session token {}, starting a new session", token);
                }
                found
            }
            None => None,
        };

        let (session_id, state, entry) = match checkpoint {
            Some(checkpoint) => {
                log::info!(
                    "Resuming session {} at step {}",
                    checkpoint.session_id,
                    checkpoint.current_step
                );
                let entry = Entry::Resume {
                    step: checkpoint.current_step,
                    value: input,
                };
                (checkpoint.session_id, checkpoint.state, entry)
            }
            None => {
                let session_id = self.new_session_id();
                log::info!("Starting session {}", session_id);
                let state =
                    WorkflowState::empty().merge(StatePatch::new().with(USER_INPUT_KEY, input));
                (session_id, state, Entry::Start)
            }
        };

        match self.graph.run(&session_id, state, entry).await? {
            RunResult::Suspended(suspension) => {
                self.checkpointer
                    .save(&suspension.session_id, &suspension.step, &suspension.state)
                    .await?;
                log::info!(
                    "Session {} suspended at {}",
                    suspension.session_id,
                    suspension.step
                );
                Ok(suspended_response(suspension))
            }
            RunResult::Completed(state) => {
                log::info!("Session {} concluded", session_id);
                Ok(completed_response(session_id, state))
            }
        }
    }
}

fn resume_hint(session_id: &str, what: &str) -> String {
    format!(
        "When done, call this workflow again with {{\"userInput\": {}, \"sessionToken\": \"{}\"}}.",
        what, session_id
    )
}

fn suspended_response(suspension: Suspension) -> OrchestratorResponse {
    let Suspension {
        session_id,
        interrupt,
        ..
    } = suspension;

    let instructions = match &interrupt {
        Interrupt::Delegate { capability, input } => format!(
            "Invoke the capability '{}' ({}).\n\nInput:\n{}\n\nInput contract:\n{}\n\n{}",
            capability.id,
            capability.description,
            pretty(input),
            pretty(&capability.input_schema),
            resume_hint(&session_id, "<the capability result>")
        ),
        Interrupt::Guidance {
            instructions,
            result_schema,
        } => format!(
            "{}\n\nExpected result:\n{}\n\n{}",
            instructions,
            pretty(result_schema),
            resume_hint(&session_id, "<a value matching the expected result>")
        ),
    };

    OrchestratorResponse {
        instructions_for_external_actor: instructions,
        session_id,
        status: SessionStatus::Suspended,
        concluded: false,
        interrupt: Some(interrupt),
        result: None,
    }
}

fn completed_response(session_id: String, state: WorkflowState) -> OrchestratorResponse {
    let summary = state
        .get_str(SUMMARY_KEY)
        .map(|s| format!("\n\n{}", s))
        .unwrap_or_default();

    OrchestratorResponse {
        instructions_for_external_actor: format!(
            "The workflow has concluded for session {}. No further calls are needed.{}",
            session_id, summary
        ),
        session_id,
        status: SessionStatus::Completed,
        concluded: true,
        interrupt: None,
        result: Some(state.to_json()),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
