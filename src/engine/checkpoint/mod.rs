// SPDX-License-Identifier: MIT

//! Session checkpoints
//!
//! This module provides:
//! - `Checkpoint` - the persisted `(session id, current step, state)` snapshot
//! - `Checkpointer` - storage contract shared by all backends
//! - `MemoryCheckpointer` - process-local map, for tests and ephemeral runs
//! - `FileCheckpointer` - JSON files through the `FileSystem` collaborator

mod file;
mod memory;

pub use file::FileCheckpointer;
pub use memory::MemoryCheckpointer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CheckpointError;
use super::state::WorkflowState;

/// Snapshot of a suspended session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub session_id: String,
    /// The step that suspended and will receive the resume value
    pub current_step: String,
    pub state: WorkflowState,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(session_id: &str, current_step: &str, state: &WorkflowState) -> Self {
        Self {
            session_id: session_id.to_string(),
            current_step: current_step.to_string(),
            state: state.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Storage for the latest checkpoint of each session.
///
/// `save` replaces any previous checkpoint of the same session. `load` of an
/// unknown session is `Ok(None)`. Different sessions may be used concurrently;
/// a single session has a single writer at a time.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(
        &self,
        session_id: &str,
        current_step: &str,
        state: &WorkflowState,
    ) -> Result<(), CheckpointError>;

    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;
}
