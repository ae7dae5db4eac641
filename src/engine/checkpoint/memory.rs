// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Checkpoint, Checkpointer};
use crate::engine::error::CheckpointError;
use crate::engine::state::WorkflowState;

/// Volatile, process-local checkpoint store
#[derive(Clone, Default)]
pub struct MemoryCheckpointer {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of all stored sessions, sorted
    pub async fn sessions(&self) -> Vec<String> {
        let checkpoints = self.checkpoints.read().await;
        let mut ids: Vec<String> = checkpoints.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(
        &self,
        session_id: &str,
        current_step: &str,
        state: &WorkflowState,
    ) -> Result<(), CheckpointError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(
            session_id.to_string(),
            Checkpoint::new(session_id, current_step, state),
        );
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(session_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::StatePatch;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemoryCheckpointer::new();
        let state = WorkflowState::empty().merge(StatePatch::new().with("platform", "iOS"));

        store.save("s-1", "build", &state).await.unwrap();
        let loaded = store.load("s-1").await.unwrap().unwrap();

        assert_eq!(loaded.session_id, "s-1");
        assert_eq!(loaded.current_step, "build");
        assert_eq!(loaded.state, state);
    }

    #[tokio::test]
    async fn test_load_unknown_is_none() {
        let store = MemoryCheckpointer::new();
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let store = MemoryCheckpointer::new();
        store.save("s", "a", &WorkflowState::empty()).await.unwrap();
        let state = WorkflowState::from_json(json!({"x": 1})).unwrap();
        store.save("s", "b", &state).await.unwrap();

        let loaded = store.load("s").await.unwrap().unwrap();
        assert_eq!(loaded.current_step, "b");
        assert_eq!(loaded.state.get_i64("x"), Some(1));
        assert_eq!(store.sessions().await, vec!["s".to_string()]);
    }

    #[tokio::test]
    async fn test_clone_shares_storage() {
        let store = MemoryCheckpointer::new();
        let clone = store.clone();
        clone.save("shared", "a", &WorkflowState::empty()).await.unwrap();
        assert!(store.load("shared").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_sessions() {
        let store = MemoryCheckpointer::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let state = WorkflowState::from_json(json!({ "n": i })).unwrap();
                store.save(&format!("s-{}", i), "step", &state).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..16 {
            let loaded = store.load(&format!("s-{}", i)).await.unwrap().unwrap();
            assert_eq!(loaded.state.get_i64("n"), Some(i));
        }
    }
}
