// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Checkpoint, Checkpointer};
use crate::engine::error::CheckpointError;
use crate::engine::fs::FileSystem;
use crate::engine::state::WorkflowState;

/// Durable checkpoint store: one pretty-printed JSON document per session
/// under `root`.
///
/// [`FileSystem`] calls block, so they run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl FileCheckpointer {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a session's document, or `None` for ids that would escape `root`
    fn path_for(&self, session_id: &str) -> Option<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id != "."
            && !session_id.contains("..")
            && !session_id.contains(['/', '\\', '\0']);
        valid.then(|| self.root.join(format!("{}.json", session_id)))
    }

    /// Run a blocking filesystem operation off the async worker threads
    async fn blocking<T, F>(&self, op: F) -> Result<T, CheckpointError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn FileSystem) -> Result<T, CheckpointError> + Send + 'static,
    {
        let fs = self.fs.clone();
        tokio::task::spawn_blocking(move || op(fs.as_ref()))
            .await
            .map_err(|e| CheckpointError::Backend(format!("checkpoint task failed: {}", e)))?
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn save(
        &self,
        session_id: &str,
        current_step: &str,
        state: &WorkflowState,
    ) -> Result<(), CheckpointError> {
        let path = self
            .path_for(session_id)
            .ok_or_else(|| CheckpointError::InvalidSessionId(session_id.to_string()))?;

        let checkpoint = Checkpoint::new(session_id, current_step, state);
        let bytes = serde_json::to_vec_pretty(&checkpoint)
            .map_err(|e| CheckpointError::Backend(e.to_string()))?;

        let target = path.clone();
        self.blocking(move |fs| {
            fs.write(&target, &bytes)
                .map_err(|e| CheckpointError::Backend(format!("writing {:?}: {}", target, e)))
        })
        .await?;

        log::debug!("Saved checkpoint for {} at {:?}", session_id, path);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let Some(path) = self.path_for(session_id) else {
            log::warn!("Ignoring unusable session id {:?}", session_id);
            return Ok(None);
        };

        let bytes = self
            .blocking(move |fs| {
                if !fs.exists(&path) {
                    return Ok(None);
                }
                fs.read(&path)
                    .map(Some)
                    .map_err(|e| CheckpointError::Backend(format!("reading {:?}: {}", path, e)))
            })
            .await?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };

        let checkpoint: Checkpoint =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupt {
                session_id: session_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(Some(checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fs::{MemoryFileSystem, RealFileSystem};
    use serde_json::json;

    fn sample_state() -> WorkflowState {
        WorkflowState::from_json(json!({
            "platform": "Android",
            "buildAttemptCount": 2,
            "fatalErrorMessages": ["a", "b"],
            "nested": {"z": 1, "a": [true, null]}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip_memory_fs() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = FileCheckpointer::new(fs.clone(), "/project/.forge/sessions");
        let state = sample_state();

        store.save("mobile-abc", "build_recovery", &state).await.unwrap();
        assert!(fs.exists(Path::new("/project/.forge/sessions/mobile-abc.json")));

        let loaded = store.load("mobile-abc").await.unwrap().unwrap();
        assert_eq!(loaded.current_step, "build_recovery");
        assert_eq!(
            serde_json::to_vec(&loaded.state).unwrap(),
            serde_json::to_vec(&state).unwrap()
        );
    }

    #[tokio::test]
    async fn test_roundtrip_real_fs_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let state = sample_state();

        let writer = FileCheckpointer::new(Arc::new(RealFileSystem), dir.path());
        writer.save("mobile-1", "deployment", &state).await.unwrap();

        // A fresh instance simulates a new process
        let reader = FileCheckpointer::new(Arc::new(RealFileSystem), dir.path());
        let loaded = reader.load("mobile-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step, "deployment");
        assert_eq!(loaded.state, state);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_sessions_real_fs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCheckpointer::new(Arc::new(RealFileSystem), dir.path()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("mobile-{}", i);
                let state = WorkflowState::from_json(json!({"buildAttemptCount": i})).unwrap();
                store.save(&id, "build", &state).await.unwrap();
                store.load(&id).await.unwrap().unwrap()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let loaded = handle.await.unwrap();
            assert_eq!(loaded.session_id, format!("mobile-{}", i));
            assert_eq!(loaded.state.get_i64("buildAttemptCount"), Some(i as i64));
        }
    }

    #[tokio::test]
    async fn test_unknown_session_is_none() {
        let store = FileCheckpointer::new(Arc::new(MemoryFileSystem::new()), "/root");
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_path_escaping_ids() {
        let store = FileCheckpointer::new(Arc::new(MemoryFileSystem::new()), "/root");

        assert!(store.load("../etc/passwd").await.unwrap().is_none());
        assert!(store.load("").await.unwrap().is_none());

        let err = store
            .save("a/b", "step", &WorkflowState::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidSessionId(_)));
    }

    #[tokio::test]
    async fn test_corrupt_document() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/root/broken.json", "{not json");
        let store = FileCheckpointer::new(fs, "/root");

        let err = store.load("broken").await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }));
    }
}
