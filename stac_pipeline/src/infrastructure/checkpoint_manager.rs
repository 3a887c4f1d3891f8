// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File-Backed Checkpoint Manager
//!
//! Persists `{workflow_id, completed_steps, cursors}` (spec.md §6) to a JSON
//! sidecar file. Writes go through a temp-file-then-rename so a crash mid
//! write never leaves a half-written sidecar (same pattern the teacher's
//! transactional chunk writer uses for committing output files).

use async_trait::async_trait;
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::repositories::{CheckpointManager, CheckpointSnapshot};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Checkpointing is file-local and resume-within-process (spec.md §1
/// Non-goals); writes are serialized through `state` so concurrent
/// matrix-sibling pipelines never interleave two `persist` calls.
pub struct FileCheckpointManager {
    path: PathBuf,
    state: Mutex<CheckpointSnapshot>,
}

impl FileCheckpointManager {
    /// Loads the sidecar at `path` if it exists, or starts a fresh snapshot
    /// for `workflow_id` otherwise.
    pub async fn open(path: PathBuf, workflow_id: &str) -> Result<Self, EngineError> {
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => CheckpointSnapshot {
                workflow_id: workflow_id.to_string(),
                ..Default::default()
            },
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    async fn persist(&self, snapshot: &CheckpointSnapshot) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp_path = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointManager for FileCheckpointManager {
    async fn load(&self) -> Result<CheckpointSnapshot, EngineError> {
        Ok(self.state.lock().await.clone())
    }

    async fn mark_complete(&self, step_id: &str) -> Result<(), EngineError> {
        let mut guard = self.state.lock().await;
        if !guard.is_complete(step_id) {
            guard.completed_steps.push(step_id.to_string());
        }
        self.persist(&guard).await
    }

    async fn save_cursor(&self, step_id: &str, cursor: serde_json::Value) -> Result<(), EngineError> {
        let mut guard = self.state.lock().await;
        guard.cursors.insert(step_id.to_string(), cursor);
        self.persist(&guard).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_sidecar_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.checkpoint.json");
        let manager = FileCheckpointManager::open(path, "run-1").await.unwrap();
        let snapshot = manager.load().await.unwrap();
        assert!(snapshot.completed_steps.is_empty());
    }

    #[tokio::test]
    async fn mark_complete_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.checkpoint.json");
        let manager = FileCheckpointManager::open(path.clone(), "run-1").await.unwrap();
        manager.mark_complete("seed").await.unwrap();

        let reopened = FileCheckpointManager::open(path, "run-1").await.unwrap();
        let snapshot = reopened.load().await.unwrap();
        assert!(snapshot.is_complete("seed"));
    }

    #[tokio::test]
    async fn save_cursor_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.checkpoint.json");
        let manager = FileCheckpointManager::open(path, "run-1").await.unwrap();
        manager
            .save_cursor("ingest", serde_json::json!({"page": 3}))
            .await
            .unwrap();
        let snapshot = manager.load().await.unwrap();
        assert_eq!(snapshot.cursors.get("ingest"), Some(&serde_json::json!({"page": 3})));
    }

    #[tokio::test]
    async fn no_temp_file_survives_a_successful_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.checkpoint.json");
        let manager = FileCheckpointManager::open(path.clone(), "run-1").await.unwrap();
        manager.mark_complete("seed").await.unwrap();
        assert!(!path.with_extension("tmp").exists());
    }
}
