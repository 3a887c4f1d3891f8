// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checkpoint Manager Port
//!
//! Read/write snapshots of completed step ids and per-step resume cursors
//! (spec.md §4.11). Writes are serialized; reads see the last committed
//! snapshot. The engine consults this before constructing each step and
//! commits to it after each step completes.

use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// `{workflow_id, completed_steps, cursors}` per spec.md §6's persisted
/// checkpoint sidecar shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckpointSnapshot {
    pub workflow_id: String,
    pub completed_steps: Vec<String>,
    /// Per-step resume cursor, opaque to the engine; only a stage's
    /// optional cursor-resume hook interprets the value.
    pub cursors: BTreeMap<String, serde_json::Value>,
}

impl CheckpointSnapshot {
    pub fn is_complete(&self, step_id: &str) -> bool {
        self.completed_steps.iter().any(|s| s == step_id)
    }
}

/// File-local, resume-within-process checkpoint port (spec.md §1
/// Non-goals: no distributed/durable-queue checkpointing).
#[async_trait]
pub trait CheckpointManager: Send + Sync {
    /// Loads the last committed snapshot, or a fresh empty one if no
    /// sidecar exists yet.
    async fn load(&self) -> Result<CheckpointSnapshot, EngineError>;

    /// Marks `step_id` complete and persists the updated snapshot.
    async fn mark_complete(&self, step_id: &str) -> Result<(), EngineError>;

    /// Persists a resume cursor for a partially-completed step.
    async fn save_cursor(
        &self,
        step_id: &str,
        cursor: serde_json::Value,
    ) -> Result<(), EngineError>;
}

#[async_trait]
impl<T: CheckpointManager + ?Sized> CheckpointManager for Arc<T> {
    async fn load(&self) -> Result<CheckpointSnapshot, EngineError> {
        (**self).load().await
    }

    async fn mark_complete(&self, step_id: &str) -> Result<(), EngineError> {
        (**self).mark_complete(step_id).await
    }

    async fn save_cursor(
        &self,
        step_id: &str,
        cursor: serde_json::Value,
    ) -> Result<(), EngineError> {
        (**self).save_cursor(step_id, cursor).await
    }
}
