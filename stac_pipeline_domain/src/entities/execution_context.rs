// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Context
//!
//! A per-run value object carrying workflow identity, configuration
//! snapshot, logger name, failure collector, checkpoint manager, and a
//! string-keyed data map for inter-stage sharing (spec.md §2/§4.2).
//! Constructed by the engine, never by stages. Supports [`fork`](ExecutionContext::fork)
//! for matrix parallelism: children share the collector/manager/logger root
//! and overlay their own `data`.

use crate::entities::Workflow;
use crate::repositories::{CheckpointManager, FailureCollector};
use crate::value_objects::WorkflowId;
use std::collections::HashMap;
use std::sync::Arc;

/// Hierarchical logger name, `engine.<workflow>.<step>[.<matrix_coord>]`.
/// The domain only names loggers; `tracing::Span` construction from this
/// name is an infrastructure concern (spec.md §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerName(String);

impl LoggerName {
    pub fn root(workflow_name: &str) -> Self {
        Self(format!("engine.{workflow_name}"))
    }

    pub fn for_step(&self, step_id: &str) -> Self {
        Self(format!("{}.{}", self.0, step_id))
    }

    pub fn for_matrix_coordinate(&self, coordinate_suffix: &str) -> Self {
        Self(format!("{}.{}", self.0, coordinate_suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The per-run execution context. Cheap to clone: the heavy fields are all
/// `Arc`-wrapped.
#[derive(Clone)]
pub struct ExecutionContext {
    pub workflow_id: WorkflowId,
    pub config: Arc<Workflow>,
    pub logger: LoggerName,
    pub failure_collector: Arc<dyn FailureCollector>,
    pub checkpoint_manager: Arc<dyn CheckpointManager>,
    pub data: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(
        workflow_id: WorkflowId,
        config: Arc<Workflow>,
        failure_collector: Arc<dyn FailureCollector>,
        checkpoint_manager: Arc<dyn CheckpointManager>,
    ) -> Self {
        let logger = LoggerName::root(&config.name);
        Self {
            workflow_id,
            config,
            logger,
            failure_collector,
            checkpoint_manager,
            data: HashMap::new(),
        }
    }

    /// Returns a child context for a matrix sibling (or any scoped child
    /// execution). Shares the failure collector, checkpoint manager, and
    /// config; `data` is the parent's data overlaid with `overlay` -- the
    /// fork never mutates the parent's own `data`.
    pub fn fork(&self, overlay: HashMap<String, serde_json::Value>) -> Self {
        let mut data = self.data.clone();
        data.extend(overlay);
        Self {
            workflow_id: self.workflow_id.clone(),
            config: Arc::clone(&self.config),
            logger: self.logger.clone(),
            failure_collector: Arc::clone(&self.failure_collector),
            checkpoint_manager: Arc::clone(&self.checkpoint_manager),
            data,
        }
    }

    /// Returns a child context scoped to a step, with the step's name
    /// appended to the logger hierarchy.
    pub fn for_step(&self, step_id: &str) -> Self {
        let mut child = self.fork(HashMap::new());
        child.logger = self.logger.for_step(step_id);
        child
    }

    /// Reads a previously-published step output (e.g. a Sink's manifest)
    /// from `data`.
    pub fn step_output(&self, step_id: &str) -> Option<&serde_json::Value> {
        self.data.get(step_id)
    }

    /// Publishes a step's output under its step id for downstream steps.
    pub fn publish(&mut self, step_id: &str, value: serde_json::Value) {
        self.data.insert(step_id.to_string(), value);
    }
}
