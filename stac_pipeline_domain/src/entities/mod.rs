// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entities
//!
//! Objects with identity that persists through the life of a workflow run:
//! the compiled [`Workflow`]/[`Step`] model, the per-run [`ExecutionContext`],
//! and the append-only [`FailureRecord`] log.

mod execution_context;
mod failure_record;
mod workflow;

pub use execution_context::{ExecutionContext, LoggerName};
pub use failure_record::{FailureContext, FailureRecord};
pub use workflow::{
    CheckpointSettings, LogLevelSetting, LogOutputFormat, LoggingSettings, MatrixSpec, Step, StepModule,
    Workflow, WorkflowSettings,
};
