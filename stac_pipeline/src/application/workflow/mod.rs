// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Engine
//!
//! Compiles a parsed [`stac_pipeline_domain::entities::Workflow`] into a
//! runnable plan (`dag`), expands matrix steps into sibling pipelines
//! (`matrix`), and drives execution (`engine`).

pub mod dag;
pub mod engine;
pub mod matrix;

pub use engine::{RunSummary, WorkflowEngine};
