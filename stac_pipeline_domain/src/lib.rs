// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAC Pipeline Domain
//!
//! The pure business-logic layer of the STAC metadata pipeline engine. This
//! crate is independent of concrete I/O: no HTTP client, no database, no
//! filesystem access beyond the small async-trait contracts the stage
//! protocols name (implemented in the infrastructure layer of the
//! `stac_pipeline` crate).
//!
//! ## Module Structure
//!
//! - [`error`] - the three-tier [`error::EngineError`] / [`error::ErrorKind`]
//!   model (Configuration / DataProcessing / Unexpected).
//! - [`value_objects`] - [`value_objects::WorkflowId`], [`value_objects::StepId`],
//!   and [`value_objects::FieldPath`] (the dotted-path-with-quoted-segments
//!   parser).
//! - [`entities`] - [`entities::Workflow`]/[`entities::Step`] (the parsed,
//!   immutable workflow model), [`entities::ExecutionContext`] (the per-run
//!   value object with fork semantics), and [`entities::FailureRecord`].
//! - [`repositories`] - the [`repositories::FailureCollector`] and
//!   [`repositories::CheckpointManager`] ports, implemented in the
//!   infrastructure layer.
//! - [`services`] - the [`services::Source`]/[`services::Processor`]/
//!   [`services::Sink`] stage protocols, and the field/geometry free
//!   functions (`services::field_ops`, `services::geometry`) shared by
//!   every concrete stage.
//!
//! ## Design Note: Items Are Plain JSON
//!
//! This domain layer deliberately does *not* model a STAC Item as a typed
//! struct (contrast with library crates like `stac-rs`/`rustac`). Items flow
//! through the engine as `serde_json::Map<String, serde_json::Value>` so the
//! wire format between stages never needs re-serializing and polyglot STAC
//! extensions never need a dedicated Rust type.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::{ExecutionContext, FailureRecord, Step, Workflow};
pub use error::{EngineError, ErrorKind};
pub use value_objects::{FieldPath, PathError, StepId, WorkflowId};
