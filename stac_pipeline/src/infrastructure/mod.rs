// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Concrete implementations of the domain's ports and the I/O adapters the
//! concrete stages are built on. Nothing here is reachable from
//! `stac_pipeline_domain`; the dependency points one way, domain traits in,
//! concrete types out.
//!
//! - [`workflow_loader`] - parses a workflow document (YAML or JSON) into
//!   [`stac_pipeline_domain::entities::Workflow`], performing `${NAME}`
//!   variable substitution.
//! - [`checkpoint_manager`] - a file-backed [`stac_pipeline_domain::repositories::CheckpointManager`].
//! - [`failure_collector`] - an in-memory, concurrency-safe
//!   [`stac_pipeline_domain::repositories::FailureCollector`].
//! - [`stac_client`] - a `reqwest`-based STAC API client used by Ingest's API
//!   mode.
//! - [`item_io`] - JSON/Parquet file readers and writers shared by Ingest and
//!   Output.
//! - [`schema`] - a `jsonschema`-backed validator used by Validate and
//!   Extension, including the Extension template builder.

pub mod checkpoint_manager;
pub mod failure_collector;
pub mod item_io;
pub mod schema;
pub mod stac_client;
pub mod workflow_loader;

pub use checkpoint_manager::FileCheckpointManager;
pub use failure_collector::InMemoryFailureCollector;
