// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Repositories
//!
//! Persistence-abstraction ports the domain depends on but does not
//! implement: the [`FailureCollector`] (append-only diagnostic log) and the
//! [`CheckpointManager`] (resume-within-process state). Concrete
//! implementations (in-memory failure collector, file-backed checkpoint
//! sidecar) live in `stac_pipeline::infrastructure`.

mod checkpoint_manager;
mod failure_collector;

pub use checkpoint_manager::{CheckpointManager, CheckpointSnapshot};
pub use failure_collector::FailureCollector;
