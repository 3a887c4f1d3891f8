// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error Module
//!
//! Structured error handling for the workflow engine. The engine recognizes
//! exactly three error kinds (see [`ErrorKind`]): configuration errors abort
//! workflow compilation before any item is processed, data-processing errors
//! are governed per-stage by a strict/collect policy, and unexpected errors
//! are always collected and always terminate the current pipeline.

mod engine_error;

pub use engine_error::{EngineError, ErrorKind};
