// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Concrete Stages
//!
//! The seven stage-class implementations named by
//! [`stac_pipeline_domain::entities::StepModule`] (spec.md §4.4-§4.10):
//! [`seed::Seed`] and [`ingest::Ingest`] (`Source`), [`update::Update`],
//! [`validate::Validate`], [`extension::Extension`], [`transform::Transform`]
//! (`Processor`), and [`output::Output`] (`Sink`).

pub mod extension;
pub mod ingest;
pub mod output;
pub mod seed;
pub mod transform;
pub mod update;
pub mod validate;
