// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Model
//!
//! The parsed, immutable workflow document (spec.md §3, §6). Parsing itself
//! (YAML/JSON, `${NAME}` substitution) is an infrastructure concern that
//! lives in `stac_pipeline::infrastructure::workflow_loader`; this module
//! only defines the shape the loader produces and the workflow engine
//! consumes.

use crate::value_objects::StepId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The stage-class identifier named in a step's `module` key. A closed
/// variant (per DESIGN NOTES: "favor a closed variant over an open plugin
/// registry for the core") — external plugins can be added behind the same
/// `Source`/`Processor`/`Sink` contract once the core surface is stable, but
/// they are not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepModule {
    SeedModule,
    IngestModule,
    UpdateModule,
    ValidateModule,
    ExtensionModule,
    TransformModule,
    OutputModule,
}

impl StepModule {
    pub fn as_str(self) -> &'static str {
        match self {
            StepModule::SeedModule => "SeedModule",
            StepModule::IngestModule => "IngestModule",
            StepModule::UpdateModule => "UpdateModule",
            StepModule::ValidateModule => "ValidateModule",
            StepModule::ExtensionModule => "ExtensionModule",
            StepModule::TransformModule => "TransformModule",
            StepModule::OutputModule => "OutputModule",
        }
    }

    /// Whether this stage-class begins a new stream (a `Source`).
    pub fn is_source(self) -> bool {
        matches!(self, StepModule::SeedModule | StepModule::IngestModule)
    }

    /// Whether this stage-class terminates a stream (a `Sink`).
    pub fn is_sink(self) -> bool {
        matches!(self, StepModule::OutputModule)
    }

    /// Whether this stage-class transforms items one at a time (a
    /// `Processor`).
    pub fn is_processor(self) -> bool {
        !self.is_source() && !self.is_sink()
    }
}

/// A matrix specification: axis name -> sequence of coordinate values.
/// Stored as a `BTreeMap` so Cartesian-product expansion is deterministic
/// (axis order is the sort order of axis names) without an extra
/// ordered-map dependency.
pub type MatrixSpec = BTreeMap<String, Vec<serde_json::Value>>;

/// One step definition in a workflow document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub module: StepModule,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Step {
    /// The Cartesian product of this step's matrix axes, one coordinate map
    /// per sibling pipeline. Empty if the step has no matrix.
    pub fn matrix_coordinates(&self) -> Vec<BTreeMap<String, serde_json::Value>> {
        let Some(matrix) = &self.matrix else {
            return Vec::new();
        };
        let mut coordinates: Vec<BTreeMap<String, serde_json::Value>> =
            vec![BTreeMap::new()];
        for (axis, values) in matrix {
            let mut expanded = Vec::with_capacity(coordinates.len() * values.len());
            for coord in &coordinates {
                for value in values {
                    let mut next = coord.clone();
                    next.insert(axis.clone(), value.clone());
                    expanded.push(next);
                }
            }
            coordinates = expanded;
        }
        coordinates
    }
}

/// `DEBUG|INFO|WARNING|ERROR` per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevelSetting {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: LogLevelSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default = "default_output_format")]
    pub output_format: LogOutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_interval: Option<u32>,
}

fn default_log_level() -> LogLevelSetting {
    LogLevelSetting::Info
}

fn default_output_format() -> LogOutputFormat {
    LogOutputFormat::Text
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            output_format: default_output_format(),
            progress_interval: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub checkpoint: CheckpointSettings,
}

/// A compiled workflow document: immutable once parsed, per spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub settings: WorkflowSettings,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }
}
