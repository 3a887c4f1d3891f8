// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow / Step Identifiers
//!
//! Type-safe string identifiers so a `WorkflowId` can never be passed where a
//! `StepId` is expected, and vice versa.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a workflow run; used in logger names and checkpoint files.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Result<Self, EngineError> {
        let id = id.into();
        if id.is_empty() {
            return Err(EngineError::invalid_config("workflow id cannot be empty"));
        }
        Ok(Self(id))
    }

    /// Generates a fresh id from a ULID, used when a workflow document
    /// doesn't pin its own run identifier.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a step within a workflow document; unique per `Workflow`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Result<Self, EngineError> {
        let id = id.into();
        if id.is_empty() {
            return Err(EngineError::invalid_config("step id cannot be empty"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the sibling id for a matrix-expanded step instance, e.g.
    /// `ingest` with coordinate `{collection: "A"}` becomes `ingest[collection=A]`.
    pub fn with_matrix_coordinate(&self, coordinate_suffix: &str) -> StepId {
        StepId(format!("{}[{}]", self.0, coordinate_suffix))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_ids() {
        assert!(WorkflowId::new("").is_err());
        assert!(StepId::new("").is_err());
    }

    #[test]
    fn matrix_coordinate_suffix_is_appended() {
        let step = StepId::new("ingest").unwrap();
        let sibling = step.with_matrix_coordinate("collection=A");
        assert_eq!(sibling.as_str(), "ingest[collection=A]");
    }

    #[test]
    fn generated_workflow_ids_are_unique() {
        assert_ne!(WorkflowId::generate(), WorkflowId::generate());
    }
}
