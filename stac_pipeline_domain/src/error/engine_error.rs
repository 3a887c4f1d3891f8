// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Error System
//!
//! The three-tier error model: every failure the engine surfaces is either a
//! [`ErrorKind::Configuration`] (fatal, detected before any item is
//! processed), an [`ErrorKind::DataProcessing`] (item- or stage-scoped,
//! governed by the stage's `strict` flag), or an [`ErrorKind::Unexpected`]
//! (always collected, always terminates the current pipeline).

use thiserror::Error;

/// The three error kinds the workflow engine distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid workflow document, missing variable, unreachable schema,
    /// malformed sidecar. Detected at compile or stage-construction time.
    Configuration,
    /// Item-scoped or stage-scoped data anomaly. Behavior governed by the
    /// stage's `strict` flag.
    DataProcessing,
    /// Any other failure. Always collected with `error_type = "unexpected"`.
    Unexpected,
}

impl ErrorKind {
    /// The string used as `error_type` in a [`crate::entities::FailureRecord`].
    pub fn error_type(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::DataProcessing => "data_processing",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

/// Domain-specific errors for the workflow engine.
///
/// Each variant carries enough context to build a [`crate::entities::FailureRecord`]
/// and to decide, via [`EngineError::kind`], how the orchestrator should react.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unreachable schema {uri}: {reason}")]
    SchemaUnreachable { uri: String, reason: String },

    #[error("missing required variable: {0}")]
    MissingVariable(String),

    #[error("cyclic dependency detected among steps: {0}")]
    CyclicDependency(String),

    #[error("unknown step dependency: {0}")]
    UnknownDependency(String),

    #[error("path collision at {path}: expected a mapping")]
    PathCollision { path: String },

    #[error("path missing at {path}")]
    PathMissing { path: String },

    #[error("jmespath query error: {0}")]
    QueryError(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("http error ({status:?}): {message}")]
    HttpError {
        message: String,
        status: Option<u16>,
    },

    #[error("io error: {0}")]
    IoError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    InternalError(String),

    /// Wraps an error raised by a Processor whose failure only surfaces
    /// later, when a downstream stage drains the lazily-composed item
    /// stream (spec.md §5's pull-based pipeline). Carries the step and item
    /// that actually raised it, so the engine can attribute the resulting
    /// [`crate::entities::FailureRecord`] correctly instead of blaming
    /// whichever stage happened to be pulling when the error surfaced.
    #[error("{source}")]
    Attributed {
        step_id: String,
        item_id: Option<String>,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Creates a new invalid-configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new path-collision error.
    pub fn path_collision(path: impl Into<String>) -> Self {
        Self::PathCollision { path: path.into() }
    }

    /// Creates a new path-missing error.
    pub fn path_missing(path: impl Into<String>) -> Self {
        Self::PathMissing { path: path.into() }
    }

    /// Creates a new validation-failed error.
    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Creates a new internal error.
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Attributes `source` to the step and item that actually raised it.
    pub fn attributed(step_id: impl Into<String>, item_id: Option<String>, source: EngineError) -> Self {
        Self::Attributed {
            step_id: step_id.into(),
            item_id,
            source: Box::new(source),
        }
    }

    /// The step/item this error was attributed to, if the engine wrapped it
    /// via [`EngineError::attributed`] while draining a downstream stage's
    /// stream.
    pub fn attribution(&self) -> Option<(&str, Option<&str>)> {
        match self {
            EngineError::Attributed { step_id, item_id, .. } => Some((step_id.as_str(), item_id.as_deref())),
            _ => None,
        }
    }

    /// Returns the [`ErrorKind`] this error belongs to, for orchestrator
    /// strict/collect branching.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidConfiguration(_)
            | EngineError::SchemaUnreachable { .. }
            | EngineError::MissingVariable(_)
            | EngineError::CyclicDependency(_)
            | EngineError::UnknownDependency(_) => ErrorKind::Configuration,

            EngineError::PathCollision { .. }
            | EngineError::PathMissing { .. }
            | EngineError::QueryError(_)
            | EngineError::ValidationFailed(_)
            | EngineError::HttpError { .. } => ErrorKind::DataProcessing,

            EngineError::IoError(_)
            | EngineError::SerializationError(_)
            | EngineError::Cancelled(_)
            | EngineError::InternalError(_) => ErrorKind::Unexpected,

            EngineError::Attributed { source, .. } => source.kind(),
        }
    }

    /// Short category tag, useful for metrics/log fields.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::InvalidConfiguration(_) => "configuration",
            EngineError::SchemaUnreachable { .. } => "schema",
            EngineError::MissingVariable(_) => "variable",
            EngineError::CyclicDependency(_) => "dag",
            EngineError::UnknownDependency(_) => "dag",
            EngineError::PathCollision { .. } => "path",
            EngineError::PathMissing { .. } => "path",
            EngineError::QueryError(_) => "query",
            EngineError::ValidationFailed(_) => "validation",
            EngineError::HttpError { .. } => "http",
            EngineError::IoError(_) => "io",
            EngineError::SerializationError(_) => "serialization",
            EngineError::Cancelled(_) => "cancellation",
            EngineError::InternalError(_) => "internal",
            EngineError::Attributed { source, .. } => source.category(),
        }
    }

    /// Whether a caller may reasonably retry the operation that raised this.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::HttpError { .. } | EngineError::IoError(_)
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}

// NOTE: YAML error conversion lives in the infrastructure crate (the
// workflow-document loader), same rationale the teacher used for keeping
// TOML/YAML conversions out of the domain: serialization format choice is
// an infrastructure concern.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified_correctly() {
        assert_eq!(
            EngineError::invalid_config("bad").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            EngineError::MissingVariable("X".into()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn data_processing_errors_are_classified_correctly() {
        assert_eq!(
            EngineError::path_collision("a.b").kind(),
            ErrorKind::DataProcessing
        );
        assert_eq!(
            EngineError::validation_failed("x").kind(),
            ErrorKind::DataProcessing
        );
    }

    #[test]
    fn unexpected_errors_are_classified_correctly() {
        assert_eq!(
            EngineError::internal_error("boom").kind(),
            ErrorKind::Unexpected
        );
    }

    #[test]
    fn error_type_strings_match_failure_record_convention() {
        assert_eq!(ErrorKind::Unexpected.error_type(), "unexpected");
        assert_eq!(ErrorKind::DataProcessing.error_type(), "data_processing");
        assert_eq!(ErrorKind::Configuration.error_type(), "configuration");
    }

    #[test]
    fn io_errors_are_recoverable() {
        let err: EngineError = std::io::Error::new(std::io::ErrorKind::Other, "x").into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn attributed_errors_expose_the_originating_step_and_item() {
        let err = EngineError::attributed("validate", Some("i1".into()), EngineError::validation_failed("bad item"));
        assert_eq!(err.attribution(), Some(("validate", Some("i1"))));
        assert_eq!(err.kind(), ErrorKind::DataProcessing);
    }

    #[test]
    fn unattributed_errors_have_no_attribution() {
        assert_eq!(EngineError::validation_failed("bad item").attribution(), None);
    }
}
