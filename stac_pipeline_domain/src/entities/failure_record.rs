// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Failure Record
//!
//! An immutable, append-only diagnostic entry (spec.md §3). The
//! [`crate::repositories::FailureCollector`] never reorders or deduplicates
//! these; this type only carries data, it has no behavior of its own beyond
//! construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounded set of optional diagnostic keys a stage may attach to a failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FailureContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<u32>,
}

/// One entry in the failure report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureRecord {
    pub step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub error_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub context: FailureContext,
}

impl FailureRecord {
    pub fn new(
        step_id: impl Into<String>,
        item_id: Option<String>,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            item_id,
            error_type: error_type.into(),
            message: message.into(),
            timestamp: Utc::now(),
            context: FailureContext::default(),
        }
    }

    pub fn with_context(mut self, context: FailureContext) -> Self {
        self.context = context;
        self
    }
}
