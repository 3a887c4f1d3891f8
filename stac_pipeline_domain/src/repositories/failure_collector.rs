// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Failure Collector Port
//!
//! Append-only, concurrency-safe diagnostic log shared by every pipeline in
//! a workflow run (spec.md §3, §5). Sibling matrix pipelines append
//! concurrently; the collector must guarantee append-linearizability and
//! preserve each pipeline's relative append order, but defines no ordering
//! across pipelines.

use crate::entities::FailureRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Append-only failure log. Implementors must be safe to call from multiple
/// concurrently-running matrix-sibling pipelines.
#[async_trait]
pub trait FailureCollector: Send + Sync {
    /// Appends a failure record. Never reorders or deduplicates.
    async fn record(&self, failure: FailureRecord);

    /// Returns every failure recorded so far, in append order.
    async fn all(&self) -> Vec<FailureRecord>;

    /// Returns every failure recorded for a given step id, in append order.
    async fn failures_in_step(&self, step_id: &str) -> Vec<FailureRecord> {
        self.all()
            .await
            .into_iter()
            .filter(|f| f.step_id == step_id)
            .collect()
    }

    /// Count of recorded failures, for the end-of-run summary line.
    async fn len(&self) -> usize {
        self.all().await.len()
    }

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<T: FailureCollector + ?Sized> FailureCollector for Arc<T> {
    async fn record(&self, failure: FailureRecord) {
        (**self).record(failure).await
    }

    async fn all(&self) -> Vec<FailureRecord> {
        (**self).all().await
    }
}
