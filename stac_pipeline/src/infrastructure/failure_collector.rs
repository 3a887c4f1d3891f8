// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Failure Collector
//!
//! Append-only diagnostic log shared by every pipeline in a workflow run
//! (spec.md §3, §5). A single `tokio::sync::Mutex<Vec<_>>` gives
//! append-linearizability across concurrent matrix-sibling pipelines and
//! preserves each pipeline's relative append order, since every `record`
//! call pushes while holding the lock.

use async_trait::async_trait;
use stac_pipeline_domain::entities::FailureRecord;
use stac_pipeline_domain::repositories::FailureCollector;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct InMemoryFailureCollector {
    records: Mutex<Vec<FailureRecord>>,
}

impl InMemoryFailureCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FailureCollector for InMemoryFailureCollector {
    async fn record(&self, failure: FailureRecord) {
        self.records.lock().await.push(failure);
    }

    async fn all(&self) -> Vec<FailureRecord> {
        self.records.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_preserve_append_order() {
        let collector = InMemoryFailureCollector::new();
        collector
            .record(FailureRecord::new("validate", Some("i1".into()), "data_processing", "a"))
            .await;
        collector
            .record(FailureRecord::new("validate", Some("i2".into()), "data_processing", "b"))
            .await;

        let all = collector.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].item_id.as_deref(), Some("i1"));
        assert_eq!(all[1].item_id.as_deref(), Some("i2"));
    }

    #[tokio::test]
    async fn filters_by_step_id() {
        let collector = InMemoryFailureCollector::new();
        collector
            .record(FailureRecord::new("validate", None, "data_processing", "a"))
            .await;
        collector
            .record(FailureRecord::new("ingest", None, "data_processing", "b"))
            .await;

        let validate_only = collector.failures_in_step("validate").await;
        assert_eq!(validate_only.len(), 1);
    }
}
