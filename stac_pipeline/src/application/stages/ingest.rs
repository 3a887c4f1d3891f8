// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ingest Source
//!
//! Bulk item retrieval from the local filesystem or a STAC API (spec.md
//! §4.5).
//!
//! API-mode pagination is resolved eagerly, inside `fetch`, rather than
//! lazily as the returned stream is polled: there is no async-generator
//! primitive in this workspace's dependency set (the teacher has no
//! equivalent need), so every page is fetched up front and the result is
//! wrapped in `stream::iter`. Single-pipeline ordering is unaffected, since
//! `fetch` is itself the one suspension point a Source may use before the
//! stream starts.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use stac_pipeline_domain::entities::{ExecutionContext, FailureContext, FailureRecord, LoggerName};
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::services::{Item, ItemStream, Source};

use crate::infrastructure::item_io;
use crate::infrastructure::stac_client::{SearchParams, StacClient};

#[derive(Debug, Clone, Deserialize)]
struct IngestConfig {
    source: String,
    #[serde(default)]
    collections: Option<Vec<String>>,
    #[serde(default)]
    bbox: Option<Vec<f64>>,
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    query: Option<Value>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    max_items: Option<usize>,
    #[serde(default)]
    strict: bool,
}

pub struct Ingest {
    config: IngestConfig,
    logger: Option<LoggerName>,
}

impl Ingest {
    pub fn new(config: &Value) -> Result<Self, EngineError> {
        let config: IngestConfig =
            serde_json::from_value(config.clone()).map_err(|e| EngineError::invalid_config(e.to_string()))?;
        Ok(Self { config, logger: None })
    }

    fn logger(&self) -> &LoggerName {
        self.logger.as_ref().expect("set_logger called before fetch")
    }

    fn is_api_source(&self) -> bool {
        self.config.source.starts_with("http://") || self.config.source.starts_with("https://")
    }

    async fn fetch_from_file(&self) -> Result<Vec<Item>, EngineError> {
        let path = std::path::Path::new(&self.config.source);
        let metadata = tokio::fs::metadata(path).await?;

        let mut items = if metadata.is_dir() {
            item_io::read_directory(path).await?
        } else if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
            item_io::read_parquet_file(path).await?
        } else {
            item_io::read_json_file(path).await?
        };

        if let Some(max_items) = self.config.max_items {
            items.truncate(max_items);
        }
        Ok(items)
    }

    fn search_params(&self, context: &ExecutionContext) -> SearchParams {
        let mut params = SearchParams {
            collections: self.config.collections.clone(),
            bbox: self.config.bbox.clone(),
            datetime: self.config.datetime.clone(),
            query: self.config.query.clone(),
            limit: self.config.limit,
        };
        if let Some(collections) = context.data.get("collections").and_then(Value::as_array) {
            params.collections = Some(
                collections
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            );
        }
        if let Some(bbox) = context.data.get("bbox").and_then(Value::as_array) {
            params.bbox = Some(bbox.iter().filter_map(Value::as_f64).collect());
        }
        if let Some(datetime) = context.data.get("datetime").and_then(Value::as_str) {
            params.datetime = Some(datetime.to_string());
        }
        if let Some(query) = context.data.get("query") {
            params.query = Some(query.clone());
        }
        if let Some(limit) = context.data.get("limit").and_then(Value::as_u64) {
            params.limit = Some(limit as u32);
        }
        params
    }

    async fn fetch_from_api(&self, context: &ExecutionContext) -> Result<Vec<Item>, EngineError> {
        let client = StacClient::new(self.config.source.clone());
        let params = self.search_params(context);
        let max_items = self.config.max_items.unwrap_or(usize::MAX);

        let mut items = Vec::new();
        let mut page = match client.search(&params).await {
            Ok(page) => page,
            Err(err) => return self.handle_api_error(err, context).await,
        };

        loop {
            items.extend(page.items);
            if items.len() >= max_items {
                items.truncate(max_items);
                break;
            }
            let Some(next) = page.next.clone() else {
                break;
            };
            page = match client.next_page(&next).await {
                Ok(page) => page,
                Err(err) => return self.handle_api_error_with(items, err, context).await,
            };
        }
        Ok(items)
    }

    async fn handle_api_error(&self, err: EngineError, context: &ExecutionContext) -> Result<Vec<Item>, EngineError> {
        self.handle_api_error_with(Vec::new(), err, context).await
    }

    async fn handle_api_error_with(
        &self,
        partial: Vec<Item>,
        err: EngineError,
        context: &ExecutionContext,
    ) -> Result<Vec<Item>, EngineError> {
        if self.config.strict {
            return Err(err);
        }
        let (status, message) = match &err {
            EngineError::HttpError { status, message } => (*status, message.clone()),
            other => (None, other.to_string()),
        };
        context
            .failure_collector
            .record(FailureRecord::new("ingest", None, "data_processing", message).with_context(FailureContext {
                url: Some(self.config.source.clone()),
                http_status: status,
                ..Default::default()
            }))
            .await;
        tracing::warn!("{}: ingest API error, terminating stream gracefully", self.logger().as_str());
        Ok(partial)
    }
}

#[async_trait]
impl Source for Ingest {
    fn set_logger(&mut self, logger: LoggerName) {
        self.logger = Some(logger);
    }

    async fn fetch(&self, context: &ExecutionContext) -> Result<ItemStream, EngineError> {
        let items = if self.is_api_source() {
            self.fetch_from_api(context).await?
        } else {
            self.fetch_from_file().await?
        };
        tracing::info!("{}: ingested {} items", self.logger().as_str(), items.len());
        Ok(stream::iter(items.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stac_pipeline_domain::entities::{CheckpointSettings, LoggingSettings, Workflow, WorkflowSettings};
    use stac_pipeline_domain::repositories::{CheckpointManager, CheckpointSnapshot, FailureCollector};
    use stac_pipeline_domain::value_objects::WorkflowId;
    use std::sync::Arc;

    struct NoopFailureCollector;
    #[async_trait]
    impl FailureCollector for NoopFailureCollector {
        async fn record(&self, _failure: FailureRecord) {}
        async fn all(&self) -> Vec<FailureRecord> {
            Vec::new()
        }
    }

    struct NoopCheckpointManager;
    #[async_trait]
    impl CheckpointManager for NoopCheckpointManager {
        async fn load(&self) -> Result<CheckpointSnapshot, EngineError> {
            Ok(CheckpointSnapshot::default())
        }
        async fn mark_complete(&self, _step_id: &str) -> Result<(), EngineError> {
            Ok(())
        }
        async fn save_cursor(&self, _step_id: &str, _cursor: Value) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(
            WorkflowId::new("run-1").unwrap(),
            Arc::new(Workflow {
                name: "test".into(),
                settings: WorkflowSettings {
                    logging: LoggingSettings::default(),
                    variables: Default::default(),
                    checkpoint: CheckpointSettings::default(),
                },
                steps: Vec::new(),
            }),
            Arc::new(NoopFailureCollector),
            Arc::new(NoopCheckpointManager),
        )
    }

    #[tokio::test]
    async fn reads_items_from_a_json_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        tokio::fs::write(&path, serde_json::to_vec(&json!([{"id": "a"}, {"id": "b"}])).unwrap())
            .await
            .unwrap();

        let mut ingest = Ingest::new(&json!({"source": path.to_str().unwrap()})).unwrap();
        ingest.set_logger(LoggerName::root("test"));
        let items: Vec<_> = ingest.fetch(&context()).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn max_items_caps_file_mode_regardless_of_source_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        tokio::fs::write(&path, serde_json::to_vec(&json!([{"id": "a"}, {"id": "b"}, {"id": "c"}])).unwrap())
            .await
            .unwrap();

        let mut ingest = Ingest::new(&json!({"source": path.to_str().unwrap(), "max_items": 2})).unwrap();
        ingest.set_logger(LoggerName::root("test"));
        let items: Vec<_> = ingest.fetch(&context()).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn api_source_is_detected_by_scheme() {
        let ingest = Ingest::new(&json!({"source": "https://example.test/stac"})).unwrap();
        assert!(ingest.is_api_source());
        let ingest = Ingest::new(&json!({"source": "/tmp/items.json"})).unwrap();
        assert!(!ingest.is_api_source());
    }
}
