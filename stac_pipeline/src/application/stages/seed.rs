// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Seed Source
//!
//! Produces skeleton items from inline configuration or a JSON array file
//! (spec.md §4.4).

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use stac_pipeline_domain::entities::{ExecutionContext, FailureRecord, LoggerName};
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::services::field_ops::{deep_merge, MergeStrategy};
use stac_pipeline_domain::services::{Item, ItemStream, Source};

#[derive(Debug, Clone, Deserialize, Default)]
struct SeedConfig {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    source_file: Option<String>,
    #[serde(default)]
    defaults: Item,
}

pub struct Seed {
    config: SeedConfig,
    logger: Option<LoggerName>,
}

impl Seed {
    pub fn new(config: &Value) -> Result<Self, EngineError> {
        let config: SeedConfig =
            serde_json::from_value(config.clone()).map_err(|e| EngineError::invalid_config(e.to_string()))?;
        Ok(Self { config, logger: None })
    }

    fn logger(&self) -> &LoggerName {
        self.logger.as_ref().expect("set_logger called before fetch")
    }
}

#[async_trait]
impl Source for Seed {
    fn set_logger(&mut self, logger: LoggerName) {
        self.logger = Some(logger);
    }

    async fn fetch(&self, context: &ExecutionContext) -> Result<ItemStream, EngineError> {
        let mut raw_entries = Vec::new();
        if let Some(path) = &self.config.source_file {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|_| EngineError::invalid_config(format!("seed source_file not found: {path}")))?;
            let parsed: Value = serde_json::from_slice(&bytes)?;
            let array = parsed
                .as_array()
                .cloned()
                .ok_or_else(|| EngineError::invalid_config(format!("seed source_file {path} is not a JSON array")))?;
            raw_entries.extend(array);
        }
        raw_entries.extend(self.config.items.clone());

        if raw_entries.is_empty() {
            tracing::warn!("{}: seed produced zero items", self.logger().as_str());
        }

        let collection_id = context
            .data
            .get("collection_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut items = Vec::with_capacity(raw_entries.len());
        for entry in raw_entries {
            let normalized = match entry {
                Value::String(id) => {
                    let mut map = Map::new();
                    map.insert("id".to_string(), Value::String(id));
                    map
                }
                Value::Object(map) => map,
                other => {
                    context
                        .failure_collector
                        .record(FailureRecord::new(
                            "seed",
                            None,
                            "data_processing",
                            format!("seed entry is neither a string nor a mapping: {other}"),
                        ))
                        .await;
                    continue;
                }
            };

            let merged = deep_merge(
                &Value::Object(self.config.defaults.clone()),
                &Value::Object(normalized),
                MergeStrategy::Overwrite,
            );
            let mut item = match merged {
                Value::Object(map) => map,
                _ => unreachable!("deep_merge of two objects always returns an object"),
            };

            if !item.contains_key("collection") {
                if let Some(collection_id) = &collection_id {
                    item.insert("collection".to_string(), Value::String(collection_id.clone()));
                }
            }
            items.push(Ok(item));
        }

        Ok(stream::iter(items).boxed())
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
    async fn normalizes_string_entries_to_ids() {
        let mut seed = Seed::new(&json!({"items": ["a", "b"]})).unwrap();
        seed.set_logger(LoggerName::root("test"));
        let mut stream = seed.fetch(&context()).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.get("id"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn applies_defaults_under_each_entry() {
        let mut seed = Seed::new(&json!({
            "items": [{"id": "a"}],
            "defaults": {"properties": {"license": "CC-BY-4.0"}}
        }))
        .unwrap();
        seed.set_logger(LoggerName::root("test"));
        let mut stream = seed.fetch(&context()).await.unwrap();
        let item = stream.next().await.unwrap().unwrap();
        assert_eq!(item["properties"]["license"], json!("CC-BY-4.0"));
    }

    #[tokio::test]
    async fn populates_collection_from_context_when_absent() {
        let mut seed = Seed::new(&json!({"items": ["a"]})).unwrap();
        seed.set_logger(LoggerName::root("test"));
        let mut ctx = context();
        ctx.data.insert("collection_id".to_string(), json!("landsat"));
        let mut stream = seed.fetch(&ctx).await.unwrap();
        let item = stream.next().await.unwrap().unwrap();
        assert_eq!(item.get("collection"), Some(&json!("landsat")));
    }

    #[tokio::test]
    async fn non_string_non_mapping_entries_are_skipped() {
        let mut seed = Seed::new(&json!({"items": ["a", 42]})).unwrap();
        seed.set_logger(LoggerName::root("test"));
        let stream = seed.fetch(&context()).await.unwrap();
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 1);
    }
}
