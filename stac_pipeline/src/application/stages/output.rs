// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Output Sink
//!
//! Persists items to disk as individual JSON files or Parquet batches
//! (spec.md §4.10). `Sink::bundle`/`finalize` take `&self`, so the buffer
//! lives behind a `tokio::sync::Mutex`, the same interior-mutability pattern
//! used by the in-memory failure collector.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use stac_pipeline_domain::entities::{ExecutionContext, LoggerName};
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::services::{Item, Sink};
use tokio::sync::Mutex;

use crate::infrastructure::item_io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
enum Format {
    #[default]
    Json,
    Parquet,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputConfig {
    base_dir: String,
    #[serde(default)]
    format: Format,
    #[serde(default = "default_buffer_size")]
    buffer_size: usize,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    include_collection: bool,
}

fn default_buffer_size() -> usize {
    100
}

pub struct Output {
    config: OutputConfig,
    buffer: Mutex<Vec<Item>>,
    items_written: Mutex<usize>,
    logger: Option<LoggerName>,
}

impl Output {
    pub fn new(config: &Value) -> Result<Self, EngineError> {
        let config: OutputConfig =
            serde_json::from_value(config.clone()).map_err(|e| EngineError::invalid_config(e.to_string()))?;
        Ok(Self {
            config,
            buffer: Mutex::new(Vec::new()),
            items_written: Mutex::new(0),
            logger: None,
        })
    }

    fn logger(&self) -> &LoggerName {
        self.logger.as_ref().expect("set_logger called before bundle")
    }

    fn rewrite_self_link(&self, item: &mut Item) {
        let Some(base_url) = &self.config.base_url else {
            return;
        };
        let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string) else {
            return;
        };
        let Some(links) = item.get_mut("links").and_then(Value::as_array_mut) else {
            return;
        };
        for link in links.iter_mut() {
            if link.get("rel").and_then(Value::as_str) == Some("self") {
                link["href"] = Value::String(format!("{}/{}.json", base_url.trim_end_matches('/'), id));
            }
        }
    }

    async fn flush(&self) -> Result<(), EngineError> {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut *buffer);
        drop(buffer);

        let count = batch.len();
        match self.config.format {
            Format::Json => {
                for item in &batch {
                    let id = item
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| "unknown".to_string());
                    item_io::write_json_item(self.base_dir(), &id, item).await?;
                }
            }
            Format::Parquet => {
                let suffix = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true).replace(':', "");
                item_io::write_parquet_batch(self.base_dir(), &suffix, &batch).await?;
            }
        }

        *self.items_written.lock().await += count;
        tracing::info!("{}: flushed {} items as {:?}", self.logger().as_str(), count, self.config.format);
        Ok(())
    }

    fn base_dir(&self) -> &std::path::Path {
        std::path::Path::new(&self.config.base_dir)
    }
}

#[async_trait]
impl Sink for Output {
    fn set_logger(&mut self, logger: LoggerName) {
        self.logger = Some(logger);
    }

    async fn bundle(&self, item: Item, _context: &ExecutionContext) -> Result<(), EngineError> {
        let mut item = item;
        self.rewrite_self_link(&mut item);

        let should_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(item);
            buffer.len() >= self.config.buffer_size
        };
        if should_flush {
            self.flush().await?;
        }
        Ok(())
    }

    async fn finalize(&self, context: &ExecutionContext) -> Result<Value, EngineError> {
        self.flush().await?;

        if self.config.include_collection {
            if let Some(collection) = context.data.get("collection") {
                let path = self.base_dir().join("collection.json");
                let tmp_path = self.base_dir().join("collection.json.tmp");
                tokio::fs::create_dir_all(self.base_dir()).await?;
                let bytes = serde_json::to_vec_pretty(collection)?;
                if let Err(err) = tokio::fs::write(&tmp_path, &bytes).await {
                    let _ = tokio::fs::remove_file(&tmp_path).await;
                    return Err(err.into());
                }
                if let Err(err) = tokio::fs::rename(&tmp_path, &path).await {
                    let _ = tokio::fs::remove_file(&tmp_path).await;
                    return Err(err.into());
                }
            }
        }

        let items_written = *self.items_written.lock().await;
        let format = match self.config.format {
            Format::Json => "json",
            Format::Parquet => "parquet",
        };
        Ok(json!({
            "items_written": items_written,
            "format": format,
            "output_dir": self.config.base_dir,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use stac_pipeline_domain::entities::{CheckpointSettings, FailureRecord, LoggingSettings, Workflow, WorkflowSettings};
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
    async fn bundles_below_threshold_are_not_flushed_until_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = Output::new(&json!({
            "base_dir": dir.path().to_str().unwrap(),
            "buffer_size": 10,
        }))
        .unwrap();
        output.set_logger(LoggerName::root("test"));

        let mut item = Map::new();
        item.insert("id".into(), json!("a"));
        output.bundle(item, &context()).await.unwrap();
        assert!(!dir.path().join("a.json").exists());

        let manifest = output.finalize(&context()).await.unwrap();
        assert_eq!(manifest["items_written"], json!(1));
        assert!(dir.path().join("a.json").exists());
    }

    #[tokio::test]
    async fn buffer_flushes_automatically_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = Output::new(&json!({
            "base_dir": dir.path().to_str().unwrap(),
            "buffer_size": 2,
        }))
        .unwrap();
        output.set_logger(LoggerName::root("test"));

        for id in ["a", "b"] {
            let mut item = Map::new();
            item.insert("id".into(), json!(id));
            output.bundle(item, &context()).await.unwrap();
        }
        assert!(dir.path().join("a.json").exists());
        assert!(dir.path().join("b.json").exists());
    }

    #[tokio::test]
    async fn base_url_rewrites_the_self_link() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = Output::new(&json!({
            "base_dir": dir.path().to_str().unwrap(),
            "base_url": "https://example.test/items",
            "buffer_size": 1,
        }))
        .unwrap();
        output.set_logger(LoggerName::root("test"));

        let mut item = Map::new();
        item.insert("id".into(), json!("a"));
        item.insert("links".into(), json!([{"rel": "self", "href": "old"}]));
        output.bundle(item, &context()).await.unwrap();

        let written: Value = serde_json::from_slice(&tokio::fs::read(dir.path().join("a.json")).await.unwrap()).unwrap();
        assert_eq!(written["links"][0]["href"], json!("https://example.test/items/a.json"));
    }

    #[tokio::test]
    async fn include_collection_writes_collection_json_at_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = Output::new(&json!({
            "base_dir": dir.path().to_str().unwrap(),
            "include_collection": true,
        }))
        .unwrap();
        output.set_logger(LoggerName::root("test"));

        let mut ctx = context();
        ctx.data.insert("collection".to_string(), json!({"id": "landsat"}));
        output.finalize(&ctx).await.unwrap();

        assert!(dir.path().join("collection.json").exists());
    }
}
