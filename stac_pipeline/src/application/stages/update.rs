// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Update Processor
//!
//! Applies declarative field edits: removals, wildcard-expanded updates, an
//! optional per-item patch file, and an auto-updated timestamp (spec.md
//! §4.6).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use stac_pipeline_domain::entities::{ExecutionContext, FailureRecord, LoggerName};
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::services::field_ops::{expand_wildcards, remove, set};
use stac_pipeline_domain::services::{Item, Modified, Processor};
use stac_pipeline_domain::value_objects::FieldPath;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize, Default)]
struct UpdateConfig {
    #[serde(default)]
    updates: Map<String, Value>,
    #[serde(default)]
    removes: Vec<String>,
    #[serde(default)]
    patch_file: Option<String>,
    #[serde(default)]
    create_missing_paths: Option<bool>,
    #[serde(default)]
    auto_update_timestamp: Option<bool>,
}

impl UpdateConfig {
    fn create_missing_paths(&self) -> bool {
        self.create_missing_paths.unwrap_or(true)
    }

    fn auto_update_timestamp(&self) -> bool {
        self.auto_update_timestamp.unwrap_or(true)
    }
}

pub struct Update {
    config: UpdateConfig,
    patches: HashMap<String, Map<String, Value>>,
    logger: Option<LoggerName>,
}

impl Update {
    pub async fn new(config: &Value) -> Result<Self, EngineError> {
        let config: UpdateConfig =
            serde_json::from_value(config.clone()).map_err(|e| EngineError::invalid_config(e.to_string()))?;

        let patches = match &config.patch_file {
            Some(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|_| EngineError::invalid_config(format!("patch_file not found: {path}")))?;
                let parsed: Value = serde_json::from_slice(&bytes)?;
                let object = parsed
                    .as_object()
                    .ok_or_else(|| EngineError::invalid_config(format!("patch_file {path} is not a JSON object")))?;
                object
                    .iter()
                    .filter_map(|(id, patch)| patch.as_object().map(|p| (id.clone(), p.clone())))
                    .collect()
            }
            None => HashMap::new(),
        };

        Ok(Self {
            config,
            patches,
            logger: None,
        })
    }

    fn logger(&self) -> &LoggerName {
        self.logger.as_ref().expect("set_logger called before modify")
    }

    async fn apply_paths(&self, item: &mut Item, templates: &Map<String, Value>, context: &ExecutionContext) {
        let expanded = match expand_wildcards(templates, &Value::Object(item.clone()), &HashMap::new()) {
            Ok(expanded) => expanded,
            Err(err) => {
                self.record_failure(context, item.get("id"), err.to_string()).await;
                return;
            }
        };
        let mut value = Value::Object(item.clone());
        for (path, path_value) in expanded {
            if let Err(err) = set(&mut value, &path, path_value, self.config.create_missing_paths()) {
                self.record_failure(context, item.get("id"), err.to_string()).await;
                continue;
            }
        }
        if let Value::Object(map) = value {
            *item = map;
        }
    }

    async fn record_failure(&self, context: &ExecutionContext, item_id: Option<&Value>, message: String) {
        tracing::debug!("{}: {}", self.logger().as_str(), message);
        context
            .failure_collector
            .record(FailureRecord::new(
                "update",
                item_id.and_then(Value::as_str).map(str::to_string),
                "data_processing",
                message,
            ))
            .await;
    }
}

#[async_trait]
impl Processor for Update {
    fn set_logger(&mut self, logger: LoggerName) {
        self.logger = Some(logger);
    }

    async fn modify(&self, mut item: Item, context: &ExecutionContext) -> Result<Modified, EngineError> {
        for raw_path in &self.config.removes {
            if let Ok(path) = FieldPath::parse(raw_path) {
                let mut value = Value::Object(item);
                remove(&mut value, &path);
                item = match value {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
            }
        }

        self.apply_paths(&mut item, &self.config.updates, context).await;

        if let Some(id) = item.get("id").and_then(Value::as_str) {
            if let Some(patch) = self.patches.get(id).cloned() {
                self.apply_paths(&mut item, &patch, context).await;
            }
        }

        if self.config.auto_update_timestamp() {
            let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            let path = FieldPath::parse("properties.updated").expect("static path always parses");
            let mut value = Value::Object(item);
            let _ = set(&mut value, &path, Value::String(timestamp), true);
            item = match value {
                Value::Object(map) => map,
                _ => Map::new(),
            };
        }

        Ok(Modified::Kept(item))
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
    async fn removes_then_updates_then_stamps_timestamp() {
        let mut update = Update::new(&json!({
            "removes": ["properties.license"],
            "updates": {"properties.platform": "landsat-9"}
        }))
        .await
        .unwrap();
        update.set_logger(LoggerName::root("test"));

        let mut item = Map::new();
        item.insert("id".to_string(), json!("i1"));
        item.insert("properties".to_string(), json!({"license": "CC-BY-4.0"}));

        let modified = update.modify(item, &context()).await.unwrap();
        let item = modified.into_item().unwrap();
        assert!(item["properties"].get("license").is_none());
        assert_eq!(item["properties"]["platform"], json!("landsat-9"));
        assert!(item["properties"]["updated"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn auto_update_timestamp_can_be_disabled() {
        let mut update = Update::new(&json!({"auto_update_timestamp": false})).await.unwrap();
        update.set_logger(LoggerName::root("test"));

        let mut item = Map::new();
        item.insert("id".to_string(), json!("i1"));
        item.insert("properties".to_string(), json!({}));

        let modified = update.modify(item, &context()).await.unwrap();
        let item = modified.into_item().unwrap();
        assert!(item["properties"].get("updated").is_none());
    }

    #[tokio::test]
    async fn per_item_patch_file_is_applied_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patches.json");
        tokio::fs::write(
            &path,
            serde_json::to_vec(&json!({"i1": {"properties.reviewed": true}})).unwrap(),
        )
        .await
        .unwrap();

        let mut update = Update::new(&json!({"patch_file": path.to_str().unwrap()}))
            .await
            .unwrap();
        update.set_logger(LoggerName::root("test"));

        let mut item = Map::new();
        item.insert("id".to_string(), json!("i1"));
        item.insert("properties".to_string(), json!({}));

        let modified = update.modify(item, &context()).await.unwrap();
        let item = modified.into_item().unwrap();
        assert_eq!(item["properties"]["reviewed"], json!(true));
    }
}
