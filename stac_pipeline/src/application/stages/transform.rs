// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transform Processor
//!
//! Enriches items from a sidecar file via declarative, wildcard-expanded
//! field mapping (spec.md §4.9). The sidecar is indexed by item id once at
//! construction; `modify` only ever reads the index.
//!
//! Target paths in `field_mapping` are expanded against the *item*: the
//! wildcard vocabulary is whatever keys the item already has at that
//! position (e.g. `assets.*.cid` only visits asset keys the item already
//! declares), so a sidecar record key the item doesn't have is never
//! produced as a target path. Source expressions are substituted for
//! `{asset_key}`/`{item_id}`/`{collection_id}` placeholders and then always
//! evaluated as a JMESPath query against the *matched record*. This uses a
//! plain `.`-split tokenizer rather than `FieldPath`'s quoted-segment one,
//! since target paths here are configuration, not arbitrary item keys.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use stac_pipeline_domain::entities::{ExecutionContext, LoggerName};
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::services::field_ops::{get, jmespath, set, substitute_template};
use stac_pipeline_domain::services::{Item, Modified, Processor};
use stac_pipeline_domain::value_objects::FieldPath;
use std::collections::HashMap;
use std::path::Path;

use crate::infrastructure::item_io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
enum Strategy {
    #[default]
    UpdateExisting,
    Merge,
}

#[derive(Debug, Clone, Deserialize)]
struct TransformConfig {
    input_file: String,
    #[serde(default)]
    input_join_key: Option<String>,
    #[serde(default)]
    data_path: Option<String>,
    field_mapping: Map<String, Value>,
    #[serde(default)]
    strategy: Strategy,
}

pub struct Transform {
    config: TransformConfig,
    index: HashMap<String, Item>,
    logger: Option<LoggerName>,
}

impl Transform {
    pub async fn new(config: &Value) -> Result<Self, EngineError> {
        let config: TransformConfig =
            serde_json::from_value(config.clone()).map_err(|e| EngineError::invalid_config(e.to_string()))?;
        let index = load_index(&config).await?;
        Ok(Self {
            config,
            index,
            logger: None,
        })
    }

    fn logger(&self) -> &LoggerName {
        self.logger.as_ref().expect("set_logger called before modify")
    }
}

async fn load_index(config: &TransformConfig) -> Result<HashMap<String, Item>, EngineError> {
    let path = Path::new(&config.input_file);
    let join_key = config.input_join_key.as_deref().unwrap_or("id");

    let raw: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => Value::Array(read_csv_records(path).await?.into_iter().map(Value::Object).collect()),
        Some("parquet") => Value::Array(
            item_io::read_parquet_records(path)
                .await?
                .into_iter()
                .map(Value::Object)
                .collect(),
        ),
        _ => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|_| EngineError::invalid_config(format!("transform input_file not found: {}", config.input_file)))?;
            serde_json::from_slice(&bytes)?
        }
    };

    let scoped = match &config.data_path {
        Some(query) => jmespath(&raw, query)?,
        None => raw,
    };

    build_index(&scoped, join_key)
}

async fn read_csv_records(path: &Path) -> Result<Vec<Item>, EngineError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| EngineError::invalid_config(format!("transform input_file not found: {}", path.display())))?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader
        .headers()
        .map_err(|e| EngineError::invalid_config(e.to_string()))?
        .clone();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| EngineError::invalid_config(e.to_string()))?;
        let mut map = Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            map.insert(header.to_string(), Value::String(field.to_string()));
        }
        records.push(map);
    }
    Ok(records)
}

/// A JSON object keys records by item id directly; a JSON array extracts the
/// id from each entry via `join_key` (a JMESPath expression).
fn build_index(value: &Value, join_key: &str) -> Result<HashMap<String, Item>, EngineError> {
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .filter_map(|(id, record)| record.as_object().map(|record| (id.clone(), record.clone())))
            .collect()),
        Value::Array(records) => {
            let mut index = HashMap::with_capacity(records.len());
            for record in records {
                let Some(record_map) = record.as_object() else {
                    continue;
                };
                let id = jmespath(record, join_key).ok().and_then(|v| v.as_str().map(str::to_string));
                if let Some(id) = id {
                    index.insert(id, record_map.clone());
                }
            }
            Ok(index)
        }
        other => Err(EngineError::invalid_config(format!(
            "transform input must be a JSON object or array, found {other}"
        ))),
    }
}

/// Expands wildcarded target paths in `field_mapping` against `item`,
/// returning `(target_path, anchor_path, wildcard_bindings,
/// source_expression)` tuples. `anchor_path` is the path through the
/// wildcard-substituted key itself (e.g. `assets.blue`, not
/// `assets.blue.cid`); `update_existing` checks presence at `anchor_path`
/// rather than `target_path`, since the leaf segment is often exactly the
/// field being newly written.
fn expand_target_paths(
    field_mapping: &Map<String, Value>,
    item: &Value,
) -> Result<Vec<(FieldPath, FieldPath, HashMap<String, String>, String)>, EngineError> {
    let mut expanded = Vec::new();

    for (raw_path, raw_expression) in field_mapping {
        let Some(source_expression) = raw_expression.as_str() else {
            continue;
        };

        let segments: Vec<String> = raw_path.split('.').map(str::to_string).collect();
        let wildcard_positions: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.as_str() == "*")
            .map(|(i, _)| i)
            .collect();
        if wildcard_positions.len() > 1 {
            return Err(EngineError::invalid_config(format!(
                "ambiguous pattern, multiple wildcards in one key: {raw_path}"
            )));
        }

        let Some(&wildcard_idx) = wildcard_positions.first() else {
            let path = FieldPath::from_segments(segments.clone())
                .map_err(|e| EngineError::invalid_config(e.to_string()))?;
            expanded.push((path.clone(), path, HashMap::new(), source_expression.to_string()));
            continue;
        };

        let parent_segment = wildcard_idx.checked_sub(1).and_then(|i| segments.get(i));
        let binding_name = if parent_segment.map(String::as_str) == Some("assets") {
            "asset_key".to_string()
        } else {
            format!("key_{wildcard_idx}")
        };

        let parent_path = &segments[..wildcard_idx];
        let mut cursor = item;
        let mut found = true;
        for segment in parent_path {
            match cursor.as_object().and_then(|m| m.get(segment)) {
                Some(next) => cursor = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if !found {
            continue;
        }
        let Some(parent_map) = cursor.as_object() else {
            continue;
        };

        for key in parent_map.keys() {
            let mut concrete = segments.clone();
            concrete[wildcard_idx] = key.clone();
            let path = FieldPath::from_segments(concrete.clone())
                .map_err(|e| EngineError::invalid_config(e.to_string()))?;
            let anchor = FieldPath::from_segments(concrete[..=wildcard_idx].to_vec())
                .map_err(|e| EngineError::invalid_config(e.to_string()))?;
            let mut bindings = HashMap::new();
            bindings.insert(binding_name.clone(), key.clone());
            expanded.push((path, anchor, bindings, source_expression.to_string()));
        }
    }

    Ok(expanded)
}

#[async_trait]
impl Processor for Transform {
    fn set_logger(&mut self, logger: LoggerName) {
        self.logger = Some(logger);
    }

    async fn modify(&self, item: Item, _context: &ExecutionContext) -> Result<Modified, EngineError> {
        let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string) else {
            return Ok(Modified::Kept(item));
        };
        let Some(record) = self.index.get(&id) else {
            return Ok(Modified::Kept(item));
        };
        let record = Value::Object(record.clone());

        let collection_id = item.get("collection").and_then(Value::as_str).map(str::to_string);
        let mut value = Value::Object(item);
        let expanded = expand_target_paths(&self.config.field_mapping, &value)?;

        let mut writes = 0usize;

        for (path, anchor, mut bindings, source_expression) in expanded {
            bindings.insert("item_id".to_string(), id.clone());
            if let Some(collection_id) = &collection_id {
                bindings.insert("collection_id".to_string(), collection_id.clone());
            }

            let query = substitute_template(&source_expression, &bindings);
            let source_value = match jmespath(&record, &query) {
                Ok(v) => v,
                Err(err) => {
                    tracing::debug!(
                        "{}: transform query failed for {}: {}",
                        self.logger().as_str(),
                        path,
                        err
                    );
                    continue;
                }
            };

            if self.config.strategy == Strategy::UpdateExisting {
                let exists = get(&value, &anchor, None).map(|v| !v.is_null()).unwrap_or(false);
                if !exists {
                    continue;
                }
            }

            // The anchor already exists by this point (checked above, or
            // the strategy is `merge`), so this only ever creates the leaf
            // segment being written, never a new wildcard-matched branch.
            match set(&mut value, &path, source_value, true) {
                Ok(()) => {
                    writes += 1;
                    tracing::debug!("{}: transform wrote {}", self.logger().as_str(), path);
                }
                Err(err) => {
                    tracing::debug!("{}: transform could not write {}: {}", self.logger().as_str(), path, err);
                }
            }
        }

        tracing::info!(
            "{}: transform applied {} field writes to {}",
            self.logger().as_str(),
            writes,
            id
        );

        let item = match value {
            Value::Object(map) => map,
            _ => Item::new(),
        };
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
    use stac_pipeline_domain::entities::FailureRecord;
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

    fn transform_with(index: HashMap<String, Item>, mapping: Map<String, Value>, strategy: Strategy) -> Transform {
        Transform {
            config: TransformConfig {
                input_file: String::new(),
                input_join_key: None,
                data_path: None,
                field_mapping: mapping,
                strategy,
            },
            index,
            logger: Some(LoggerName::root("test")),
        }
    }

    #[tokio::test]
    async fn items_absent_from_the_index_pass_through_unchanged() {
        let transform = transform_with(HashMap::new(), Map::new(), Strategy::default());
        let mut item = Map::new();
        item.insert("id".into(), json!("i1"));
        let modified = transform.modify(item.clone(), &context()).await.unwrap();
        assert_eq!(modified.into_item().unwrap(), item);
    }

    #[tokio::test]
    async fn update_existing_only_writes_fields_already_present() {
        let mut record = Map::new();
        record.insert("cloud_cover".into(), json!(12.5));
        let mut index = HashMap::new();
        index.insert("i1".to_string(), record);

        let mut mapping = Map::new();
        mapping.insert("properties.eo:cloud_cover".into(), json!("cloud_cover"));
        mapping.insert("properties.missing_target".into(), json!("cloud_cover"));
        let transform = transform_with(index, mapping, Strategy::UpdateExisting);

        let mut item = Map::new();
        item.insert("id".into(), json!("i1"));
        item.insert("properties".into(), json!({"eo:cloud_cover": 0}));

        let modified = transform.modify(item, &context()).await.unwrap();
        let item = modified.into_item().unwrap();
        assert_eq!(item["properties"]["eo:cloud_cover"], json!(12.5));
        assert!(item["properties"].get("missing_target").is_none());
    }

    #[tokio::test]
    async fn merge_strategy_creates_missing_intermediate_paths() {
        let mut record = Map::new();
        record.insert("platform".into(), json!("landsat-9"));
        let mut index = HashMap::new();
        index.insert("i1".to_string(), record);

        let mut mapping = Map::new();
        mapping.insert("properties.platform".into(), json!("platform"));
        let transform = transform_with(index, mapping, Strategy::Merge);

        let mut item = Map::new();
        item.insert("id".into(), json!("i1"));

        let modified = transform.modify(item, &context()).await.unwrap();
        let item = modified.into_item().unwrap();
        assert_eq!(item["properties"]["platform"], json!("landsat-9"));
    }

    #[tokio::test]
    async fn wildcard_targets_expand_over_the_items_existing_asset_keys() {
        let mut record = Map::new();
        record.insert(
            "assets".into(),
            json!({"blue": {"cid": "X"}, "green": {"cid": "Y"}, "red": {"cid": "Z"}}),
        );
        let mut index = HashMap::new();
        index.insert("i1".to_string(), record);

        let mut mapping = Map::new();
        mapping.insert("assets.*.cid".into(), json!("assets.{asset_key}.cid"));
        let transform = transform_with(index, mapping, Strategy::UpdateExisting);

        let mut item = Map::new();
        item.insert("id".into(), json!("i1"));
        item.insert(
            "assets".into(),
            json!({"blue": {"href": "s3://blue.tif"}, "green": {"href": "s3://green.tif"}}),
        );

        let modified = transform.modify(item, &context()).await.unwrap();
        let item = modified.into_item().unwrap();
        assert_eq!(item["assets"]["blue"]["cid"], json!("X"));
        assert_eq!(item["assets"]["green"]["cid"], json!("Y"));
        assert!(item["assets"].get("red").is_none());
    }

    #[tokio::test]
    async fn merge_strategy_with_wildcard_writes_a_new_leaf_under_an_existing_asset() {
        let mut record = Map::new();
        record.insert(
            "assets".into(),
            json!({"blue": {"band_index": 1}, "green": {"band_index": 2}}),
        );
        let mut index = HashMap::new();
        index.insert("i1".to_string(), record);

        let mut mapping = Map::new();
        mapping.insert("assets.*.band_index".into(), json!("assets.{asset_key}.band_index"));
        let transform = transform_with(index, mapping, Strategy::Merge);

        let mut item = Map::new();
        item.insert("id".into(), json!("i1"));
        item.insert("assets".into(), json!({"blue": {"href": "a"}, "green": {"href": "b"}}));

        let modified = transform.modify(item, &context()).await.unwrap();
        let item = modified.into_item().unwrap();
        assert_eq!(item["assets"]["blue"]["band_index"], json!(1));
        assert_eq!(item["assets"]["green"]["band_index"], json!(2));
    }

    #[tokio::test]
    async fn a_dict_keyed_json_input_file_builds_the_index_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sidecar.json");
        tokio::fs::write(&path, serde_json::to_vec(&json!({"i1": {"platform": "landsat-9"}})).unwrap())
            .await
            .unwrap();

        let mut mapping = Map::new();
        mapping.insert("properties.platform".into(), json!("platform"));
        let transform = Transform::new(&json!({
            "input_file": path.to_str().unwrap(),
            "field_mapping": mapping,
            "strategy": "merge",
        }))
        .await
        .unwrap();

        assert_eq!(transform.index.get("i1").unwrap()["platform"], json!("landsat-9"));
    }
}
