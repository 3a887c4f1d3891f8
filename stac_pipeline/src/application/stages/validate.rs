// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Validate Processor
//!
//! Checks items against the STAC core schema, the statically-configured
//! `extension_schemas`, and whatever extensions the item itself declares
//! via `stac_extensions` (spec.md §4.7: "validate against core and
//! referenced schemas"). The static validator set is built once at
//! construction; item-declared schemas are fetched lazily on first sight of
//! their URI and cached for the rest of the run, since many items in a
//! collection typically share the same extensions.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use stac_pipeline_domain::entities::{ExecutionContext, FailureRecord, LoggerName};
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::services::{Item, Modified, Processor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::infrastructure::schema::{fetch_schema, SchemaValidator};

const CORE_SCHEMA_URI: &str = "https://schemas.stacspec.org/v1.0.0/item-spec/json-schema/item.json";

#[derive(Debug, Clone, Deserialize, Default)]
struct ValidateConfig {
    #[serde(default)]
    strict: bool,
    #[serde(default)]
    extension_schemas: Vec<String>,
}

pub struct Validate {
    config: ValidateConfig,
    validators: Vec<SchemaValidator>,
    client: reqwest::Client,
    extension_cache: Mutex<HashMap<String, Arc<SchemaValidator>>>,
    logger: Option<LoggerName>,
}

impl Validate {
    pub async fn new(config: &Value) -> Result<Self, EngineError> {
        let config: ValidateConfig =
            serde_json::from_value(config.clone()).map_err(|e| EngineError::invalid_config(e.to_string()))?;

        let client = reqwest::Client::new();
        let mut validators = Vec::with_capacity(1 + config.extension_schemas.len());
        let core_schema = fetch_schema(&client, CORE_SCHEMA_URI).await?;
        validators.push(SchemaValidator::compile(CORE_SCHEMA_URI, &core_schema)?);
        for uri in &config.extension_schemas {
            let schema = fetch_schema(&client, uri).await?;
            validators.push(SchemaValidator::compile(uri.clone(), &schema)?);
        }

        Ok(Self {
            config,
            validators,
            client,
            extension_cache: Mutex::new(HashMap::new()),
            logger: None,
        })
    }

    fn logger(&self) -> &LoggerName {
        self.logger.as_ref().expect("set_logger called before modify")
    }

    /// Fetches and compiles the schema at `uri`, reusing a prior compile for
    /// the same URI across items. Unlike the statically-configured
    /// `extension_schemas`, an unreachable item-declared schema isn't a
    /// `ConfigurationError` -- it isn't known until an item actually
    /// declares it -- so failure is surfaced as a validation message
    /// instead.
    async fn extension_validator(&self, uri: &str) -> Result<Arc<SchemaValidator>, EngineError> {
        if let Some(validator) = self.extension_cache.lock().await.get(uri) {
            return Ok(Arc::clone(validator));
        }
        let schema = fetch_schema(&self.client, uri).await?;
        let validator = Arc::new(SchemaValidator::compile(uri.to_string(), &schema)?);
        self.extension_cache
            .lock()
            .await
            .insert(uri.to_string(), Arc::clone(&validator));
        Ok(validator)
    }
}

#[async_trait]
impl Processor for Validate {
    fn set_logger(&mut self, logger: LoggerName) {
        self.logger = Some(logger);
    }

    async fn modify(&self, item: Item, context: &ExecutionContext) -> Result<Modified, EngineError> {
        let instance = Value::Object(item.clone());
        let mut messages = Vec::new();
        for validator in &self.validators {
            if let Err(message) = validator.validate(&instance) {
                messages.push(message);
            }
        }

        let configured: HashSet<&str> = self.config.extension_schemas.iter().map(String::as_str).collect();
        let declared = item.get("stac_extensions").and_then(Value::as_array).cloned().unwrap_or_default();
        for uri in declared.iter().filter_map(Value::as_str).filter(|uri| !configured.contains(uri)) {
            match self.extension_validator(uri).await {
                Ok(validator) => {
                    if let Err(message) = validator.validate(&instance) {
                        messages.push(message);
                    }
                }
                Err(err) => {
                    tracing::debug!(
                        "{}: could not fetch declared extension schema {}: {}",
                        self.logger().as_str(),
                        uri,
                        err
                    );
                    messages.push(format!("extension schema {uri} unreachable: {err}"));
                }
            }
        }

        if messages.is_empty() {
            return Ok(Modified::Kept(item));
        }

        let joined = messages.join("; ");
        if self.config.strict {
            return Err(EngineError::validation_failed(joined));
        }

        tracing::debug!("{}: item failed validation: {}", self.logger().as_str(), joined);
        context
            .failure_collector
            .record(FailureRecord::new(
                "validate",
                item.get("id").and_then(Value::as_str).map(str::to_string),
                "data_processing",
                joined,
            ))
            .await;
        Ok(Modified::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn validate_with(schema: Value, strict: bool) -> Validate {
        Validate {
            config: ValidateConfig {
                strict,
                extension_schemas: Vec::new(),
            },
            validators: vec![SchemaValidator::compile(CORE_SCHEMA_URI, &schema).unwrap()],
            client: reqwest::Client::new(),
            extension_cache: Mutex::new(HashMap::new()),
            logger: Some(LoggerName::root("test")),
        }
    }

    #[tokio::test]
    async fn valid_items_pass_through_unchanged() {
        let validate = validate_with(
            serde_json::json!({"type": "object", "required": ["id"], "properties": {"id": {"type": "string"}}}),
            false,
        );
        let mut item = serde_json::Map::new();
        item.insert("id".into(), serde_json::json!("i1"));
        let modified = validate.modify(item, &context()).await.unwrap();
        assert!(!modified.is_dropped());
    }

    #[tokio::test]
    async fn non_strict_invalid_items_are_dropped_and_recorded() {
        let validate = validate_with(
            serde_json::json!({"type": "object", "required": ["id"]}),
            false,
        );
        let item = serde_json::Map::new();
        let modified = validate.modify(item, &context()).await.unwrap();
        assert!(modified.is_dropped());
    }

    #[tokio::test]
    async fn strict_invalid_items_raise_an_error() {
        let validate = validate_with(
            serde_json::json!({"type": "object", "required": ["id"]}),
            true,
        );
        let item = serde_json::Map::new();
        let err = validate.modify(item, &context()).await.unwrap_err();
        assert_eq!(err.kind(), stac_pipeline_domain::error::ErrorKind::DataProcessing);
    }

    #[tokio::test]
    async fn items_are_validated_against_their_own_declared_extensions() {
        let validate = validate_with(
            serde_json::json!({"type": "object", "required": ["id"], "properties": {"id": {"type": "string"}}}),
            false,
        );
        let ext_schema = serde_json::json!({"type": "object", "required": ["custom:value"]});
        let ext_validator = Arc::new(SchemaValidator::compile("https://example.test/ext.json", &ext_schema).unwrap());
        validate
            .extension_cache
            .lock()
            .await
            .insert("https://example.test/ext.json".to_string(), ext_validator);

        let mut item = serde_json::Map::new();
        item.insert("id".into(), serde_json::json!("i1"));
        item.insert(
            "stac_extensions".into(),
            serde_json::json!(["https://example.test/ext.json"]),
        );

        let modified = validate.modify(item, &context()).await.unwrap();
        assert!(modified.is_dropped());
    }

    #[tokio::test]
    async fn declared_extensions_already_in_the_configured_set_are_not_refetched() {
        let mut validate = validate_with(
            serde_json::json!({"type": "object", "required": ["id"], "properties": {"id": {"type": "string"}}}),
            false,
        );
        validate.config.extension_schemas.push("https://example.test/ext.json".to_string());

        let mut item = serde_json::Map::new();
        item.insert("id".into(), serde_json::json!("i1"));
        item.insert(
            "stac_extensions".into(),
            serde_json::json!(["https://example.test/ext.json"]),
        );

        // The URI is already in `config.extension_schemas` (even though no
        // matching static validator was installed by `validate_with`), so
        // the declared-extension path must skip it rather than attempt a
        // network fetch.
        let modified = validate.modify(item, &context()).await.unwrap();
        assert!(!modified.is_dropped());
    }
}
