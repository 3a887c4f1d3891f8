// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Extension Processor
//!
//! Scaffolds a STAC extension onto items (spec.md §4.8): fetches the
//! extension schema once at construction, derives a property-layout
//! template from it, and at `modify`-time registers the extension on the
//! item and deep-merges the template in without clobbering existing
//! values.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use stac_pipeline_domain::entities::{ExecutionContext, FailureRecord, LoggerName};
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::services::field_ops::{deep_merge, MergeStrategy};
use stac_pipeline_domain::services::{Item, Modified, Processor};

use crate::infrastructure::schema::{derive_template, fetch_schema, SchemaValidator};

#[derive(Debug, Clone, Deserialize, Default)]
struct ExtensionConfig {
    schema_uri: String,
    #[serde(default)]
    defaults: Item,
    #[serde(default)]
    validate: bool,
}

pub struct Extension {
    config: ExtensionConfig,
    template: Item,
    validator: Option<SchemaValidator>,
    logger: Option<LoggerName>,
}

impl Extension {
    pub async fn new(config: &Value) -> Result<Self, EngineError> {
        let config: ExtensionConfig =
            serde_json::from_value(config.clone()).map_err(|e| EngineError::invalid_config(e.to_string()))?;

        let client = reqwest::Client::new();
        let schema = fetch_schema(&client, &config.schema_uri).await?;
        let raw_template = derive_template(&schema);

        let merged = deep_merge(
            &Value::Object(raw_template),
            &Value::Object(config.defaults.clone()),
            MergeStrategy::Overwrite,
        );
        let template = match merged {
            Value::Object(map) => map,
            _ => Item::new(),
        };

        let validator = if config.validate {
            Some(SchemaValidator::compile(config.schema_uri.clone(), &schema)?)
        } else {
            None
        };

        Ok(Self {
            config,
            template,
            validator,
            logger: None,
        })
    }

    fn logger(&self) -> &LoggerName {
        self.logger.as_ref().expect("set_logger called before modify")
    }
}

#[async_trait]
impl Processor for Extension {
    fn set_logger(&mut self, logger: LoggerName) {
        self.logger = Some(logger);
    }

    async fn modify(&self, item: Item, context: &ExecutionContext) -> Result<Modified, EngineError> {
        let mut value = Value::Object(item);

        let extensions = value
            .get("stac_extensions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let already_declared = extensions.iter().any(|v| v.as_str() == Some(self.config.schema_uri.as_str()));
        if !already_declared {
            let mut extensions = extensions;
            extensions.push(Value::String(self.config.schema_uri.clone()));
            value["stac_extensions"] = Value::Array(extensions);
        }

        let merged = deep_merge(&value, &Value::Object(self.template.clone()), MergeStrategy::KeepExisting);
        let item = match merged {
            Value::Object(map) => map,
            _ => return Ok(Modified::Kept(Item::new())),
        };

        if let Some(validator) = &self.validator {
            let instance = Value::Object(item.clone());
            if let Err(message) = validator.validate(&instance) {
                tracing::debug!("{}: extension validation failed: {}", self.logger().as_str(), message);
                context
                    .failure_collector
                    .record(FailureRecord::new(
                        "extension",
                        item.get("id").and_then(Value::as_str).map(str::to_string),
                        "data_processing",
                        message,
                    ))
                    .await;
            }
        }

        Ok(Modified::Kept(item))
    }
}
