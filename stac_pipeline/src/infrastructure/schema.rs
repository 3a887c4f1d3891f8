// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # JSON Schema Validation & Extension Templates
//!
//! A thin wrapper around `jsonschema::Validator` shared by the Validate
//! stage (core + referenced extension schemas, spec.md §4.7) and the
//! Extension stage (extension schema, spec.md §4.8), plus the Extension
//! template builder.
//!
//! The template builder's recursion is deliberately bounded to the known
//! STAC extension-schema layout (spec.md §9 DESIGN NOTES: "limit recursion
//! to the known STAC layout ... rather than attempting a general schema
//! walker"). Deeper or differently-shaped schemas simply yield an empty
//! template, they do not error.

use serde_json::Value;
use stac_pipeline_domain::error::EngineError;

/// A compiled schema plus the URI it was fetched from, for error context.
pub struct SchemaValidator {
    uri: String,
    compiled: jsonschema::Validator,
}

impl SchemaValidator {
    /// Compiles `schema`. `uri` is carried only for diagnostics.
    pub fn compile(uri: impl Into<String>, schema: &Value) -> Result<Self, EngineError> {
        let uri = uri.into();
        let compiled = jsonschema::validator_for(schema).map_err(|e| EngineError::SchemaUnreachable {
            uri: uri.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { uri, compiled })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Validates `instance`, joining every diagnostic message with `; `
    /// (spec.md §4.7: "accumulate diagnostic messages into a single
    /// human-readable string").
    pub fn validate(&self, instance: &Value) -> Result<(), String> {
        let messages: Vec<String> = self.compiled.iter_errors(instance).map(|e| e.to_string()).collect();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(messages.join("; "))
        }
    }
}

/// Fetches a schema document over HTTP. Failure is a
/// [`EngineError::SchemaUnreachable`] (spec.md §4.8: "Fetch the schema at
/// `schema_uri` over HTTP (failure -> ConfigurationError)").
pub async fn fetch_schema(client: &reqwest::Client, uri: &str) -> Result<Value, EngineError> {
    let response = client
        .get(uri)
        .send()
        .await
        .map_err(|e| EngineError::SchemaUnreachable {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?
        .error_for_status()
        .map_err(|e| EngineError::SchemaUnreachable {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
    response.json::<Value>().await.map_err(|e| EngineError::SchemaUnreachable {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}

/// Derives the extension property-layout skeleton (spec.md §4.8): walks
/// `properties.properties.properties` when present, or -- for a `oneOf`
/// schema -- the variant whose `properties.type.const == "Feature"`. Each
/// recognized property is initialized to its `default` (or `null`) and
/// nested under a `"properties"` key, since that's where STAC extension
/// fields live on the item itself.
pub fn derive_template(schema: &Value) -> serde_json::Map<String, Value> {
    let target = select_feature_variant(schema).unwrap_or(schema);
    let mut properties_template = serde_json::Map::new();
    if let Some(properties) = target
        .pointer("/properties/properties/properties")
        .and_then(Value::as_object)
    {
        for (key, property_schema) in properties {
            let default = property_schema.get("default").cloned().unwrap_or(Value::Null);
            properties_template.insert(key.clone(), default);
        }
    }
    let mut template = serde_json::Map::new();
    if !properties_template.is_empty() {
        template.insert("properties".to_string(), Value::Object(properties_template));
    }
    template
}

fn select_feature_variant(schema: &Value) -> Option<&Value> {
    let variants = schema.get("oneOf")?.as_array()?;
    variants
        .iter()
        .find(|variant| variant.pointer("/properties/type/const").and_then(Value::as_str) == Some("Feature"))
}
