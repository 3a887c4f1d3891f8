// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Document Loader
//!
//! Parses a workflow document (YAML or JSON, detected from the file
//! extension) into [`Workflow`] and performs `${NAME}` variable substitution
//! (spec.md §4.11/§6): the document is parsed into a generic JSON value
//! first, `settings.variables` is read off that raw value as the fallback
//! table, then every string scalar in the document is walked and `${NAME}`
//! occurrences are replaced from the process environment, falling back to
//! `settings.variables`. Missing variables are a [`EngineError::MissingVariable`]
//! (a [`stac_pipeline_domain::error::ErrorKind::Configuration`] error, fatal
//! before any item is processed).

use config::{Config, File};
use stac_pipeline_domain::entities::Workflow;
use stac_pipeline_domain::error::EngineError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Loads and fully resolves a workflow document at `path`.
pub async fn load(path: &Path) -> Result<Workflow, EngineError> {
    let raw = parse_file(path.to_path_buf()).await?;
    let variables = extract_variables(&raw);
    let substituted = substitute(&raw, &variables)?;
    serde_json::from_value(substituted).map_err(EngineError::from)
}

async fn parse_file(path: PathBuf) -> Result<serde_json::Value, EngineError> {
    tokio::task::spawn_blocking(move || -> Result<serde_json::Value, EngineError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()
            .map_err(|e| EngineError::invalid_config(e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| EngineError::invalid_config(e.to_string()))
    })
    .await
    .map_err(|e| EngineError::internal_error(e.to_string()))?
}

fn extract_variables(raw: &serde_json::Value) -> BTreeMap<String, String> {
    raw.get("settings")
        .and_then(|s| s.get("variables"))
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn substitute(
    value: &serde_json::Value,
    variables: &BTreeMap<String, String>,
) -> Result<serde_json::Value, EngineError> {
    match value {
        serde_json::Value::String(s) => Ok(serde_json::Value::String(substitute_string(s, variables)?)),
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(substitute(item, variables)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), substitute(v, variables)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(raw: &str, variables: &BTreeMap<String, String>) -> Result<String, EngineError> {
    let mut result = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = raw[i + 2..].find('}') {
                let name = &raw[i + 2..i + 2 + end];
                let value = std::env::var(name)
                    .ok()
                    .or_else(|| variables.get(name).cloned())
                    .ok_or_else(|| EngineError::MissingVariable(name.to_string()))?;
                result.push_str(&value);
                i += 2 + end + 1;
                continue;
            }
        }
        let ch = raw[i..].chars().next().expect("valid utf8 boundary");
        result.push(ch);
        i += ch.len_utf8();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stac_pipeline_domain::entities::StepModule;
    use tokio::io::AsyncWriteExt;

    async fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = tokio::fs::File::create(&path).await.unwrap();
        file.write_all(contents.as_bytes()).await.unwrap();
        path
    }

    #[tokio::test]
    async fn loads_yaml_document_with_no_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "workflow.yaml",
            r#"
name: demo
steps:
  - id: seed
    module: SeedModule
    config:
      items: ["a", "b"]
"#,
        )
        .await;

        let workflow = load(&path).await.unwrap();
        assert_eq!(workflow.name, "demo");
        assert_eq!(workflow.steps.len(), 1);
        assert_eq!(workflow.steps[0].module, StepModule::SeedModule);
    }

    #[tokio::test]
    async fn substitutes_from_settings_variables_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "workflow.yaml",
            r#"
name: demo
settings:
  variables:
    COLLECTION: landsat
steps:
  - id: ingest
    module: IngestModule
    config:
      collection: "${COLLECTION}"
"#,
        )
        .await;

        let workflow = load(&path).await.unwrap();
        assert_eq!(
            workflow.steps[0].config.get("collection"),
            Some(&serde_json::json!("landsat"))
        );
    }

    #[tokio::test]
    async fn missing_variable_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "workflow.yaml",
            r#"
name: demo
steps:
  - id: ingest
    module: IngestModule
    config:
      collection: "${NOT_SET_ANYWHERE}"
"#,
        )
        .await;

        let err = load(&path).await.unwrap_err();
        assert_eq!(err.kind(), stac_pipeline_domain::error::ErrorKind::Configuration);
    }
}
