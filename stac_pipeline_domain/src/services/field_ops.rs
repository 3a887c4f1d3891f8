// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Field Utilities
//!
//! Dotted-path read/write with wildcard expansion, JMESPath extraction, and
//! named-strategy deep-merge (spec.md §4.1). Every concrete Processor
//! (Update, Validate, Extension, Transform) is built on these free
//! functions; none of them hold state.

use crate::error::EngineError;
use crate::value_objects::split_path;
use crate::value_objects::FieldPath;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Reads the value at `path`, or `default` if any segment is missing or
/// traverses a non-mapping.
pub fn get<'a>(item: &'a Value, path: &FieldPath, default: Option<&'a Value>) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.segments() {
        match current.as_object().and_then(|map| map.get(segment)) {
            Some(next) => current = next,
            None => return default,
        }
    }
    Some(current)
}

/// Mutates `item`, writing `value` at `path`.
///
/// If `create_paths` is false and an intermediate segment does not exist,
/// fails with [`EngineError::path_missing`]. If an intermediate segment
/// exists but is not a mapping, fails with [`EngineError::path_collision`].
pub fn set(item: &mut Value, path: &FieldPath, value: Value, create_paths: bool) -> Result<(), EngineError> {
    if !item.is_object() {
        *item = Value::Object(Map::new());
    }
    let segments = path.segments();
    let (last, intermediate) = segments
        .split_last()
        .ok_or_else(|| EngineError::invalid_config("empty path"))?;

    let mut current = item;
    for segment in intermediate {
        let map = current
            .as_object_mut()
            .ok_or_else(|| EngineError::path_collision(path.to_string()))?;
        if !map.contains_key(segment) {
            if !create_paths {
                return Err(EngineError::path_missing(path.to_string()));
            }
            map.insert(segment.clone(), Value::Object(Map::new()));
        }
        let next = map.get_mut(segment).expect("just inserted or verified present");
        if !next.is_object() {
            if next.is_null() && create_paths {
                *next = Value::Object(Map::new());
            } else {
                return Err(EngineError::path_collision(path.to_string()));
            }
        }
        current = next;
    }

    let map = current
        .as_object_mut()
        .ok_or_else(|| EngineError::path_collision(path.to_string()))?;
    if !create_paths && !map.contains_key(last) {
        return Err(EngineError::path_missing(path.to_string()));
    }
    map.insert(last.clone(), value);
    Ok(())
}

/// Removes the value at `path`. Idempotent; a no-op if the path (or any
/// intermediate segment) is absent.
pub fn remove(item: &mut Value, path: &FieldPath) {
    let segments = path.segments();
    let Some((last, intermediate)) = segments.split_last() else {
        return;
    };
    let mut current = item;
    for segment in intermediate {
        match current.as_object_mut().and_then(|map| map.get_mut(segment)) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(map) = current.as_object_mut() {
        map.remove(last);
    }
}

/// Binding name for the wildcard segment at `position` within `parent_segment`
/// (the segment immediately preceding the wildcard), per DESIGN NOTES'
/// wildcard-variable binding convention: `asset_key` under `assets`,
/// `key_<k>` otherwise.
fn wildcard_binding_name(position: usize, parent_segment: Option<&str>) -> String {
    if parent_segment == Some("assets") {
        "asset_key".to_string()
    } else {
        format!("key_{position}")
    }
}

/// Substitutes `{name}` placeholders in `template` using `bindings`. Names
/// with no matching binding are left untouched.
pub fn substitute_template(template: &str, bindings: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let name = &template[i + 1..i + end];
                if let Some(value) = bindings.get(name) {
                    result.push_str(value);
                    i += end + 1;
                    continue;
                }
            }
        }
        let ch = template[i..].chars().next().expect("valid utf8 boundary");
        result.push(ch);
        i += ch.len_utf8();
    }
    result
}

/// Given a mapping whose keys may contain a single `*` wildcard segment
/// (e.g. `assets.*.dgeo:cid`), expands each pattern against `item`,
/// returning one concrete `(path, value)` pair per matching key found at
/// that position. Right-hand side string values are templates:
/// `{asset_key}`/`{item_id}`/`{collection_id}`/any key from `bindings` are
/// substituted per expansion. Patterns with no `*` pass through unchanged
/// (after template substitution). Multiple wildcards in one key are
/// rejected (DESIGN NOTES: "implementations should reject ambiguous
/// patterns").
pub fn expand_wildcards(
    templates: &Map<String, Value>,
    item: &Value,
    bindings: &HashMap<String, String>,
) -> Result<Vec<(FieldPath, Value)>, EngineError> {
    let mut expanded = Vec::new();

    for (raw_path, raw_value) in templates {
        let segments = split_path(raw_path).map_err(|e| EngineError::invalid_config(e.to_string()))?;
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
            // No wildcard: a single concrete path.
            let path = FieldPath::from_segments(segments.clone())
                .map_err(|e| EngineError::invalid_config(e.to_string()))?;
            let value = substitute_value(raw_value, item, bindings);
            expanded.push((path, value));
            continue;
        };

        let parent_path = &segments[..wildcard_idx];
        let Some(parent) = navigate(item, parent_path) else {
            continue; // no matches at this position
        };
        let Some(parent_map) = parent.as_object() else {
            continue;
        };

        let parent_segment = wildcard_idx.checked_sub(1).and_then(|i| segments.get(i).map(String::as_str));
        let binding_name = wildcard_binding_name(wildcard_idx, parent_segment);

        for key in parent_map.keys() {
            let mut concrete_segments = segments.clone();
            concrete_segments[wildcard_idx] = key.clone();
            let path = FieldPath::from_segments(concrete_segments)
                .map_err(|e| EngineError::invalid_config(e.to_string()))?;

            let mut scoped_bindings = bindings.clone();
            scoped_bindings.insert(binding_name.clone(), key.clone());
            let value = substitute_value(raw_value, item, &scoped_bindings);
            expanded.push((path, value));
        }
    }

    Ok(expanded)
}

fn navigate<'a>(item: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = item;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn substitute_value(raw_value: &Value, item: &Value, bindings: &HashMap<String, String>) -> Value {
    let Value::String(template) = raw_value else {
        return raw_value.clone();
    };
    let mut scoped = bindings.clone();
    if let Some(Value::String(id)) = item.get("id") {
        scoped.entry("item_id".to_string()).or_insert_with(|| id.clone());
    }
    if let Some(Value::String(collection)) = item.get("collection") {
        scoped
            .entry("collection_id".to_string())
            .or_insert_with(|| collection.clone());
    }
    Value::String(substitute_template(template, &scoped))
}

/// Named merge strategies for [`deep_merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Overlay wins at scalar collisions; mappings recurse; new keys added.
    Overwrite,
    /// Base wins at scalar collisions; new keys added from overlay; mappings
    /// recurse.
    KeepExisting,
    /// Only keys already present in `base` (at every depth) are updated;
    /// overlay keys not in base are ignored.
    UpdateOnly,
}

/// Recursive merge of `overlay` into `base` per `strategy`.
pub fn deep_merge(base: &Value, overlay: &Value, strategy: MergeStrategy) -> Value {
    let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) else {
        return match strategy {
            MergeStrategy::Overwrite | MergeStrategy::UpdateOnly => overlay.clone(),
            MergeStrategy::KeepExisting => base.clone(),
        };
    };

    let mut result = base_map.clone();
    for (key, overlay_value) in overlay_map {
        match result.get(key) {
            Some(existing) if existing.is_object() && overlay_value.is_object() => {
                result.insert(key.clone(), deep_merge(existing, overlay_value, strategy));
            }
            Some(_) => match strategy {
                MergeStrategy::Overwrite | MergeStrategy::UpdateOnly => {
                    result.insert(key.clone(), overlay_value.clone());
                }
                MergeStrategy::KeepExisting => {}
            },
            None => match strategy {
                MergeStrategy::Overwrite | MergeStrategy::KeepExisting => {
                    result.insert(key.clone(), overlay_value.clone());
                }
                MergeStrategy::UpdateOnly => {}
            },
        }
    }
    Value::Object(result)
}

/// Evaluates a JMESPath expression against `item`. Bridges
/// `serde_json::Value` and `jmespath::Variable` via JSON text, since the
/// two crates don't share a value representation.
pub fn jmespath(item: &Value, query: &str) -> Result<Value, EngineError> {
    let expression = jmespath::compile(query).map_err(|e| EngineError::QueryError(e.to_string()))?;
    let json_text = serde_json::to_string(item)?;
    let variable = jmespath::Variable::from_json(&json_text).map_err(|e| EngineError::QueryError(e.to_string()))?;
    let result = expression.search(variable).map_err(|e| EngineError::QueryError(e.to_string()))?;
    let rendered = serde_json::to_string(&*result)?;
    serde_json::from_str(&rendered).map_err(EngineError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_set_round_trip_for_all_paths() {
        let mut item = json!({"properties": {}});
        let path = FieldPath::parse("properties.datetime").unwrap();
        set(&mut item, &path, json!("2024-01-01T00:00:00Z"), true).unwrap();
        assert_eq!(get(&item, &path, None), Some(&json!("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn get_returns_default_on_missing_path() {
        let item = json!({"properties": {}});
        let path = FieldPath::parse("properties.missing").unwrap();
        let default = json!("fallback");
        assert_eq!(get(&item, &path, Some(&default)), Some(&default));
    }

    #[test]
    fn set_without_create_paths_fails_on_missing_intermediate() {
        let mut item = json!({});
        let path = FieldPath::parse("properties.datetime").unwrap();
        let err = set(&mut item, &path, json!("x"), false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataProcessing);
    }

    #[test]
    fn set_fails_on_path_collision() {
        let mut item = json!({"properties": "not-a-map"});
        let path = FieldPath::parse("properties.datetime").unwrap();
        let err = set(&mut item, &path, json!("x"), true).unwrap_err();
        assert!(matches!(err, EngineError::PathCollision { .. }));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut item = json!({"properties": {"license": "CC-BY-4.0"}});
        let path = FieldPath::parse("properties.license").unwrap();
        remove(&mut item, &path);
        remove(&mut item, &path);
        assert_eq!(get(&item, &path, None), None);
    }

    #[test]
    fn expand_wildcards_yields_one_path_per_asset_key() {
        let item = json!({
            "id": "i1",
            "assets": {"blue": {}, "green": {}, "red": {}}
        });
        let mut templates = Map::new();
        templates.insert("assets.*.x".to_string(), json!("v"));
        let expanded = expand_wildcards(&templates, &item, &HashMap::new()).unwrap();
        assert_eq!(expanded.len(), 3);
    }

    #[test]
    fn expand_wildcards_substitutes_asset_key_template() {
        let item = json!({"id": "i1", "assets": {"blue": {}}});
        let mut templates = Map::new();
        templates.insert(
            "assets.*.cid".to_string(),
            json!("assets.{asset_key}.cid for {item_id}"),
        );
        let expanded = expand_wildcards(&templates, &item, &HashMap::new()).unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(
            expanded[0].1,
            json!("assets.blue.cid for i1")
        );
    }

    #[test]
    fn expand_wildcards_rejects_multiple_wildcards() {
        let item = json!({});
        let mut templates = Map::new();
        templates.insert("a.*.b.*".to_string(), json!("x"));
        assert!(expand_wildcards(&templates, &item, &HashMap::new()).is_err());
    }

    #[test]
    fn deep_merge_overwrite_prefers_overlay_scalars() {
        let base = json!({"a": 1, "b": {"c": 2}});
        let overlay = json!({"a": 10, "b": {"d": 3}});
        let merged = deep_merge(&base, &overlay, MergeStrategy::Overwrite);
        assert_eq!(merged, json!({"a": 10, "b": {"c": 2, "d": 3}}));
    }

    #[test]
    fn deep_merge_keep_existing_prefers_base_scalars() {
        let base = json!({"a": 1});
        let overlay = json!({"a": 10, "b": 2});
        let merged = deep_merge(&base, &overlay, MergeStrategy::KeepExisting);
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn deep_merge_update_only_ignores_new_keys() {
        let base = json!({"a": 1});
        let overlay = json!({"a": 10, "b": 2});
        let merged = deep_merge(&base, &overlay, MergeStrategy::UpdateOnly);
        assert_eq!(merged, json!({"a": 10}));
    }

    #[test]
    fn deep_merge_is_idempotent_under_repeated_overwrite() {
        let base = json!({"a": 1, "b": {"c": 2}});
        let overlay = json!({"b": {"c": 3}});
        let once = deep_merge(&base, &overlay, MergeStrategy::Overwrite);
        let twice = deep_merge(&once, &overlay, MergeStrategy::Overwrite);
        assert_eq!(once, twice);
    }
}
