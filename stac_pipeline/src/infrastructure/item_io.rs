// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Item File I/O
//!
//! JSON/Parquet readers for Ingest's file mode (spec.md §4.5) and JSON/Parquet
//! writers for Output's flush (spec.md §4.10). Every write goes through a
//! temp-file-then-rename commit, the same pattern used by the checkpoint
//! sidecar and grounded on the teacher's transactional chunk writer.
//!
//! Parquet has no native representation for a STAC item's open-ended,
//! per-extension schema, so each item is carried as a single `item` column of
//! JSON-encoded strings; a flush is one row group, one row per item. This
//! keeps the reader/writer symmetric and schema-agnostic at the cost of
//! columnar queryability, which is outside this system's scope.

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value};
use stac_pipeline_domain::error::EngineError;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type Item = Map<String, Value>;

/// Reads a single JSON document: an object, a `FeatureCollection`, or a bare
/// array of items (spec.md §4.5).
pub async fn read_json_file(path: &Path) -> Result<Vec<Item>, EngineError> {
    let bytes = tokio::fs::read(path).await?;
    let value: Value = serde_json::from_slice(&bytes)?;
    parse_json_document(value)
}

fn parse_json_document(value: Value) -> Result<Vec<Item>, EngineError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| object_or_error(item))
            .collect(),
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("FeatureCollection") => map
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(object_or_error)
            .collect(),
        Value::Object(map) => Ok(vec![map]),
        other => Err(EngineError::validation_failed(format!(
            "expected a JSON object or array, found {other}"
        ))),
    }
}

fn object_or_error(value: Value) -> Result<Item, EngineError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| EngineError::validation_failed("expected each feature to be a JSON object"))
}

/// Reads every `*.json` file in a directory (non-recursively), sorted by
/// file name for deterministic ordering.
pub async fn read_directory(dir: &Path) -> Result<Vec<Item>, EngineError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        items.extend(read_json_file(&path).await?);
    }
    Ok(items)
}

/// Reads a Parquet file written by [`write_parquet_batch`].
pub async fn read_parquet_file(path: &Path) -> Result<Vec<Item>, EngineError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_parquet_file_blocking(&path))
        .await
        .map_err(|e| EngineError::internal_error(e.to_string()))?
}

fn read_parquet_file_blocking(path: &Path) -> Result<Vec<Item>, EngineError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| EngineError::validation_failed(e.to_string()))?
        .build()
        .map_err(|e| EngineError::validation_failed(e.to_string()))?;

    let mut items = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| EngineError::validation_failed(e.to_string()))?;
        let column = batch
            .column_by_name("item")
            .ok_or_else(|| EngineError::validation_failed("parquet file has no `item` column"))?;
        let strings = column
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngineError::validation_failed("`item` column is not a string column"))?;
        for i in 0..strings.len() {
            let value: Value = serde_json::from_str(strings.value(i))?;
            items.push(object_or_error(value)?);
        }
    }
    Ok(items)
}

/// Reads an arbitrary Parquet table and converts each row to a JSON object,
/// one key per column. Used for Transform's sidecar input (spec.md §4.9),
/// where the table's columns are unknown ahead of time, unlike
/// [`read_parquet_file`]'s fixed `item`-column convention.
pub async fn read_parquet_records(path: &Path) -> Result<Vec<Item>, EngineError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_parquet_records_blocking(&path))
        .await
        .map_err(|e| EngineError::internal_error(e.to_string()))?
}

fn read_parquet_records_blocking(path: &Path) -> Result<Vec<Item>, EngineError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| EngineError::validation_failed(e.to_string()))?
        .build()
        .map_err(|e| EngineError::validation_failed(e.to_string()))?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| EngineError::validation_failed(e.to_string()))?;
        let field_names: Vec<String> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
        for row in 0..batch.num_rows() {
            let mut record = Map::new();
            for (col_idx, name) in field_names.iter().enumerate() {
                record.insert(name.clone(), arrow_value_to_json(batch.column(col_idx), row));
            }
            records.push(record);
        }
    }
    Ok(records)
}

fn arrow_value_to_json(column: &ArrayRef, row: usize) -> Value {
    if column.is_null(row) {
        return Value::Null;
    }
    if let Some(array) = column.as_any().downcast_ref::<StringArray>() {
        return Value::String(array.value(row).to_string());
    }
    if let Some(array) = column.as_any().downcast_ref::<Int64Array>() {
        return Value::from(array.value(row));
    }
    if let Some(array) = column.as_any().downcast_ref::<Float64Array>() {
        return serde_json::Number::from_f64(array.value(row))
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Some(array) = column.as_any().downcast_ref::<BooleanArray>() {
        return Value::Bool(array.value(row));
    }
    Value::Null
}

/// Writes `item` atomically to `<base_dir>/<id>.json` via a `.tmp` sibling
/// (spec.md §4.10). `id` is typically the item's own `id` field.
pub async fn write_json_item(base_dir: &Path, id: &str, item: &Item) -> Result<(), EngineError> {
    tokio::fs::create_dir_all(base_dir).await?;
    let final_path = base_dir.join(format!("{id}.json"));
    let tmp_path = base_dir.join(format!("{id}.json.tmp"));
    let bytes = serde_json::to_vec_pretty(item)?;
    if let Err(err) = tokio::fs::write(&tmp_path, &bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    if let Err(err) = tokio::fs::rename(&tmp_path, &final_path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    Ok(())
}

/// Writes a batch of items as one Parquet row group, atomically, to
/// `<base_dir>/items_<suffix>.parquet` (spec.md §4.10). `suffix` should
/// uniquely identify the flush (UTC timestamp plus, per spec.md §9, a stable
/// sibling id when matrix siblings may flush concurrently).
pub async fn write_parquet_batch(base_dir: &Path, suffix: &str, items: &[Item]) -> Result<PathBuf, EngineError> {
    tokio::fs::create_dir_all(base_dir).await?;
    let final_path = base_dir.join(format!("items_{suffix}.parquet"));
    let tmp_path = base_dir.join(format!("items_{suffix}.parquet.tmp"));

    let serialized: Vec<String> = items
        .iter()
        .map(|item| serde_json::to_string(item).map_err(EngineError::from))
        .collect::<Result<_, _>>()?;

    let tmp_path_for_blocking = tmp_path.clone();
    let write_result = tokio::task::spawn_blocking(move || write_parquet_blocking(&tmp_path_for_blocking, &serialized))
        .await
        .map_err(|e| EngineError::internal_error(e.to_string()))?;

    if let Err(err) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    if let Err(err) = tokio::fs::rename(&tmp_path, &final_path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    Ok(final_path)
}

fn write_parquet_blocking(path: &Path, serialized_items: &[String]) -> Result<(), EngineError> {
    let schema = Arc::new(Schema::new(vec![Field::new("item", DataType::Utf8, false)]));
    let column: StringArray = serialized_items.iter().map(|s| Some(s.as_str())).collect();
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(column)])
        .map_err(|e| EngineError::internal_error(e.to_string()))?;

    let file = File::create(path)?;
    let mut writer =
        ArrowWriter::try_new(file, schema, None).map_err(|e| EngineError::internal_error(e.to_string()))?;
    writer
        .write(&batch)
        .map_err(|e| EngineError::internal_error(e.to_string()))?;
    writer.close().map_err(|e| EngineError::internal_error(e.to_string()))?;
    Ok(())
}
