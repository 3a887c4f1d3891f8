// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Geometry Utilities
//!
//! Bounding-box computation, geometry repair, and item hydration
//! (spec.md §4.1). Geometries are plain GeoJSON `serde_json::Value`
//! objects, matching the item wire format.

use crate::services::field_ops::{deep_merge, MergeStrategy};
use crate::services::Item;
use serde_json::Value;

/// Computes `[minx, miny, maxx, maxy]` for any GeoJSON geometry (Point,
/// LineString, Polygon, Multi*, GeometryCollection). A null geometry yields
/// a null bbox.
pub fn ensure_bbox(geometry: Option<&Value>) -> Option<Vec<f64>> {
    let geometry = geometry?;
    if geometry.is_null() {
        return None;
    }

    let mut points = Vec::new();
    collect_points(geometry, &mut points);
    if points.is_empty() {
        return None;
    }

    let (mut minx, mut miny) = (f64::INFINITY, f64::INFINITY);
    let (mut maxx, mut maxy) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in points {
        minx = minx.min(x);
        maxx = maxx.max(x);
        miny = miny.min(y);
        maxy = maxy.max(y);
    }
    Some(vec![minx, miny, maxx, maxy])
}

fn collect_points(geometry: &Value, out: &mut Vec<(f64, f64)>) {
    match geometry.get("type").and_then(Value::as_str) {
        Some("GeometryCollection") => {
            if let Some(geometries) = geometry.get("geometries").and_then(Value::as_array) {
                for sub in geometries {
                    collect_points(sub, out);
                }
            }
        }
        Some(_) => {
            if let Some(coordinates) = geometry.get("coordinates") {
                walk_coordinates(coordinates, out);
            }
        }
        None => {}
    }
}

fn walk_coordinates(value: &Value, out: &mut Vec<(f64, f64)>) {
    let Value::Array(items) = value else {
        return;
    };
    if is_point_pair(items) {
        if let (Some(x), Some(y)) = (items[0].as_f64(), items[1].as_f64()) {
            out.push((x, y));
        }
        return;
    }
    for item in items {
        walk_coordinates(item, out);
    }
}

fn is_point_pair(items: &[Value]) -> bool {
    items.len() >= 2 && items.iter().take(2).all(Value::is_number)
}

/// Validates a geometry and attempts to repair it when invalid (e.g.
/// closing an unclosed polygon ring). Valid geometries pass through
/// unchanged with empty warnings; geometries this function cannot repair
/// are returned as `None` with a diagnostic warning.
///
/// Recursion is bounded to the Polygon/MultiPolygon ring-closing case named
/// in the spec; other geometry types pass through unvalidated, matching the
/// Extension template builder's "bounded recursion, not a general walker"
/// posture (spec.md §9 DESIGN NOTES).
pub fn validate_and_repair(geometry: Option<&Value>) -> (Option<Value>, Vec<String>) {
    let Some(geometry) = geometry else {
        return (None, Vec::new());
    };
    if geometry.is_null() {
        return (None, Vec::new());
    }

    let mut warnings = Vec::new();
    match geometry.get("type").and_then(Value::as_str) {
        Some("Polygon") => match repair_rings(geometry.get("coordinates"), &mut warnings) {
            Some(rings) => {
                let mut repaired = geometry.clone();
                repaired["coordinates"] = Value::Array(rings);
                (Some(repaired), warnings)
            }
            None => {
                warnings.push("polygon ring has fewer than 3 points; geometry dropped".to_string());
                (None, warnings)
            }
        },
        Some("MultiPolygon") => {
            let Some(polygons) = geometry.get("coordinates").and_then(Value::as_array) else {
                return (Some(geometry.clone()), warnings);
            };
            let mut repaired_polygons = Vec::with_capacity(polygons.len());
            for polygon in polygons {
                match repair_rings(Some(polygon), &mut warnings) {
                    Some(rings) => repaired_polygons.push(Value::Array(rings)),
                    None => {
                        warnings.push("multipolygon member has fewer than 3 points; geometry dropped".to_string());
                        return (None, warnings);
                    }
                }
            }
            let mut repaired = geometry.clone();
            repaired["coordinates"] = Value::Array(repaired_polygons);
            (Some(repaired), warnings)
        }
        _ => (Some(geometry.clone()), warnings),
    }
}

fn repair_rings(coordinates: Option<&Value>, warnings: &mut Vec<String>) -> Option<Vec<Value>> {
    let rings = coordinates?.as_array()?;
    let mut repaired = Vec::with_capacity(rings.len());
    for ring in rings {
        let mut points = ring.as_array()?.clone();
        if points.len() < 3 {
            return None;
        }
        if points.first() != points.last() {
            let first = points[0].clone();
            points.push(first);
            warnings.push("closed an unclosed polygon ring".to_string());
        }
        repaired.push(Value::Array(points));
    }
    Some(repaired)
}

/// Deep-merges `defaults` under `partial` using `overwrite`, with `partial`
/// as the overriding layer, producing a fully-hydrated item skeleton.
pub fn hydrate_item(partial: &Item, defaults: &Item) -> Item {
    let merged = deep_merge(
        &Value::Object(defaults.clone()),
        &Value::Object(partial.clone()),
        MergeStrategy::Overwrite,
    );
    match merged {
        Value::Object(map) => map,
        _ => partial.clone(),
    }
}
