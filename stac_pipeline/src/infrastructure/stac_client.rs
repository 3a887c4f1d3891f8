// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAC API Client
//!
//! A small `reqwest`-based client for the `GET /search` endpoint of a STAC
//! API (spec.md §4.5, §6), used by Ingest's API mode. Pagination follows the
//! STAC API convention of a `links` array containing a `rel: "next"` entry
//! whose `href` is the next page to fetch; iteration stops when that link is
//! absent or `max_items` is reached.

use serde_json::{Map, Value};
use stac_pipeline_domain::error::EngineError;

/// Search parameters assembled from a step's `config` and any per-run
/// overrides in `context.data` (spec.md §4.5: "Parameters may be overridden
/// per run by matching keys in `context.data`").
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub collections: Option<Vec<String>>,
    pub bbox: Option<Vec<f64>>,
    pub datetime: Option<String>,
    pub query: Option<Value>,
    /// Per-page size.
    pub limit: Option<u32>,
}

impl SearchParams {
    fn to_request_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        if let Some(collections) = &self.collections {
            body.insert("collections".into(), Value::from(collections.clone()));
        }
        if let Some(bbox) = &self.bbox {
            body.insert("bbox".into(), Value::from(bbox.clone()));
        }
        if let Some(datetime) = &self.datetime {
            body.insert("datetime".into(), Value::String(datetime.clone()));
        }
        if let Some(query) = &self.query {
            body.insert("query".into(), query.clone());
        }
        if let Some(limit) = self.limit {
            body.insert("limit".into(), Value::from(limit));
        }
        body
    }
}

pub struct StacClient {
    http: reqwest::Client,
    root_url: String,
}

impl StacClient {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            root_url: root_url.into(),
        }
    }

    pub fn with_http_client(root_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            root_url: root_url.into(),
        }
    }

    /// Fetches the first page of `POST {root_url}/search`.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchPage, EngineError> {
        let url = format!("{}/search", self.root_url.trim_end_matches('/'));
        self.fetch_page(&url, Some(params)).await
    }

    /// Follows a STAC API `rel: "next"` link from a previous page.
    pub async fn next_page(&self, next_url: &str) -> Result<SearchPage, EngineError> {
        self.fetch_page(next_url, None).await
    }

    async fn fetch_page(&self, url: &str, params: Option<&SearchParams>) -> Result<SearchPage, EngineError> {
        let mut request = self.http.post(url);
        if let Some(params) = params {
            request = request.json(&params.to_request_body());
        }
        let response = request
            .send()
            .await
            .map_err(|e| http_error(url, e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_error(url, Some(status.as_u16()), status.to_string()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| http_error(url, Some(status.as_u16()), e.to_string()))?;

        let items = body
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();

        let next = body
            .get("links")
            .and_then(Value::as_array)
            .and_then(|links| {
                links
                    .iter()
                    .find(|link| link.get("rel").and_then(Value::as_str) == Some("next"))
            })
            .and_then(|link| link.get("href").and_then(Value::as_str))
            .map(str::to_string);

        Ok(SearchPage { items, next })
    }
}

fn http_error(url: &str, status: Option<u16>, message: String) -> EngineError {
    EngineError::HttpError {
        status,
        message: format!("{url}: {message}"),
    }
}

pub struct SearchPage {
    pub items: Vec<Map<String, Value>>,
    /// `rel: "next"` link href, if the API reports another page.
    pub next: Option<String>,
}
