// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Field Path
//!
//! A path is a sequence of segments expressed either as a dotted string
//! (`properties.datetime`) or with quoted segments when a key itself
//! contains a dot (`assets."ANG.txt".dgeo:cid`). [`FieldPath::parse`] is the
//! single entry point callers use; it also accepts pre-parsed segments via
//! [`FieldPath::from_segments`] for callers (wildcard expansion, matrix
//! coordinate binding) that build paths programmatically.

use std::fmt;
use thiserror::Error;

/// Errors raised while parsing a dotted path string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("unterminated quoted segment in path: {0}")]
    UnterminatedQuote(String),
    #[error("empty segment in path: {0}")]
    EmptySegment(String),
    #[error("wildcard segment not allowed in a concrete path: {0}")]
    UnexpectedWildcard(String),
}

/// A parsed, concrete (non-wildcard) field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path string into segments, honoring `"..."`-quoted
    /// segments that may themselves contain dots.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let segments = split_path(raw)?;
        if segments.iter().any(|s| s.contains('*')) {
            return Err(PathError::UnexpectedWildcard(raw.to_string()));
        }
        Ok(Self { segments })
    }

    /// Builds a path directly from already-split segments (no further
    /// parsing is performed; each segment is taken verbatim).
    pub fn from_segments(segments: Vec<String>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PathError::EmptySegment(segments.join(".")));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn joined(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render_path(&self.segments))
    }
}

/// Renders segments back into dotted-string form, quoting any segment that
/// itself contains a dot so the output round-trips through [`FieldPath::parse`].
pub fn render_path(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| {
            if s.contains('.') {
                format!("\"{}\"", s)
            } else {
                s.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Splits a dotted path string into segments, honoring quoted segments.
/// Shared by [`FieldPath::parse`] and the wildcard-pattern parser in
/// `services::field_ops`, which needs the same tokenizer but tolerates `*`.
pub(crate) fn split_path(raw: &str) -> Result<Vec<String>, PathError> {
    if raw.is_empty() {
        return Err(PathError::Empty);
    }

    let mut segments = Vec::new();
    let mut chars = raw.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                if !in_quotes {
                    // closing quote: the segment just finished is pushed on
                    // the next '.' or end-of-string, same as unquoted ones.
                }
            }
            '.' if !in_quotes => {
                if current.is_empty() {
                    return Err(PathError::EmptySegment(raw.to_string()));
                }
                segments.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }

    if in_quotes {
        return Err(PathError::UnterminatedQuote(raw.to_string()));
    }
    if current.is_empty() {
        return Err(PathError::EmptySegment(raw.to_string()));
    }
    segments.push(current);

    Ok(segments)
}
