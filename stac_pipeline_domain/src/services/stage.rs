// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Protocols
//!
//! Three capability contracts any stage must satisfy (spec.md §4.3),
//! grounded on the teacher's `FileIOService` trait pattern: async methods on
//! a `Box<dyn Trait>` (stages are owned by exactly one pipeline, never
//! shared, so `&mut self` logger injection is safe without interior
//! mutability), constructed with a validated config object (the concrete
//! `new(config) -> Result<Self, EngineError>` constructor lives on each
//! concrete stage type in `stac_pipeline::application::stages`, not on this
//! trait, since `Self: Sized` constructors aren't object-safe), and a
//! `set_logger` injection point called once before any execution method.

use crate::entities::{ExecutionContext, LoggerName};
use crate::error::EngineError;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// The wire format between stages: a STAC Item (or any partial/skeleton
/// representation of one) as a plain JSON object, never a typed struct
/// (spec.md §3).
pub type Item = serde_json::Map<String, serde_json::Value>;

/// The result of a `Processor::modify` call: either the (possibly-modified)
/// item, or the distinguished "drop" signal. Processors never silently
/// replace an item's identity (spec.md §3 invariant).
#[derive(Debug)]
pub enum Modified {
    Kept(Item),
    Dropped,
}

impl Modified {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Modified::Dropped)
    }

    pub fn into_item(self) -> Option<Item> {
        match self {
            Modified::Kept(item) => Some(item),
            Modified::Dropped => None,
        }
    }
}

/// A finite, pull-based stream of items. `'static` because a `Source`'s
/// stream typically owns cloned config/state rather than borrowing from the
/// stage or the context (matrix-sibling pipelines and checkpoint resume
/// both need to move the stream across an await point / task boundary).
pub type ItemStream = BoxStream<'static, Result<Item, EngineError>>;

/// Produces a finite sequence of items. Two concrete stages: Seed (inline
/// skeleton items) and Ingest (bulk retrieval from file or STAC API).
#[async_trait]
pub trait Source: Send + Sync {
    /// Injects the step-scoped logger name. Called once, before `fetch`.
    fn set_logger(&mut self, logger: LoggerName);

    /// Begins a new pull-based stream of items for this pipeline run.
    async fn fetch(&self, context: &ExecutionContext) -> Result<ItemStream, EngineError>;
}

/// Synchronously transforms one item at a time. Four concrete stages:
/// Update, Validate, Extension, Transform.
///
/// MUST NOT raise for item-scoped data errors when configured for the
/// `collect` failure mode; MUST raise a `DataProcessing`-kind
/// [`EngineError`] when configured for `strict` mode (spec.md §4.3).
#[async_trait]
pub trait Processor: Send + Sync {
    fn set_logger(&mut self, logger: LoggerName);

    async fn modify(&self, item: Item, context: &ExecutionContext) -> Result<Modified, EngineError>;
}

/// Accepts items for eventual persistence and, at `finalize`, flushes and
/// returns a manifest. One concrete stage: Output.
#[async_trait]
pub trait Sink: Send + Sync {
    fn set_logger(&mut self, logger: LoggerName);

    /// Accepts an item for eventual persistence. May flush synchronously
    /// when a buffer threshold is hit.
    async fn bundle(&self, item: Item, context: &ExecutionContext) -> Result<(), EngineError>;

    /// Flushes remaining buffer, writes trailer artifacts, and returns the
    /// manifest (`items_written`, `format`, `output_dir`, plus
    /// format-specific diagnostics).
    async fn finalize(&self, context: &ExecutionContext) -> Result<serde_json::Value, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_into_item_round_trips_kept_variant() {
        let item: Item = serde_json::Map::new();
        let modified = Modified::Kept(item.clone());
        assert_eq!(modified.into_item(), Some(item));
    }

    #[test]
    fn modified_into_item_is_none_for_dropped() {
        assert_eq!(Modified::Dropped.into_item(), None);
    }

    #[test]
    fn is_dropped_reflects_variant() {
        assert!(Modified::Dropped.is_dropped());
        assert!(!Modified::Kept(serde_json::Map::new()).is_dropped());
    }
}
