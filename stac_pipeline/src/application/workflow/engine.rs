// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Engine
//!
//! Drives a compiled [`stac_pipeline_domain::entities::Workflow`] to
//! completion (spec.md §4.11): builds the DAG, walks it in topological
//! order, expands each step's matrix into sibling lanes, constructs the
//! concrete stage for each lane, and wires it into that lane's item stream.
//!
//! A *lane* is one live pipeline instance (`stream::empty()` until a Source
//! step starts it, `stream::empty()` again once a Sink step drains it). The
//! engine keeps `Vec<Lane>` rather than a single stream because a matrix
//! step multiplies one lane into several that from then on run
//! independently -- normally there is exactly one lane. Matrix-sibling
//! lanes for the same step run concurrently via `tokio::spawn`, matching
//! the teacher's `Arc`+`tokio::sync::RwLock` shared-worker-state pattern;
//! a single lane runs its step directly, since spec.md §5 mandates
//! single-threaded cooperative scheduling within one pipeline.

use bootstrap::shutdown::CancellationToken;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use stac_pipeline_domain::entities::{ExecutionContext, FailureRecord, Step, StepModule};
use stac_pipeline_domain::error::{EngineError, ErrorKind};
use stac_pipeline_domain::services::{Item, ItemStream, Modified, Processor, Sink, Source};
use stac_pipeline_domain::value_objects::StepId;
use std::sync::Arc;

use crate::application::stages::{
    extension::Extension, ingest::Ingest, output::Output, seed::Seed, transform::Transform, update::Update,
    validate::Validate,
};

use super::dag;
use super::matrix;

/// End-of-run counters for the one-line summary spec.md §7 requires:
/// `failed: N, succeeded: M, skipped: K`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Total `items_written` across every Sink manifest produced this run.
    pub succeeded: usize,
    /// Total failure records in the failure collector at run end.
    pub failed: usize,
    /// Number of step executions skipped because checkpoint resume found
    /// them already complete.
    pub skipped: usize,
    /// Whether any lane aborted (strict `DataProcessingError`, an
    /// `Unexpected` error, or an external cancellation request).
    pub aborted: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        !self.aborted && self.failed == 0
    }

    /// Renders the exact log line shape spec.md §7 names.
    pub fn log_line(&self) -> String {
        format!("failed: {}, succeeded: {}, skipped: {}", self.failed, self.succeeded, self.skipped)
    }
}

/// One live pipeline instance: its own fork of the run's [`ExecutionContext`]
/// and its own item stream.
struct Lane {
    context: ExecutionContext,
    stream: ItemStream,
}

struct LaneStepResult {
    lane: Lane,
    skipped: bool,
    items_written: usize,
}

pub struct WorkflowEngine {
    root: ExecutionContext,
    cancellation: CancellationToken,
}

impl WorkflowEngine {
    pub fn new(root: ExecutionContext, cancellation: CancellationToken) -> Self {
        Self { root, cancellation }
    }

    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        let workflow = Arc::clone(&self.root.config);
        let order = dag::topological_order(&workflow.steps)?;
        let resume = workflow.settings.checkpoint.enabled;

        let mut lanes = vec![Lane {
            context: self.root.clone(),
            stream: stream::empty().boxed(),
        }];
        let mut succeeded = 0usize;
        let mut skipped = 0usize;
        let mut aborted = false;

        for step_id in &order {
            if lanes.is_empty() || self.cancellation.is_cancelled() {
                aborted = aborted || self.cancellation.is_cancelled();
                break;
            }

            let step = workflow
                .step(step_id)
                .expect("topological order only names steps present in the workflow")
                .clone();

            let fanned = fan_out(&step, lanes).await;

            let outcomes: Vec<Result<LaneStepResult, EngineError>> = if fanned.len() > 1 {
                let mut handles = Vec::with_capacity(fanned.len());
                for (lane_step_id, lane) in fanned {
                    let step = step.clone();
                    let cancellation = self.cancellation.clone();
                    handles.push(tokio::spawn(run_lane_step(step, lane_step_id, lane, resume, cancellation)));
                }
                let mut results = Vec::with_capacity(handles.len());
                for handle in handles {
                    results.push(match handle.await {
                        Ok(outcome) => outcome,
                        Err(join_err) => Err(EngineError::internal_error(format!("lane task panicked: {join_err}"))),
                    });
                }
                results
            } else {
                let mut results = Vec::with_capacity(1);
                for (lane_step_id, lane) in fanned {
                    results.push(run_lane_step(step.clone(), lane_step_id, lane, resume, self.cancellation.clone()).await);
                }
                results
            };

            let mut next_lanes = Vec::new();
            let mut workflow_abort: Option<EngineError> = None;
            for outcome in outcomes {
                match outcome {
                    Ok(result) => {
                        if result.skipped {
                            skipped += 1;
                        }
                        succeeded += result.items_written;
                        next_lanes.push(result.lane);
                    }
                    Err(e) => {
                        if e.kind() == ErrorKind::Configuration && workflow_abort.is_none() {
                            workflow_abort = Some(e.clone());
                        }
                        // An error raised deep in a lazily-composed processor
                        // stream only surfaces once the Sink drains it, so
                        // `step` here may just be whichever stage happened to
                        // be pulling -- prefer the attribution the error
                        // itself carries (see `EngineError::attributed`).
                        let (record_step_id, record_item_id) = match e.attribution() {
                            Some((origin_step_id, origin_item_id)) => {
                                (origin_step_id.to_string(), origin_item_id.map(str::to_string))
                            }
                            None => (step.id.as_str().to_string(), None),
                        };
                        self.root
                            .failure_collector
                            .record(FailureRecord::new(record_step_id, record_item_id, e.kind().error_type(), e.to_string()))
                            .await;
                        aborted = true;
                    }
                }
            }
            if let Some(e) = workflow_abort {
                return Err(e);
            }
            lanes = next_lanes;
        }

        let failed = self.root.failure_collector.len().await;
        let summary = RunSummary {
            succeeded,
            failed,
            skipped,
            aborted,
        };
        tracing::info!("{}: {}", self.root.logger.as_str(), summary.log_line());
        Ok(summary)
    }
}

/// Fans `lanes` out across `step`'s matrix coordinates. The common case
/// (no matrix, or a matrix already fully expanded by an earlier step) is a
/// 1:1 passthrough that moves each lane's stream without touching it. A
/// step that actually declares `N > 1` coordinates forces the lane's
/// stream to be materialized once so every sibling gets its own copy --
/// unavoidable since a [`futures::stream::BoxStream`] cannot be cloned.
async fn fan_out(step: &Step, lanes: Vec<Lane>) -> Vec<(StepId, Lane)> {
    let mut fanned = Vec::with_capacity(lanes.len());
    for lane in lanes {
        let instances = matrix::expand(step, &lane.context);
        if instances.len() == 1 {
            let instance = instances.into_iter().next().expect("checked len == 1");
            fanned.push((
                instance.step_id,
                Lane {
                    context: instance.context,
                    stream: lane.stream,
                },
            ));
        } else {
            let materialized: Vec<Result<Item, EngineError>> = lane.stream.collect().await;
            for instance in instances {
                fanned.push((
                    instance.step_id,
                    Lane {
                        context: instance.context,
                        stream: stream::iter(materialized.clone()).boxed(),
                    },
                ));
            }
        }
    }
    fanned
}

/// Runs one step for one lane: checkpoint-skip check, stage construction,
/// stream wiring, and (on success) marking the step complete.
async fn run_lane_step(
    step: Step,
    effective_step_id: StepId,
    mut lane: Lane,
    resume: bool,
    cancellation: CancellationToken,
) -> Result<LaneStepResult, EngineError> {
    if resume {
        let snapshot = lane.context.checkpoint_manager.load().await?;
        if snapshot.is_complete(effective_step_id.as_str()) {
            if step.module.is_source() {
                lane.stream = stream::empty().boxed();
            }
            return Ok(LaneStepResult {
                lane,
                skipped: true,
                items_written: 0,
            });
        }
    }

    if cancellation.is_cancelled() {
        return Err(EngineError::Cancelled(format!(
            "workflow cancelled before step '{effective_step_id}'"
        )));
    }

    let config_value = Value::Object(step.config.clone());
    match run_stage(&step, &effective_step_id, &mut lane, &config_value, &cancellation).await {
        Ok(items_written) => {
            lane.context.checkpoint_manager.mark_complete(effective_step_id.as_str()).await?;
            Ok(LaneStepResult {
                lane,
                skipped: false,
                items_written,
            })
        }
        Err(e) => {
            cancellation.cancel();
            Err(e)
        }
    }
}

async fn run_stage(
    step: &Step,
    effective_step_id: &StepId,
    lane: &mut Lane,
    config_value: &Value,
    cancellation: &CancellationToken,
) -> Result<usize, EngineError> {
    let step_logger = lane.context.logger.for_step(effective_step_id.as_str());

    if step.module.is_source() {
        let mut source = construct_source(step.module, config_value).await?;
        source.set_logger(step_logger);
        lane.stream = source.fetch(&lane.context).await?;
        Ok(0)
    } else if step.module.is_processor() {
        let mut processor = construct_processor(step.module, config_value).await?;
        processor.set_logger(step_logger);
        let processor: Arc<dyn Processor> = Arc::from(processor);

        let ctx = lane.context.clone();
        let cancel = cancellation.clone();
        let step_id = effective_step_id.clone();
        let upstream = std::mem::replace(&mut lane.stream, stream::empty().boxed());
        lane.stream = upstream
            .then(move |item_result| {
                let processor = Arc::clone(&processor);
                let ctx = ctx.clone();
                let cancel = cancel.clone();
                let step_id = step_id.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Err(EngineError::Cancelled(format!("workflow cancelled during step '{step_id}'")));
                    }
                    let item = item_result?;
                    let item_id = item.get("id").and_then(Value::as_str).map(str::to_string);
                    match processor.modify(item, &ctx).await {
                        Ok(Modified::Kept(item)) => Ok(Some(item)),
                        Ok(Modified::Dropped) => Ok(None),
                        Err(e) => Err(EngineError::attributed(step_id.as_str(), item_id, e)),
                    }
                }
            })
            .filter_map(|result: Result<Option<Item>, EngineError>| async move {
                match result {
                    Ok(Some(item)) => Some(Ok(item)),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            })
            .boxed();
        Ok(0)
    } else {
        debug_assert!(step.module.is_sink());
        let mut sink = construct_sink(step.module, config_value).await?;
        sink.set_logger(step_logger);

        let mut upstream = std::mem::replace(&mut lane.stream, stream::empty().boxed());
        let mut written = 0usize;
        while let Some(item_result) = upstream.next().await {
            if cancellation.is_cancelled() {
                return Err(EngineError::Cancelled(format!("workflow cancelled during step '{effective_step_id}'")));
            }
            let item = item_result?;
            sink.bundle(item, &lane.context).await?;
            written += 1;
        }

        let manifest = sink.finalize(&lane.context).await?;
        let items_written = manifest
            .get("items_written")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(written);
        lane.context.publish(effective_step_id.as_str(), manifest);
        Ok(items_written)
    }
}

async fn construct_source(module: StepModule, config: &Value) -> Result<Box<dyn Source>, EngineError> {
    match module {
        StepModule::SeedModule => Ok(Box::new(Seed::new(config)?)),
        StepModule::IngestModule => Ok(Box::new(Ingest::new(config)?)),
        other => Err(EngineError::invalid_config(format!("'{}' is not a Source stage", other.as_str()))),
    }
}

async fn construct_processor(module: StepModule, config: &Value) -> Result<Box<dyn Processor>, EngineError> {
    match module {
        StepModule::UpdateModule => Ok(Box::new(Update::new(config).await?)),
        StepModule::ValidateModule => Ok(Box::new(Validate::new(config).await?)),
        StepModule::ExtensionModule => Ok(Box::new(Extension::new(config).await?)),
        StepModule::TransformModule => Ok(Box::new(Transform::new(config).await?)),
        other => Err(EngineError::invalid_config(format!("'{}' is not a Processor stage", other.as_str()))),
    }
}

async fn construct_sink(module: StepModule, config: &Value) -> Result<Box<dyn Sink>, EngineError> {
    match module {
        StepModule::OutputModule => Ok(Box::new(Output::new(config)?)),
        other => Err(EngineError::invalid_config(format!("'{}' is not a Sink stage", other.as_str()))),
    }
}
