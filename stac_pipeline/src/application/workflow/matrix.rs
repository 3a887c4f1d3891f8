// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Matrix Expansion
//!
//! Turns a step's `matrix` specification into sibling step instances, one
//! per Cartesian-product coordinate (spec.md §4.11). Each sibling gets a
//! distinct [`StepId`] (`step[axis=value,...]`) and a forked
//! [`ExecutionContext`] whose `data` carries the coordinate, so a Source or
//! Processor reading e.g. `context.data["collection"]` sees the value for
//! its own sibling only.

use serde_json::Value;
use stac_pipeline_domain::entities::{ExecutionContext, Step};
use stac_pipeline_domain::value_objects::StepId;
use std::collections::{BTreeMap, HashMap};

/// One sibling pipeline instance: its own step id and its own forked
/// context. A step with no `matrix` expands to exactly one lane, carrying
/// the step's own id unchanged.
pub struct MatrixInstance {
    pub step_id: StepId,
    pub context: ExecutionContext,
}

/// Expands `step` against `context`, which is the lane's context *before*
/// this step runs. `context` is forked once per coordinate (or once, with
/// an empty overlay, when `step` has no matrix).
pub fn expand(step: &Step, context: &ExecutionContext) -> Vec<MatrixInstance> {
    let coordinates = step.matrix_coordinates();
    if coordinates.is_empty() {
        return vec![MatrixInstance {
            step_id: step.id.clone(),
            context: context.fork(HashMap::new()),
        }];
    }

    coordinates
        .into_iter()
        .map(|coordinate| {
            let suffix = coordinate_suffix(&coordinate);
            let overlay: HashMap<String, Value> = coordinate.into_iter().collect();
            let mut forked = context.fork(overlay);
            forked.logger = context.logger.for_matrix_coordinate(&suffix);
            MatrixInstance {
                step_id: step.id.with_matrix_coordinate(&suffix),
                context: forked,
            }
        })
        .collect()
}

/// Renders a coordinate as `axis=value,axis=value`, sorted by axis name
/// (the map is already a `BTreeMap` so iteration order is deterministic).
/// String values are rendered bare; other scalars fall back to their JSON
/// text form.
fn coordinate_suffix(coordinate: &BTreeMap<String, Value>) -> String {
    coordinate
        .iter()
        .map(|(axis, value)| format!("{axis}={}", plain_string(value)))
        .collect::<Vec<_>>()
        .join(",")
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stac_pipeline_domain::entities::{
        CheckpointSettings, FailureRecord, LoggingSettings, StepModule, Workflow, WorkflowSettings,
    };
    use stac_pipeline_domain::error::EngineError;
    use stac_pipeline_domain::repositories::{CheckpointManager, CheckpointSnapshot, FailureCollector};
    use stac_pipeline_domain::value_objects::WorkflowId;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoopFailureCollector;
    #[async_trait]
    impl FailureCollector for NoopFailureCollector {
        async fn record(&self, _failure: FailureRecord) {}
        async fn all(&self) -> Vec<FailureRecord> {
            Vec::new()
        }
    }

    struct NoopCheckpointManager;
    #[async_trait]
    impl CheckpointManager for NoopCheckpointManager {
        async fn load(&self) -> Result<CheckpointSnapshot, EngineError> {
            Ok(CheckpointSnapshot::default())
        }
        async fn mark_complete(&self, _step_id: &str) -> Result<(), EngineError> {
            Ok(())
        }
        async fn save_cursor(&self, _step_id: &str, _cursor: Value) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(
            WorkflowId::new("run-1").unwrap(),
            Arc::new(Workflow {
                name: "test".into(),
                settings: WorkflowSettings {
                    logging: LoggingSettings::default(),
                    variables: Default::default(),
                    checkpoint: CheckpointSettings::default(),
                },
                steps: Vec::new(),
            }),
            Arc::new(NoopFailureCollector),
            Arc::new(NoopCheckpointManager),
        )
    }

    fn step(matrix: Option<stac_pipeline_domain::entities::MatrixSpec>) -> Step {
        Step {
            id: StepId::new("ingest").unwrap(),
            module: StepModule::IngestModule,
            config: Default::default(),
            depends_on: Vec::new(),
            matrix,
            log_level: None,
        }
    }

    #[test]
    fn no_matrix_yields_a_single_lane_with_the_original_step_id() {
        let lanes = expand(&step(None), &context());
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes[0].step_id.as_str(), "ingest");
    }

    #[test]
    fn two_axis_values_yield_two_lanes_with_disjoint_coordinates() {
        let mut matrix = stac_pipeline_domain::entities::MatrixSpec::new();
        matrix.insert("collection".into(), vec!["A".into(), "B".into()]);
        let lanes = expand(&step(Some(matrix)), &context());

        assert_eq!(lanes.len(), 2);
        let ids: Vec<&str> = lanes.iter().map(|l| l.step_id.as_str()).collect();
        assert!(ids.contains(&"ingest[collection=A]"));
        assert!(ids.contains(&"ingest[collection=B]"));

        for lane in &lanes {
            assert!(lane.context.data.contains_key("collection"));
        }
    }

    #[test]
    fn forked_lanes_do_not_see_each_others_coordinate() {
        let mut matrix = stac_pipeline_domain::entities::MatrixSpec::new();
        matrix.insert("collection".into(), vec!["A".into(), "B".into()]);
        let lanes = expand(&step(Some(matrix)), &context());
        let a = lanes.iter().find(|l| l.step_id.as_str() == "ingest[collection=A]").unwrap();
        assert_eq!(a.context.data["collection"], Value::String("A".into()));
    }

    #[test]
    fn matrix_coordinate_extends_the_logger_hierarchy() {
        let mut matrix = stac_pipeline_domain::entities::MatrixSpec::new();
        matrix.insert("collection".into(), vec!["A".into()]);
        let lanes = expand(&step(Some(matrix)), &context());
        assert_eq!(lanes[0].context.logger.as_str(), "engine.test.collection=A");
    }
}
