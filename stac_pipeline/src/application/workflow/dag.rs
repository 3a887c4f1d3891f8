// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DAG Construction
//!
//! Builds a dependency graph from each step's `depends_on` list and
//! computes a topological order (spec.md §4.11). Matrix expansion happens
//! one layer up, in [`super::matrix`]; this module only ever sees the
//! un-expanded step list, since sibling instances of a matrix step share
//! one rank in the dependency graph.

use stac_pipeline_domain::entities::Step;
use stac_pipeline_domain::error::EngineError;
use stac_pipeline_domain::value_objects::StepId;
use std::collections::{HashMap, HashSet};

/// Computes the topological execution order of `steps`, grouped into ranks:
/// every step in a rank depends only on steps in earlier ranks, so within a
/// rank there is no further dependency ordering. The engine still executes
/// steps one at a time within a single pipeline (spec.md §4.11: "steps
/// execute in rank order sequentially"); ranks only matter for validating
/// that a well-formed order exists and for surfacing it to callers that
/// want to reason about parallelism.
pub fn topological_order(steps: &[Step]) -> Result<Vec<StepId>, EngineError> {
    let ids: HashSet<&StepId> = steps.iter().map(|s| &s.id).collect();
    let mut indegree: HashMap<StepId, usize> = HashMap::new();
    let mut dependents: HashMap<StepId, Vec<StepId>> = HashMap::new();

    for step in steps {
        indegree.entry(step.id.clone()).or_insert(0);
        for dep in &step.depends_on {
            if !ids.contains(dep) {
                return Err(EngineError::invalid_config(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                )));
            }
            *indegree.entry(step.id.clone()).or_insert(0) += 1;
            dependents.entry(dep.clone()).or_default().push(step.id.clone());
        }
    }

    let mut ready: Vec<StepId> = indegree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| id.clone())
        .collect();
    ready.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    let mut order = Vec::with_capacity(steps.len());
    let mut queue = std::collections::VecDeque::from(ready);

    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        if let Some(children) = dependents.get(&id) {
            let mut newly_ready = Vec::new();
            for child in children {
                let deg = indegree.get_mut(child).expect("child tracked in indegree");
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(child.clone());
                }
            }
            newly_ready.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            queue.extend(newly_ready);
        }
    }

    if order.len() != steps.len() {
        let stuck: Vec<String> = steps
            .iter()
            .map(|s| s.id.as_str().to_string())
            .filter(|id| !order.iter().any(|done| done.as_str() == id))
            .collect();
        return Err(EngineError::CyclicDependency(stuck.join(", ")));
    }

    Ok(order)
}
