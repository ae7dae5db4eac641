// SPDX-License-Identifier: MIT

//! Graph workflow executor

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{Edge, Step, StepOutcome, END, START};
use crate::engine::error::EngineError;
use crate::engine::interrupt::Interrupt;
use crate::engine::state::WorkflowState;

/// Where a run begins
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Fresh run from the START edge
    Start,
    /// Hand `value` to the continuation of the step that suspended
    Resume { step: String, value: Value },
}

/// A run that stopped to wait for the external actor
#[derive(Debug, Clone, PartialEq)]
pub struct Suspension {
    pub session_id: String,
    /// Step whose continuation receives the resume value
    pub step: String,
    pub interrupt: Interrupt,
    /// State at the suspension point, to be checkpointed
    pub state: WorkflowState,
}

/// Outcome of [`Graph::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    Suspended(Suspension),
    Completed(WorkflowState),
}

/// Validated step graph, built with [`super::GraphBuilder`]
pub struct Graph {
    name: String,
    steps: HashMap<String, Arc<dyn Step>>,
    edges: HashMap<String, Edge>,
    step_limit: usize,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut steps: Vec<&String> = self.steps.keys().collect();
        steps.sort();
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("steps", &steps)
            .field("step_limit", &self.step_limit)
            .finish_non_exhaustive()
    }
}

impl Graph {
    pub(super) fn new(
        name: String,
        steps: HashMap<String, Arc<dyn Step>>,
        edges: HashMap<String, Edge>,
        step_limit: usize,
    ) -> Self {
        Self {
            name,
            steps,
            edges,
            step_limit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Resolve the edge leaving `from`, using the post-merge state for routers
    fn next_step(&self, from: &str, state: &WorkflowState) -> Result<String, EngineError> {
        let edge = self
            .edges
            .get(from)
            .ok_or_else(|| EngineError::UnknownStep(from.to_string()))?;

        match edge {
            Edge::Direct(to) => Ok(to.clone()),
            Edge::Router {
                destinations,
                route,
            } => {
                let choice = route(state);
                if !destinations.iter().any(|d| *d == choice) {
                    log::error!(
                        "Router after '{}' chose '{}', expected one of {:?}",
                        from,
                        choice,
                        destinations
                    );
                    return Err(EngineError::UnknownRoute {
                        from: from.to_string(),
                        route: choice,
                    });
                }
                log::info!("Routing {} -> {}", from, choice);
                Ok(choice)
            }
        }
    }

    /// Advance a session until a step suspends or END is reached.
    ///
    /// Steps run strictly one at a time. A failing step aborts the run and its
    /// output is discarded; the caller's last checkpoint stays valid.
    pub async fn run(
        &self,
        session_id: &str,
        state: WorkflowState,
        entry: Entry,
    ) -> Result<RunResult, EngineError> {
        let mut state = state;
        let (mut cursor, mut resume_value) = match entry {
            Entry::Start => (self.next_step(START, &state)?, None),
            Entry::Resume { step, value } => (step, Some(value)),
        };

        let mut executed = 0;
        loop {
            if cursor == END {
                log::info!("Graph '{}' completed session {}", self.name, session_id);
                return Ok(RunResult::Completed(state));
            }

            executed += 1;
            if executed > self.step_limit {
                log::error!(
                    "Graph '{}' exceeded {} steps for session {}",
                    self.name,
                    self.step_limit,
                    session_id
                );
                return Err(EngineError::StepLimitExceeded {
                    limit: self.step_limit,
                });
            }

            let step = self
                .steps
                .get(&cursor)
                .ok_or_else(|| EngineError::UnknownStep(cursor.clone()))?;

            let outcome = match resume_value.take() {
                Some(value) => {
                    log::info!("Resuming step: {}", cursor);
                    step.resume(&state, value).await
                }
                None => {
                    log::info!("Executing step: {}", cursor);
                    step.run(&state).await
                }
            };

            let outcome = outcome.map_err(|e| {
                log::error!("Step {} failed: {}", cursor, e);
                EngineError::step(cursor.clone(), e)
            })?;

            match outcome {
                StepOutcome::Suspend(interrupt) => {
                    log::info!(
                        "Step {} suspended session {} ({})",
                        cursor,
                        session_id,
                        interrupt.kind()
                    );
                    return Ok(RunResult::Suspended(Suspension {
                        session_id: session_id.to_string(),
                        step: cursor,
                        interrupt,
                        state,
                    }));
                }
                StepOutcome::Patch(patch) => {
                    state = state.merge(patch);
                    log::info!("Step {} completed", cursor);
                    cursor = self.next_step(&cursor, &state)?;
                }
            }
        }
    }
}
