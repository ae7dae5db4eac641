// SPDX-License-Identifier: MIT

//! Core types of the step graph

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::engine::error::StepError;
use crate::engine::interrupt::Interrupt;
use crate::engine::state::{StatePatch, WorkflowState};

/// Reserved name of the virtual entry step
pub const START: &str = "__start__";
/// Reserved name of the virtual terminal step
pub const END: &str = "__end__";

/// What a step invocation produced
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Continue with this patch merged into the state
    Patch(StatePatch),
    /// Stop the run and wait for the external actor
    Suspend(Interrupt),
}

/// A named unit of workflow logic.
///
/// Steps are shared between sessions and must not keep per-session data.
/// A step with a suspension point is written in two halves: `run` does the
/// work up to the point where it needs outside help and returns
/// `StepOutcome::Suspend`; `resume` is the continuation the executor calls
/// with the external result when the session comes back.
#[async_trait]
pub trait Step: Send + Sync {
    /// Unique name within a graph
    fn name(&self) -> &str;

    /// Before-suspend half (or the whole step, for steps that never suspend)
    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError>;

    /// After-suspend half, invoked with the value the external actor supplied
    async fn resume(&self, state: &WorkflowState, value: Value) -> Result<StepOutcome, StepError> {
        let _ = (state, value);
        Err(StepError::NotResumable(self.name().to_string()))
    }
}

/// Decision function of a conditional edge
pub type RouteFn = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// Outgoing edge of a step
#[derive(Clone)]
pub enum Edge {
    /// Always continue with the named step
    Direct(String),
    /// Ask the router, which must answer with one of `destinations`
    Router {
        destinations: Vec<String>,
        route: RouteFn,
    },
}

impl Edge {
    /// Every name this edge can lead to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(to) => vec![to.as_str()],
            Edge::Router { destinations, .. } => destinations.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(to) => f.debug_tuple("Direct").field(to).finish(),
            Edge::Router { destinations, .. } => f
                .debug_struct("Router")
                .field("destinations", destinations)
                .finish(),
        }
    }
}

/// Helper for steps whose whole job is a pure function of the state
pub struct FnStep<F> {
    name: String,
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(&WorkflowState) -> Result<StatePatch, StepError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&WorkflowState) -> Result<StatePatch, StepError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StepOutcome, StepError> {
        (self.func)(state).map(StepOutcome::Patch)
    }
}
