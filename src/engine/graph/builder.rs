// SPDX-License-Identifier: MIT

//! Graph builder - assembles and validates a step graph

use std::collections::HashMap;
use std::sync::Arc;

use super::executor::Graph;
use super::types::{Edge, Step, END, START};
use crate::engine::error::GraphError;
use crate::engine::state::WorkflowState;

/// Default safety limit on steps executed by a single run
pub const DEFAULT_STEP_LIMIT: usize = 100;

/// Incrementally describes a graph; `build` validates it.
pub struct GraphBuilder {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    edges: Vec<(String, Edge)>,
    step_limit: usize,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            edges: Vec::new(),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Unconditional edge `from -> to`
    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.edges.push((from.to_string(), Edge::Direct(to.to_string())));
        self
    }

    /// Conditional edge: after `from`, `route` picks one of `destinations`
    pub fn router<F, R>(mut self, from: &str, destinations: &[&str], route: F) -> Self
    where
        F: Fn(&WorkflowState) -> R + Send + Sync + 'static,
        R: Into<String>,
    {
        self.edges.push((
            from.to_string(),
            Edge::Router {
                destinations: destinations.iter().map(|d| d.to_string()).collect(),
                route: Arc::new(move |state| route(state).into()),
            },
        ));
        self
    }

    pub fn step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Validate and freeze the graph
    pub fn build(self) -> Result<Graph, GraphError> {
        let mut steps: HashMap<String, Arc<dyn Step>> = HashMap::new();
        for step in self.steps {
            let name = step.name().to_string();
            if name == START || name == END {
                return Err(GraphError::ReservedName(name));
            }
            if steps.insert(name.clone(), step).is_some() {
                return Err(GraphError::DuplicateStep(name));
            }
        }

        let mut edges: HashMap<String, Edge> = HashMap::new();
        for (from, edge) in self.edges {
            if from != START && !steps.contains_key(&from) {
                return Err(GraphError::UnknownSource(from));
            }
            if let Edge::Router { destinations, .. } = &edge {
                if destinations.is_empty() {
                    return Err(GraphError::EmptyRouter(from));
                }
            }
            for to in edge.targets() {
                let known = to == END || steps.contains_key(to);
                if !known {
                    return Err(GraphError::UnknownTarget {
                        from: from.clone(),
                        to: to.to_string(),
                    });
                }
            }
            if edges.contains_key(&from) {
                return Err(GraphError::DuplicateEdge(from));
            }
            edges.insert(from, edge);
        }

        if !edges.contains_key(START) {
            return Err(GraphError::MissingEntry);
        }

        let mut names: Vec<&String> = steps.keys().collect();
        names.sort();
        if let Some(dead_end) = names.into_iter().find(|name| !edges.contains_key(*name)) {
            return Err(GraphError::DeadEnd(dead_end.clone()));
        }

        log::info!("Built graph '{}' with {} steps", self.name, steps.len());

        Ok(Graph::new(self.name, steps, edges, self.step_limit))
    }
}
