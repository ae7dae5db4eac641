// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! This module provides the step graph: named steps joined by direct or
//! routed edges, and the executor that walks it one step at a time until a
//! step suspends or END is reached.

mod builder;
pub mod executor;
pub mod types;

pub use builder::{GraphBuilder, DEFAULT_STEP_LIMIT};
pub use executor::{Entry, Graph, RunResult, Suspension};
pub use types::{Edge, FnStep, RouteFn, Step, StepOutcome, END, START};
