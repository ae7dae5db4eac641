// SPDX-License-Identifier: MIT

//! Resumable workflow engine
//!
//! Domain-independent pieces: the step graph and its executor, the
//! interrupt/resume protocol, session checkpoints, the orchestrator front door
//! and the collaborators steps talk through (commands, file system).

pub mod capability;
pub mod checkpoint;
pub mod command;
pub mod error;
pub mod fs;
pub mod graph;
pub mod interrupt;
pub mod orchestrator;
pub mod state;

pub use error::EngineError;
