// SPDX-License-Identifier: MIT

//! Mobile app scaffolding on top of the engine
//!
//! Property extraction, toolchain checks, project generation, build with
//! recovery, and deployment to a simulator or emulator.

pub mod bundle;
pub mod config;
pub mod device;
pub mod error;
pub mod keys;
pub mod routing;
pub mod server;
pub mod steps;
pub mod workflow;

pub use config::{ConfigLoader, ForgeConfig};
pub use workflow::{build_orchestrator, build_workflow};
