// SPDX-License-Identifier: MIT

//! The mobile scaffolding workflow graph and its orchestrator

use std::sync::Arc;

use super::config::{CheckpointBackend, ForgeConfig};
use super::routing::{
    build_retry_router, deployment_router, properties_router, setup_validation_router,
    ANDROID_SETUP_RECOVERY, BUILD, BUILD_RECOVERY, BUILD_RETRY_ROUTES, COMPLETION, DEPLOYMENT,
    DEPLOYMENT_ROUTES, EXTRACT_PROPERTIES, FAILURE, GET_USER_INPUT, PLATFORM_CHECK,
    PROJECT_GENERATION, PROPERTIES_ROUTES, SETUP_ROUTES,
};
use super::steps::{
    AndroidSetupRecovery, Build, BuildRecovery, Completion, Deployment, ExtractProperties, Failure,
    ForgeContext, GetUserInput, PlatformCheck, ProjectGeneration,
};
use crate::engine::checkpoint::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
use crate::engine::command::{CommandRunner, ProgressReporter};
use crate::engine::error::GraphError;
use crate::engine::fs::FileSystem;
use crate::engine::graph::{Graph, GraphBuilder, END, START};
use crate::engine::orchestrator::Orchestrator;

pub const WORKFLOW_NAME: &str = "mobile-app-scaffolding";

/// Assemble the workflow graph over `ctx`
pub fn build_workflow(ctx: Arc<ForgeContext>) -> Result<Graph, GraphError> {
    let step_limit = ctx.config.step_limit;

    GraphBuilder::new(WORKFLOW_NAME)
        .step(Arc::new(ExtractProperties))
        .step(Arc::new(GetUserInput))
        .step(Arc::new(PlatformCheck::new(ctx.clone())))
        .step(Arc::new(AndroidSetupRecovery))
        .step(Arc::new(ProjectGeneration::new(ctx.clone())))
        .step(Arc::new(Build::new(ctx.clone())))
        .step(Arc::new(BuildRecovery))
        .step(Arc::new(Deployment::new(ctx)))
        .step(Arc::new(Completion))
        .step(Arc::new(Failure))
        .edge(START, EXTRACT_PROPERTIES)
        .router(EXTRACT_PROPERTIES, &PROPERTIES_ROUTES, properties_router)
        .router(GET_USER_INPUT, &PROPERTIES_ROUTES, properties_router)
        .router(PLATFORM_CHECK, &SETUP_ROUTES, setup_validation_router)
        .edge(ANDROID_SETUP_RECOVERY, PLATFORM_CHECK)
        .edge(PROJECT_GENERATION, BUILD)
        .router(BUILD, &BUILD_RETRY_ROUTES, build_retry_router)
        .edge(BUILD_RECOVERY, BUILD)
        .router(DEPLOYMENT, &DEPLOYMENT_ROUTES, deployment_router)
        .edge(COMPLETION, END)
        .edge(FAILURE, END)
        .step_limit(step_limit)
        .build()
}

/// Checkpoint backend selected by the config
pub fn checkpointer_for(config: &ForgeConfig, fs: Arc<dyn FileSystem>) -> Arc<dyn Checkpointer> {
    match config.checkpoint.backend {
        CheckpointBackend::Memory => Arc::new(MemoryCheckpointer::new()),
        CheckpointBackend::File => {
            Arc::new(FileCheckpointer::new(fs, config.checkpoint.dir.clone()))
        }
    }
}

/// Workflow graph, checkpoint backend and session prefix wired together.
///
/// `progress` receives notifications from platform builds.
pub fn build_orchestrator(
    config: ForgeConfig,
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
    progress: Option<Arc<dyn ProgressReporter>>,
) -> Result<Orchestrator, GraphError> {
    let checkpointer = checkpointer_for(&config, fs.clone());
    let prefix = config.session_prefix.clone();
    let mut ctx = ForgeContext::new(runner, fs, config);
    if let Some(reporter) = progress {
        ctx = ctx.with_progress(reporter);
    }
    let ctx = Arc::new(ctx);
    let graph = build_workflow(ctx)?;
    log::info!("Built workflow '{}'", graph.name());
    Ok(Orchestrator::new(Arc::new(graph), checkpointer).with_session_prefix(prefix))
}
