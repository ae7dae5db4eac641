// SPDX-License-Identifier: MIT

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::orchestrator::Orchestrator;

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/workflow", post(handle_workflow))
        .route("/api/sessions/{id}", get(get_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

pub async fn serve(
    port: u16,
    orchestrator: Arc<Orchestrator>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(orchestrator);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Body is the inbound envelope; anything else starts a new session
async fn handle_workflow(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    match orchestrator.handle(payload).await {
        Ok(response) => match serde_json::to_value(response) {
            Ok(body) => Json(body),
            Err(e) => Json(json!({"error": e.to_string()})),
        },
        Err(e) => {
            log::error!("Workflow invocation failed: {}", e);
            Json(json!({"error": e.to_string()}))
        }
    }
}

async fn get_session(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> Json<Value> {
    match orchestrator.checkpointer().load(&id).await {
        Ok(Some(checkpoint)) => match serde_json::to_value(checkpoint) {
            Ok(body) => Json(body),
            Err(e) => Json(json!({"error": e.to_string()})),
        },
        Ok(None) => Json(json!({"error": "Session not found"})),
        Err(e) => Json(json!({"error": e.to_string()})),
    }
}
