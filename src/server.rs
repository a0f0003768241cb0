//! HTTP boundary — maps web payloads onto the workflow.
//!
//! Framing only: everything interesting happens in the orchestrator.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::domain::{AgentOutput, EmailInput};
use crate::workflow::Orchestrator;

/// Build the inbound router.
pub fn routes(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/inbound", post(inbound))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

async fn inbound(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(input): Json<EmailInput>,
) -> Json<AgentOutput> {
    info!(sender = %input.sender, thread_id = %input.thread_id, "Inbound email received");
    let state = orchestrator.run(input).await;
    Json(state.into_output())
}

async fn health() -> &'static str {
    "ok"
}
