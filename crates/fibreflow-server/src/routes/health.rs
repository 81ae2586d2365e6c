use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

async fn root() -> Json<Value> {
    Json(json!({
        "service": "FibreFlow Agent Orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "route": "/orchestrator/route (POST)",
            "smart_execute": "/orchestrator/smart-execute (POST)",
            "agents": "/orchestrator/agents (GET)",
            "stats": "/orchestrator/stats (GET)",
            "chat": "/agent/chat (POST)",
            "reset": "/agent/reset (POST)",
            "metrics": "/metrics (GET)",
            "health": "/health (GET)"
        }
    }))
}

async fn health(State(state): State<AppState>) -> Response {
    match state.registry.router().await {
        Ok(router) => Json(json!({
            "status": "healthy",
            "total_agents": router.list_agents().len(),
            "registry_loaded": true,
            "timestamp": Utc::now(),
        }))
        .into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "error": err.to_string(),
                "timestamp": Utc::now(),
            })),
        )
            .into_response(),
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}
