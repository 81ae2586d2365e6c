use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use fibreflow::agent::ChatOutcome;
use fibreflow::router::{AgentDescriptor, RouteDecision, WorkforceStats};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use super::agent::run_chat;
use crate::error::ApiError;
use crate::state::AppState;

const MAX_TASK_LENGTH: usize = 5000;

#[derive(Debug, Deserialize)]
struct RouteRequest {
    task: String,
    #[serde(default)]
    auto_select: bool,
}

#[derive(Debug, Serialize)]
struct RouteResponse {
    #[serde(flatten)]
    decision: RouteDecision,
    task: String,
    execution_time_ms: u64,
}

#[derive(Debug, Deserialize)]
struct AgentsQuery {
    category: Option<String>,
}

#[derive(Debug, Serialize)]
struct AgentDetail {
    #[serde(flatten)]
    agent: AgentDescriptor,
    runnable: bool,
    explanation: String,
}

#[derive(Debug, Deserialize)]
struct SmartExecuteRequest {
    task: String,
    #[serde(default)]
    max_turns: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SmartExecuteResponse {
    success: bool,
    agent: String,
    agent_name: String,
    confidence: usize,
    matched_keywords: Vec<String>,
    task: String,
    response: String,
    outcome: ChatOutcome,
    model: Option<String>,
    execution_time_ms: u64,
}

fn validate_task(task: &str) -> Result<(), ApiError> {
    let length = task.chars().count();
    if length == 0 || length > MAX_TASK_LENGTH {
        return Err(ApiError::Validation(format!(
            "task must be between 1 and {} characters",
            MAX_TASK_LENGTH
        )));
    }
    Ok(())
}

async fn route_task(
    State(state): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, ApiError> {
    validate_task(&request.task)?;
    let started = Instant::now();

    let router = state.registry.router().await?;
    let decision = router.route(&request.task, request.auto_select);

    let elapsed = started.elapsed();
    state.metrics.record_agent_call(
        "orchestrator",
        "route",
        elapsed.as_secs_f64() * 1000.0,
        true,
        None,
        None,
    );
    tracing::info!(
        elapsed_ms = elapsed.as_millis() as u64,
        selected = ?decision.selected().map(|m| &m.agent_id),
        "routed task"
    );

    Ok(Json(RouteResponse {
        decision,
        task: request.task,
        execution_time_ms: elapsed.as_millis() as u64,
    }))
}

async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<AgentsQuery>,
) -> Result<Json<Vec<AgentDescriptor>>, ApiError> {
    let router = state.registry.router().await?;
    let agents = match query.category.as_deref() {
        Some(category) => router
            .list_agents_in_category(category)
            .into_iter()
            .cloned()
            .collect(),
        None => router.list_agents().to_vec(),
    };
    Ok(Json(agents))
}

async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<AgentDetail>, ApiError> {
    let router = state.registry.router().await?;
    let agent = router
        .get_agent_by_id(&agent_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Agent '{}' not found", agent_id)))?;

    Ok(Json(AgentDetail {
        runnable: AppState::is_runnable(&agent.id),
        explanation: router.explain_capabilities(&agent.id),
        agent,
    }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<WorkforceStats>, ApiError> {
    let router = state.registry.router().await?;
    Ok(Json(router.stats()))
}

/// Route with auto-select, then answer the task on a fresh agent of the chosen id
async fn smart_execute(
    State(state): State<AppState>,
    Json(request): Json<SmartExecuteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_task(&request.task)?;
    let started = Instant::now();

    let router = state.registry.router().await?;
    let decision = router.route(&request.task, true);
    let Some(selected) = decision.selected().cloned() else {
        return Ok(Json(json!({
            "success": false,
            "routing": decision,
            "error": "Could not find suitable agent",
            "execution_time_ms": started.elapsed().as_millis() as u64,
        })));
    };

    let mut agent = state.build_agent(&selected.agent_id)?;
    let reply = run_chat(&state, &mut agent, &request.task, request.max_turns).await?;

    let response = SmartExecuteResponse {
        success: true,
        model: router
            .get_agent_by_id(&selected.agent_id)
            .and_then(|agent| agent.model.clone()),
        agent: selected.agent_id,
        agent_name: selected.agent_name,
        confidence: selected.confidence,
        matched_keywords: selected.matched_keywords,
        task: request.task,
        response: reply.text,
        outcome: reply.outcome,
        execution_time_ms: started.elapsed().as_millis() as u64,
    };
    Ok(Json(json!(response)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orchestrator/route", post(route_task))
        .route("/orchestrator/agents", get(list_agents))
        .route("/orchestrator/agents/:agent_id", get(get_agent))
        .route("/orchestrator/stats", get(stats))
        .route("/orchestrator/smart-execute", post(smart_execute))
}

#[cfg(test)]
mod tests {
    use crate::routes::configure;
    use crate::routes::test_client::{get, post};
    use crate::state::test_support::test_state;
    use axum::http::StatusCode;
    use fibreflow::models::message::Message;
    use fibreflow::providers::base::{ProviderResponse, StopReason};
    use serde_json::json;

    #[tokio::test]
    async fn test_route_returns_decision_and_timing() {
        let (_dir, state) = test_state(vec![]);
        let (status, body) = post(
            configure(state),
            "/orchestrator/route",
            json!({"task": "check cpu usage"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "routed");
        assert_eq!(body["agent"]["agent_id"], "vps-monitor");
        assert_eq!(body["task"], "check cpu usage");
        assert!(body["execution_time_ms"].is_u64());
    }

    #[tokio::test]
    async fn test_route_validates_task_length() {
        let (_dir, state) = test_state(vec![]);
        let app = configure(state);

        let (status, _) = post(app.clone(), "/orchestrator/route", json!({"task": ""})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let long = "x".repeat(5001);
        let (status, _) = post(app, "/orchestrator/route", json!({"task": long})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_route_no_match() {
        let (_dir, state) = test_state(vec![]);
        let (status, body) = post(
            configure(state),
            "/orchestrator/route",
            json!({"task": "tell me a joke", "auto_select": true}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "no_match");
    }

    #[tokio::test]
    async fn test_agents_listing_and_lookup() {
        let (_dir, state) = test_state(vec![]);
        let app = configure(state);

        let (_, all) = get(app.clone(), "/orchestrator/agents").await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, knowledge) = get(app.clone(), "/orchestrator/agents?category=knowledge").await;
        assert_eq!(knowledge[0]["id"], "knowledge-base");
        assert_eq!(knowledge.as_array().unwrap().len(), 1);

        let (status, detail) = get(app.clone(), "/orchestrator/agents/knowledge-base").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["runnable"], true);
        assert!(detail["explanation"]
            .as_str()
            .unwrap()
            .contains("Knowledge Base (knowledge-base)"));

        let (status, body) = get(app, "/orchestrator/agents/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Agent 'ghost' not found");
    }

    #[tokio::test]
    async fn test_stats() {
        let (_dir, state) = test_state(vec![]);
        let (status, body) = get(configure(state), "/orchestrator/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_agents"], 2);
        assert_eq!(body["active_agents"], 2);
        assert_eq!(body["agent_types"]["knowledge"], 1);
    }

    #[tokio::test]
    async fn test_smart_execute_runs_selected_agent() {
        let (_dir, state) = test_state(vec![ProviderResponse::new(
            StopReason::EndTurn,
            Message::assistant().with_text("No documents yet."),
        )]);
        let (status, body) = post(
            configure(state),
            "/orchestrator/smart-execute",
            json!({"task": "which document do we have in the knowledge base?"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["agent"], "knowledge-base");
        assert_eq!(body["confidence"], 2);
        assert_eq!(body["response"], "No documents yet.");
        assert_eq!(body["model"], "claude-3-haiku-20240307");
    }

    #[tokio::test]
    async fn test_smart_execute_without_match_or_behavior() {
        let (_dir, state) = test_state(vec![]);
        let app = configure(state);

        let (status, body) = post(
            app.clone(),
            "/orchestrator/smart-execute",
            json!({"task": "tell me a joke"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["routing"]["status"], "no_match");

        let (status, _) = post(
            app,
            "/orchestrator/smart-execute",
            json!({"task": "check cpu"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
