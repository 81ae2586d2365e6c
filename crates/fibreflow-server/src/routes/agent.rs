use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use fibreflow::agent::{Agent, ChatOutcome, ChatReply, ToolCallRecord};
use fibreflow::errors::AgentError;
use fibreflow::knowledge_base::KNOWLEDGE_BASE_AGENT_ID;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    max_turns: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    success: bool,
    session_id: String,
    agent: String,
    outcome: ChatOutcome,
    turns: usize,
    tool_calls: Vec<ToolCallRecord>,
    timestamp: DateTime<Utc>,
    query_length: usize,
}

#[derive(Debug, Deserialize)]
struct ResetRequest {
    session_id: String,
}

fn error_kind(err: &AgentError) -> &'static str {
    match err {
        AgentError::ToolNotFound(_) => "tool_not_found",
        AgentError::InvalidParameters(_) => "invalid_parameters",
        AgentError::ExecutionError(_) => "execution_error",
        AgentError::Provider(_) => "provider",
        _ => "internal",
    }
}

/// Run one chat turn and record it in the metrics collector
pub(crate) async fn run_chat(
    state: &AppState,
    agent: &mut Agent,
    message: &str,
    max_turns: Option<usize>,
) -> Result<ChatReply, ApiError> {
    let started = Instant::now();
    let result = agent
        .chat(message, max_turns.unwrap_or(state.max_turns))
        .await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    match &result {
        Ok(reply) => state.metrics.record_agent_call(
            agent.name(),
            "chat",
            duration_ms,
            true,
            reply.usage.total_tokens.and_then(|t| u64::try_from(t).ok()),
            None,
        ),
        Err(err) => state.metrics.record_agent_call(
            agent.name(),
            "chat",
            duration_ms,
            false,
            None,
            Some(error_kind(err)),
        ),
    }

    result.map_err(ApiError::from)
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }

    let agent_id = request
        .agent
        .unwrap_or_else(|| KNOWLEDGE_BASE_AGENT_ID.to_string());
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let agent = state
        .sessions
        .get_or_create(&session_id, &agent_id, || state.build_agent(&agent_id))
        .await?;
    let mut agent = agent.lock().await;

    let reply = run_chat(&state, &mut agent, &request.message, request.max_turns).await?;
    tracing::info!(
        session = %session_id,
        agent = %agent_id,
        turns = reply.turns,
        tools = reply.tool_calls.len(),
        "chat completed"
    );

    Ok(Json(ChatResponse {
        response: reply.text,
        success: true,
        session_id,
        agent: agent_id,
        outcome: reply.outcome,
        turns: reply.turns,
        tool_calls: reply.tool_calls,
        timestamp: Utc::now(),
        query_length: request.message.chars().count(),
    }))
}

async fn reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<Value>, ApiError> {
    let agent = state
        .sessions
        .get(&request.session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session '{}' not found", request.session_id)))?;
    agent.lock().await.reset();

    Ok(Json(json!({
        "status": "reset",
        "session_id": request.session_id,
    })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agent/chat", post(chat))
        .route("/agent/reset", post(reset))
}
