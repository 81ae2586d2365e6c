use serde::{Deserialize, Serialize};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::behavior::AgentBehavior;
use crate::conversation::Conversation;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, ToolRequest};
use crate::providers::base::{Provider, ProviderResponse, StopReason, Usage};
use crate::registry::{is_error_payload, ToolRegistry};
use crate::state::DomainState;

/// Model round-trips allowed per `chat` call unless the caller asks otherwise
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Reply text used when the turn budget runs out before the model finishes
pub const TURNS_EXHAUSTED: &str = "Maximum conversation turns reached.";

/// Domain state keys written after every completed chat
pub const LAST_CHAT_AT: &str = "last_chat_at";
pub const LAST_OUTCOME: &str = "last_outcome";

/// How a `chat` call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ChatOutcome {
    Completed,
    TurnsExhausted,
    UnexpectedStop(String),
}

/// One tool execution performed while answering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub result: Value,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    pub outcome: ChatOutcome,
    /// Model round-trips used
    pub turns: usize,
    pub tool_calls: Vec<ToolCallRecord>,
    pub usage: Usage,
}

/// Agent pairs a model provider with one behavior's tools and keeps the conversation
pub struct Agent {
    registry: ToolRegistry,
    provider: Box<dyn Provider>,
    conversation: Conversation,
    state: Option<DomainState>,
}

impl Agent {
    pub fn new(behavior: Box<dyn AgentBehavior>, provider: Box<dyn Provider>) -> Self {
        Self {
            registry: ToolRegistry::new(behavior),
            provider,
            conversation: Conversation::new(),
            state: None,
        }
    }

    /// Attach domain memory, saved after every completed chat
    pub fn with_state(mut self, state: DomainState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn name(&self) -> &str {
        self.registry.name()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn history_len(&self) -> usize {
        self.conversation.len()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.conversation.last()
    }

    pub fn state(&self) -> Option<&DomainState> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut DomainState> {
        self.state.as_mut()
    }

    /// Forget the conversation. Domain state is kept.
    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    /// Drive one user turn to completion, running tools the model asks for
    /// until it answers or `max_turns` round-trips have been spent.
    pub async fn chat(&mut self, user_message: &str, max_turns: usize) -> AgentResult<ChatReply> {
        if user_message.trim().is_empty() {
            return Err(AgentError::InvalidParameters(
                "message must not be empty".to_string(),
            ));
        }
        if max_turns == 0 {
            return Err(AgentError::InvalidParameters(
                "max_turns must be at least 1".to_string(),
            ));
        }

        self.conversation
            .push(Message::user().with_text(user_message));

        let system = self.registry.system_prompt().to_string();
        let tools = self.registry.describe().to_vec();
        let mut tool_calls = Vec::new();
        let mut usage = Usage::default();

        for turn in 1..=max_turns {
            let (response, turn_usage) = self
                .provider
                .complete(&system, self.conversation.messages(), &tools)
                .await
                .map_err(|e| AgentError::Provider(e.to_string()))?;
            accumulate(&mut usage, &turn_usage);

            let ProviderResponse {
                stop_reason,
                message,
            } = response;
            debug!(agent = self.name(), turn, %stop_reason, "model responded");

            match stop_reason {
                StopReason::ToolUse if message.has_tool_requests() => {
                    let requests: Vec<ToolRequest> =
                        message.tool_requests().into_iter().cloned().collect();
                    self.conversation.push(message);

                    let mut results = Message::tool();
                    for request in requests {
                        let ToolRequest { id, tool_call } = request;
                        let result = self
                            .registry
                            .execute(&tool_call.name, tool_call.arguments.clone())
                            .await;
                        tool_calls.push(ToolCallRecord {
                            id: id.clone(),
                            name: tool_call.name,
                            arguments: tool_call.arguments,
                            is_error: is_error_payload(&result),
                            result: result.clone(),
                        });
                        results = results.with_tool_response(id, result);
                    }
                    self.conversation.push(results);
                }
                StopReason::EndTurn | StopReason::ToolUse => {
                    let text = message.text();
                    self.conversation.push(message);
                    return Ok(self.finish(text, ChatOutcome::Completed, turn, tool_calls, usage));
                }
                StopReason::Other(reason) => {
                    warn!(agent = self.name(), %reason, "model stopped unexpectedly");
                    self.conversation.push(message);
                    return Ok(self.finish(
                        format!("Unexpected stop reason: {}", reason),
                        ChatOutcome::UnexpectedStop(reason),
                        turn,
                        tool_calls,
                        usage,
                    ));
                }
            }
        }

        info!(agent = self.name(), max_turns, "turn budget exhausted");
        Ok(self.finish(
            TURNS_EXHAUSTED.to_string(),
            ChatOutcome::TurnsExhausted,
            max_turns,
            tool_calls,
            usage,
        ))
    }

    fn finish(
        &mut self,
        text: String,
        outcome: ChatOutcome,
        turns: usize,
        tool_calls: Vec<ToolCallRecord>,
        usage: Usage,
    ) -> ChatReply {
        if let Some(state) = &mut self.state {
            state.set(LAST_CHAT_AT, json!(Utc::now().to_rfc3339()));
            state.set(LAST_OUTCOME, json!(outcome));
            state.save();
        }
        ChatReply {
            text,
            outcome,
            turns,
            tool_calls,
            usage,
        }
    }
}

fn accumulate(total: &mut Usage, turn: &Usage) {
    fn add(a: Option<i32>, b: Option<i32>) -> Option<i32> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        }
    }
    total.input_tokens = add(total.input_tokens, turn.input_tokens);
    total.output_tokens = add(total.output_tokens, turn.output_tokens);
    total.total_tokens = add(total.total_tokens, turn.total_tokens);
}
