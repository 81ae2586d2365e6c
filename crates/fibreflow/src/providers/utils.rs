use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::collections::HashSet;

use super::base::{ProviderResponse, StopReason, Usage};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal messages to Anthropic's messages API specification.
///
/// Anthropic has no tool role: tool results travel in a `user` message as
/// `tool_result` blocks whose content is the serialized JSON payload.
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::Assistant => "assistant",
            Role::User | Role::Tool => "user",
        };

        let mut blocks = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        blocks.push(json!({
                            "type": "text",
                            "text": text.text,
                        }));
                    }
                }
                MessageContent::ToolRequest(request) => {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": request.id,
                        "name": request.tool_call.name,
                        "input": request.tool_call.arguments,
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    let content = match &response.output {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    blocks.push(json!({
                        "type": "tool_result",
                        "tool_use_id": response.id,
                        "content": content,
                    }));
                }
            }
        }

        if !blocks.is_empty() {
            messages_spec.push(json!({
                "role": role,
                "content": blocks,
            }));
        }
    }

    messages_spec
}

/// Convert internal Tool format to Anthropic's tool specification
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.input_schema,
        }));
    }

    Ok(result)
}

/// Convert Anthropic's API response to internal Message format
pub fn anthropic_response_to_message(response: &Value) -> Result<ProviderResponse> {
    let blocks = response
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid response format from Anthropic API: missing content"))?;

    let mut message = Message::assistant();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                message = message.with_text(text);
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("tool_use block without an id"))?;
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("tool_use block without a name"))?;
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                message = message.with_tool_request(id, ToolCall::new(name, input));
            }
            other => {
                tracing::debug!(block_type = ?other, "skipping unsupported content block");
            }
        }
    }

    let stop_reason = response
        .get("stop_reason")
        .and_then(Value::as_str)
        .map(|reason| StopReason::from(reason.to_string()))
        .unwrap_or(StopReason::EndTurn);

    Ok(ProviderResponse::new(stop_reason, message))
}

pub fn get_usage(response: &Value) -> Usage {
    let usage = response.get("usage");
    let read = |key: &str| {
        usage
            .and_then(|u| u.get(key))
            .and_then(Value::as_i64)
            .map(|v| v as i32)
    };

    let input_tokens = read("input_tokens");
    let output_tokens = read("output_tokens");
    let total_tokens = match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };

    Usage::new(input_tokens, output_tokens, total_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_results_are_sent_as_user_blocks() {
        let messages = vec![
            Message::user().with_text("check cpu"),
            Message::assistant()
                .with_text("Let me look.")
                .with_tool_request("toolu_1", ToolCall::new("get_cpu", json!({"host": "vps"}))),
            Message::tool().with_tool_response("toolu_1", json!({"cpu": 12.5})),
        ];

        let spec = messages_to_anthropic_spec(&messages);
        assert_eq!(spec.len(), 3);
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"][1]["type"], "tool_use");
        assert_eq!(spec[1]["content"][1]["input"]["host"], "vps");
        assert_eq!(spec[2]["role"], "user");
        assert_eq!(spec[2]["content"][0]["type"], "tool_result");
        assert_eq!(spec[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(spec[2]["content"][0]["content"], r#"{"cpu":12.5}"#);
    }

    #[test]
    fn test_empty_text_is_skipped() {
        let spec = messages_to_anthropic_spec(&[Message::assistant().with_text("")]);
        assert!(spec.is_empty());
    }

    #[test]
    fn test_duplicate_tool_names_are_rejected() {
        let tools = vec![
            Tool::new("a", "first", json!({})),
            Tool::new("a", "second", json!({})),
        ];
        let err = tools_to_anthropic_spec(&tools).unwrap_err();
        assert!(err.to_string().contains("Duplicate tool name: a"));
    }

    #[test]
    fn test_response_with_tool_use() -> Result<()> {
        let response = json!({
            "content": [
                {"type": "text", "text": "Checking."},
                {"type": "tool_use", "id": "toolu_9", "name": "list_documents", "input": {"category": "apps"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 30, "output_tokens": 12}
        });

        let parsed = anthropic_response_to_message(&response)?;
        assert_eq!(parsed.stop_reason, StopReason::ToolUse);
        assert_eq!(parsed.message.text(), "Checking.");

        let requests = parsed.message.tool_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "toolu_9");
        assert_eq!(requests[0].tool_call.name, "list_documents");
        assert_eq!(requests[0].tool_call.arguments, json!({"category": "apps"}));

        assert_eq!(get_usage(&response), Usage::new(Some(30), Some(12), Some(42)));
        Ok(())
    }

    #[test]
    fn test_response_without_content_is_an_error() {
        assert!(anthropic_response_to_message(&json!({"stop_reason": "end_turn"})).is_err());
    }
}
