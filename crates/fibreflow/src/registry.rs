use futures::FutureExt;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

use crate::behavior::AgentBehavior;
use crate::errors::AgentError;
use crate::models::tool::{Tool, ToolCall};

/// Build the payload reported to the model when a tool fails
pub fn error_payload(message: impl Into<String>) -> Value {
    json!({
        "status": "error",
        "message": message.into(),
    })
}

/// Whether a tool result carries the error indicator
pub fn is_error_payload(value: &Value) -> bool {
    value.get("status").and_then(Value::as_str) == Some("error")
        || value.get("error").is_some_and(|error| !error.is_null())
}

/// Declares the tools of one agent behavior and executes them by name.
///
/// `execute` never fails: unknown names, business errors and panics inside an
/// executor all come back as error-shaped JSON.
pub struct ToolRegistry {
    behavior: Box<dyn AgentBehavior>,
}

impl ToolRegistry {
    pub fn new(behavior: Box<dyn AgentBehavior>) -> Self {
        Self { behavior }
    }

    pub fn name(&self) -> &str {
        self.behavior.name()
    }

    pub fn system_prompt(&self) -> &str {
        self.behavior.system_prompt()
    }

    pub fn describe(&self) -> &[Tool] {
        self.behavior.tools()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.describe().iter().any(|tool| tool.name == name)
    }

    pub async fn execute(&self, name: &str, arguments: Value) -> Value {
        if !self.contains(name) {
            warn!(agent = self.name(), tool = name, "model requested an unknown tool");
            return unknown_tool_payload(name);
        }

        let call = ToolCall::new(name, arguments);
        let outcome = AssertUnwindSafe(self.behavior.call(call))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => {
                debug!(agent = self.name(), tool = name, "tool call succeeded");
                value
            }
            Ok(Err(AgentError::ToolNotFound(_))) => unknown_tool_payload(name),
            Ok(Err(err)) => {
                warn!(agent = self.name(), tool = name, error = %err, "tool call failed");
                error_payload(err.to_string())
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tool panicked".to_string());
                warn!(agent = self.name(), tool = name, %reason, "tool call panicked");
                error_payload(format!("Unexpected error: {}", reason))
            }
        }
    }
}

fn unknown_tool_payload(name: &str) -> Value {
    let message = AgentError::ToolNotFound(name.to_string()).to_string();
    json!({
        "status": "error",
        "error": message,
        "message": message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentResult;
    use async_trait::async_trait;

    struct FlakySystem {
        tools: Vec<Tool>,
    }

    impl FlakySystem {
        fn new() -> Self {
            Self {
                tools: vec![
                    Tool::new("ok", "always works", json!({"type": "object"})),
                    Tool::new("fail", "always fails", json!({"type": "object"})),
                    Tool::new("boom", "panics", json!({"type": "object"})),
                    Tool::new("ghost", "declared but not implemented", json!({"type": "object"})),
                ],
            }
        }
    }

    #[async_trait]
    impl AgentBehavior for FlakySystem {
        fn name(&self) -> &str {
            "flaky"
        }

        fn system_prompt(&self) -> &str {
            "You are flaky."
        }

        fn tools(&self) -> &[Tool] {
            &self.tools
        }

        async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
            match tool_call.name.as_str() {
                "ok" => Ok(json!({"status": "success"})),
                "fail" => Err(AgentError::ExecutionError("disk full".into())),
                "boom" => panic!("kaboom"),
                _ => Err(AgentError::ToolNotFound(tool_call.name)),
            }
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Box::new(FlakySystem::new()))
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = registry().execute("ok", json!({})).await;
        assert_eq!(result, json!({"status": "success"}));
        assert!(!is_error_payload(&result));
    }

    #[test]
    fn test_error_indicator() {
        assert!(is_error_payload(&json!({"status": "error"})));
        assert!(is_error_payload(&json!({"error": "boom"})));
        assert!(!is_error_payload(&json!({"status": "success", "error": null})));
        assert!(!is_error_payload(&json!({"documents": []})));
    }

    #[tokio::test]
    async fn test_unregistered_names_return_error_payload() {
        let registry = registry();
        for name in ["", "nope", "OK", "ok ", "flaky__ok"] {
            let result = registry.execute(name, json!({})).await;
            assert!(is_error_payload(&result), "no error for {name:?}");
            assert!(result["error"].as_str().unwrap().contains("Unknown tool"));
        }
    }

    #[tokio::test]
    async fn test_declared_but_unimplemented_tool_is_unknown() {
        let result = registry().execute("ghost", json!({})).await;
        assert_eq!(result["error"], "Unknown tool: ghost");
    }

    #[tokio::test]
    async fn test_business_error_becomes_payload() {
        let result = registry().execute("fail", json!({})).await;
        assert_eq!(result["status"], "error");
        assert!(result["message"].as_str().unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn test_panic_is_caught_at_boundary() {
        let result = registry().execute("boom", json!({})).await;
        assert_eq!(result["status"], "error");
        assert!(result["message"].as_str().unwrap().contains("kaboom"));
    }

    #[test]
    fn test_describe_is_stable() {
        let registry = registry();
        let first: Vec<String> = registry.describe().iter().map(|t| t.name.clone()).collect();
        let second: Vec<String> = registry.describe().iter().map(|t| t.name.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["ok", "fail", "boom", "ghost"]);
    }
}
