use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AgentResult;
use crate::models::tool::{Tool, ToolCall};

/// The capabilities that make one agent different from another.
///
/// The conversation loop in [`crate::agent::Agent`] is shared; each agent variant only
/// supplies its prompt, the tools it exposes and how to run them.
#[async_trait]
pub trait AgentBehavior: Send + Sync {
    /// Get the name of the agent variant
    fn name(&self) -> &str;

    /// Get the system prompt sent with every model request
    fn system_prompt(&self) -> &str;

    /// Get available tools. Must return the same list for the lifetime of the behavior.
    fn tools(&self) -> &[Tool];

    /// Run a tool with the given arguments.
    ///
    /// Business failures are returned as `Err`; an unrecognised name should produce
    /// [`crate::errors::AgentError::ToolNotFound`]. The registry turns both into
    /// error-shaped payloads so the conversation can carry on.
    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value>;
}
