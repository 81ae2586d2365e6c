use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Who authored a message
pub enum Role {
    User,
    Assistant,
    /// Carries the results of tool invocations back to the model
    #[serde(rename = "tool_result")]
    Tool,
}
