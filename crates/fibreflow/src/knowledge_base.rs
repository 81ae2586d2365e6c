use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::behavior::AgentBehavior;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};
use crate::prompt_template::load_builtin_prompt;

/// Registry id under which the knowledge base agent is routed
pub const KNOWLEDGE_BASE_AGENT_ID: &str = "knowledge-base";

const DEFAULT_DOCUMENTS_DIR: &str = "~/velocity-fibre-knowledge/documents";
const DEFAULT_CATEGORY: &str = "uncategorized";

/// Expand `~` and environment variables in a user supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

pub fn default_documents_dir() -> PathBuf {
    expand_path(DEFAULT_DOCUMENTS_DIR)
}

#[derive(Serialize)]
struct PromptTool<'a> {
    name: &'a str,
    description: &'a str,
}

/// Agent behavior that keeps a flat directory of categorised documents
pub struct KnowledgeBaseBehavior {
    documents_dir: PathBuf,
    tools: Vec<Tool>,
    system_prompt: String,
}

impl KnowledgeBaseBehavior {
    /// Open (creating if needed) the documents directory
    pub fn new(documents_dir: impl Into<PathBuf>) -> AgentResult<Self> {
        let documents_dir = documents_dir.into();
        std::fs::create_dir_all(&documents_dir).map_err(|e| {
            AgentError::Internal(format!(
                "could not create {}: {}",
                documents_dir.display(),
                e
            ))
        })?;

        let tools = vec![
            Tool::new(
                "list_documents",
                "List all documents in the knowledge base",
                json!({
                    "type": "object",
                    "properties": {
                        "category": {
                            "type": "string",
                            "description": "Optional category to filter documents"
                        }
                    }
                }),
            ),
            Tool::new(
                "add_document",
                "Add a new document to the knowledge base",
                json!({
                    "type": "object",
                    "properties": {
                        "filename": {"type": "string"},
                        "category": {"type": "string"},
                        "content": {"type": "string"}
                    },
                    "required": ["filename", "content"]
                }),
            ),
        ];

        let prompt_tools: Vec<PromptTool> = tools
            .iter()
            .map(|tool| PromptTool {
                name: &tool.name,
                description: &tool.description,
            })
            .collect();
        let system_prompt =
            load_builtin_prompt("knowledge_base.md", &json!({ "tools": prompt_tools }))
                .map_err(|e| AgentError::Internal(e.to_string()))?;

        Ok(Self {
            documents_dir,
            tools,
            system_prompt,
        })
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    async fn list_documents(&self, arguments: &Value) -> AgentResult<Value> {
        let category = arguments
            .get("category")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty());

        let mut entries = fs::read_dir(&self.documents_dir)
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;

        let mut documents = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if category.map_or(true, |c| name.contains(c)) {
                documents.push(name);
            }
        }
        documents.sort();

        Ok(json!({ "documents": documents }))
    }

    async fn add_document(&self, arguments: &Value) -> AgentResult<Value> {
        let filename = arguments
            .get("filename")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::InvalidParameters("filename is required".to_string()))?;
        let content = arguments
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::InvalidParameters("content is required".to_string()))?;
        let category = arguments
            .get("category")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);
        if !is_plain_category(category) {
            return Err(AgentError::InvalidParameters(format!(
                "'{}' is not a valid category",
                category
            )));
        }

        // Only the final path component of the file name is kept
        let basename = Path::new(filename)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AgentError::InvalidParameters(format!("'{}' is not a file name", filename))
            })?;

        let filepath = self
            .documents_dir
            .join(format!("{}_{}", category, basename));
        fs::write(&filepath, content)
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        info!(path = %filepath.display(), "added document");

        Ok(json!({
            "status": "success",
            "filepath": filepath.to_string_lossy(),
            "filename": basename,
        }))
    }
}

/// A category becomes a file name prefix, so it must not name another directory
fn is_plain_category(category: &str) -> bool {
    !category.contains(['/', '\\']) && !category.contains("..")
}

#[async_trait]
impl AgentBehavior for KnowledgeBaseBehavior {
    fn name(&self) -> &str {
        KNOWLEDGE_BASE_AGENT_ID
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        match tool_call.name.as_str() {
            "list_documents" => self.list_documents(&tool_call.arguments).await,
            "add_document" => self.add_document(&tool_call.arguments).await,
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}
