use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ProviderResponse, StopReason, Usage};

/// A request the mock provider received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
}

enum Script {
    Sequence(VecDeque<Result<ProviderResponse, String>>),
    Repeat(ProviderResponse),
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone)]
pub struct MockProvider {
    script: Arc<Mutex<Script>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::from_script(Script::Sequence(responses.into_iter().map(Ok).collect()))
    }

    /// Create a mock provider whose responses may include failures
    pub fn with_results(responses: Vec<Result<ProviderResponse, String>>) -> Self {
        Self::from_script(Script::Sequence(responses.into_iter().collect()))
    }

    /// Create a mock provider that answers every request with the same response
    pub fn repeating(response: ProviderResponse) -> Self {
        Self::from_script(Script::Repeat(response))
    }

    fn from_script(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(ProviderResponse, Usage)> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?
            .push(RecordedRequest {
                system: system.to_string(),
                messages: messages.to_vec(),
                tools: tools.to_vec(),
            });

        let mut script = self
            .script
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?;
        let next = match &mut *script {
            Script::Repeat(response) => Ok(response.clone()),
            // Return an empty final answer once the script runs out
            Script::Sequence(responses) => responses.pop_front().unwrap_or_else(|| {
                Ok(ProviderResponse::new(
                    StopReason::EndTurn,
                    Message::assistant().with_text(""),
                ))
            }),
        };

        next.map(|response| (response, Usage::default()))
            .map_err(|err| anyhow!(err))
    }
}
