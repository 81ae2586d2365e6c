use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::message::Message;
use crate::models::role::Role;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversationError {
    #[error("message {index}: tool results must follow an assistant message with tool requests")]
    OrphanedToolResults { index: usize },

    #[error("message {index}: tool result '{id}' does not answer a pending request")]
    UnmatchedToolResult { index: usize, id: String },

    #[error("message {index}: expected a result for request '{expected}' but found '{found}'")]
    OutOfOrderToolResult {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("message {index}: tool requests were not answered before the next message")]
    UnansweredToolRequests { index: usize },
}

/// Ordered, append-only history of a single agent's exchange with the model.
///
/// The only mutations are [`Conversation::push`] and [`Conversation::reset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Truncate the history to empty
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Check that every tool-result message immediately follows the assistant message
    /// whose requests it answers, one result per request, in issue order.
    ///
    /// A trailing assistant message with unanswered requests is accepted: it is the
    /// state left behind when the model call for the next turn failed.
    pub fn validate(&self) -> Result<(), ConversationError> {
        let mut pending: Option<Vec<&str>> = None;

        for (index, message) in self.messages.iter().enumerate() {
            if message.role == Role::Tool {
                let requested = pending
                    .take()
                    .ok_or(ConversationError::OrphanedToolResults { index })?;
                let responses = message.tool_responses();

                for (position, response) in responses.iter().enumerate() {
                    match requested.get(position) {
                        Some(expected) if *expected == response.id => {}
                        Some(expected) if requested.contains(&response.id.as_str()) => {
                            return Err(ConversationError::OutOfOrderToolResult {
                                index,
                                expected: expected.to_string(),
                                found: response.id.clone(),
                            });
                        }
                        _ => {
                            return Err(ConversationError::UnmatchedToolResult {
                                index,
                                id: response.id.clone(),
                            });
                        }
                    }
                }
                if responses.len() != requested.len() {
                    return Err(ConversationError::UnansweredToolRequests { index });
                }
                continue;
            }

            if pending.is_some() {
                return Err(ConversationError::UnansweredToolRequests { index });
            }
            if message.role == Role::Assistant && message.has_tool_requests() {
                pending = Some(
                    message
                        .tool_requests()
                        .into_iter()
                        .map(|request| request.id.as_str())
                        .collect(),
                );
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
