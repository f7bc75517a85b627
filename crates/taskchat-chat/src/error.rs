//! Error types for the conversational engine.

use taskchat_core::error::TaskChatError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("completion error: {0}")]
    Completion(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
}

impl From<TaskChatError> for ChatError {
    fn from(err: TaskChatError) -> Self {
        ChatError::Storage(err.to_string())
    }
}
