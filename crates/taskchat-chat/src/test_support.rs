//! Scripted completion clients shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::completion::{CompletionClient, CompletionMessage, CompletionOptions, CompletionResponse};
use crate::error::ChatError;

/// Replays queued replies in order and records every request.
///
/// Once the queue is empty every call fails.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<CompletionResponse, String>>>,
    seen: Mutex<Vec<Vec<CompletionMessage>>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Client whose single reply is `text`.
    pub fn replying(text: &str) -> Arc<Self> {
        let client = Self::new();
        client.push_text(text);
        client
    }

    pub fn push_text(&self, text: &str) {
        self.push(Ok(CompletionResponse::Text(text.to_string())));
    }

    pub fn push_error(&self, message: &str) {
        self.push(Err(message.to_string()));
    }

    pub fn push(&self, reply: Result<CompletionResponse, String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<Vec<CompletionMessage>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ChatError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply.map_err(ChatError::Completion),
            None => Err(ChatError::Completion("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Never answers within any reasonable timeout.
pub struct StalledClient;

#[async_trait]
impl CompletionClient for StalledClient {
    async fn complete(
        &self,
        _messages: &[CompletionMessage],
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ChatError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(CompletionResponse::Text("{}".to_string()))
    }
}
