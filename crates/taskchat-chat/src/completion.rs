//! Text-completion boundary.
//!
//! The engine talks to the model through [`CompletionClient`]. Servers
//! disagree on where the generated text lives in the reply, so responses
//! are decoded into [`CompletionResponse`] and read back through
//! [`CompletionResponse::text`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use taskchat_core::config::CompletionConfig;
use taskchat_core::types::ChatTurn;

use crate::error::ChatError;

/// One message in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

impl CompletionMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

impl From<&ChatTurn> for CompletionMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

/// Sampling options for a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NestedResult {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    pub content: String,
}

/// The shapes a completion reply is known to come in.
///
/// Variants are tried in declaration order; anything unrecognized lands in
/// `Other`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CompletionResponse {
    /// A bare string.
    Text(String),
    /// `{"response": "..."}`
    Response { response: String },
    /// `{"result": {"response": "..."}}`
    Nested { result: NestedResult },
    /// `{"text": "..."}`
    TextField { text: String },
    /// OpenAI chat format: `{"choices": [{"message": {"content": "..."}}]}`
    Choices { choices: Vec<Choice> },
    Other(Value),
}

impl CompletionResponse {
    /// Decode an arbitrary JSON reply. Never fails.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(response) => response,
            Err(_) => Self::Other(value),
        }
    }

    /// The generated text. Unrecognized shapes yield their JSON serialization.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Response { response } => response.clone(),
            Self::Nested { result } => result.response.clone(),
            Self::TextField { text } => text.clone(),
            Self::Choices { choices } => choices
                .first()
                .map(|c| c.message.content.clone())
                .unwrap_or_default(),
            Self::Other(value) => value.to_string(),
        }
    }
}

/// A text-generation service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a reply for `messages`.
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ChatError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "completion"
    }
}

/// Request format for OpenAI-compatible chat completion APIs.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [CompletionMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// Completion client for OpenAI-compatible servers (Ollama, LM Studio, vLLM, hosted APIs).
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// Build a client from configuration.
    pub fn new(config: &CompletionConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ChatError::Completion(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ChatError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        let mut builder = self.client.post(self.url()).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::Completion(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChatError::Completion(format!(
                "API returned status: {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChatError::Completion(format!("Failed to read response: {}", e)))?;

        Ok(CompletionResponse::from_value(body))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
