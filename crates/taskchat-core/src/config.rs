use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Top-level configuration for the taskchat service.
///
/// Loaded from `~/.taskchat/config.toml` by default. Missing sections and
/// fields fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl TaskChatConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TaskChatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// HTTP server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.taskchat/data".to_string(),
            log_level: "info".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Conversation handling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum number of turns kept in the stored transcript.
    pub max_history: usize,
    /// Number of recent turns sent to the completion service as context.
    pub context_turns: usize,
    /// Maximum accepted chat message length in characters.
    pub max_message_length: usize,
    /// User key used when a request carries no `X-User-Id` header.
    pub default_user: String,
    /// Seconds a user's engine may sit idle before it is stopped and its
    /// registry slot freed.
    pub idle_ttl_secs: u64,
    /// Pending requests allowed per user before callers wait.
    pub queue_depth: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            context_turns: 10,
            max_message_length: 2000,
            default_user: "demo-user".to_string(),
            idle_ttl_secs: 900,
            queue_depth: 32,
        }
    }
}

/// Text-completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// When false, every chat message is handled by the keyword fallback.
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible server.
    pub endpoint: String,
    /// Model name passed to the server.
    pub model: String,
    /// Optional bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on a single completion call, after which the fallback runs.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.3".to_string(),
            api_key: None,
            temperature: 0.5,
            max_tokens: 512,
            timeout_secs: 30,
        }
    }
}
