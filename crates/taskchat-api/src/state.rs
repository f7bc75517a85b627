//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use taskchat_chat::EngineRegistry;
use taskchat_core::config::TaskChatConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. Per-user
/// state lives behind the registry's actors, so nothing here needs a lock.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TaskChatConfig>,
    pub registry: Arc<EngineRegistry>,
    /// Whether chat messages go to the completion model first.
    pub model_enabled: bool,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: TaskChatConfig, registry: EngineRegistry) -> Self {
        let model_enabled = config.completion.enabled;
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            model_enabled,
            start_time: Instant::now(),
        }
    }

    pub fn with_model_enabled(mut self, enabled: bool) -> Self {
        self.model_enabled = enabled;
        self
    }

    /// User key applied when a request does not name one.
    pub fn default_user(&self) -> &str {
        &self.config.chat.default_user
    }
}
