//! Action extraction for chat messages.
//!
//! Model extraction asks the completion model for a structured reply. The
//! keyword fallback runs whenever no model is configured or the call fails,
//! times out or returns something unreadable, so
//! [`ActionExtractor::propose`] always returns a complete action.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use taskchat_core::config::{ChatConfig, CompletionConfig};
use taskchat_core::types::{ChatTurn, ProposedAction, Task};

use crate::completion::{CompletionClient, CompletionOptions};
use crate::extract::parse_structured_reply;
use crate::fallback::RuleBasedFallback;
use crate::prompt;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONTEXT_TURNS: usize = 10;

/// Produces a [`ProposedAction`] for each chat message.
#[derive(Clone)]
pub struct ActionExtractor {
    client: Option<Arc<dyn CompletionClient>>,
    fallback: RuleBasedFallback,
    options: CompletionOptions,
    timeout: Duration,
    context_turns: usize,
}

impl ActionExtractor {
    /// Extractor that tries `client` first, with default limits.
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client: Some(client),
            fallback: RuleBasedFallback::new(),
            options: CompletionOptions::default(),
            timeout: DEFAULT_TIMEOUT,
            context_turns: DEFAULT_CONTEXT_TURNS,
        }
    }

    /// Extractor that only ever uses the keyword fallback.
    pub fn rule_based() -> Self {
        Self {
            client: None,
            fallback: RuleBasedFallback::new(),
            options: CompletionOptions::default(),
            timeout: DEFAULT_TIMEOUT,
            context_turns: DEFAULT_CONTEXT_TURNS,
        }
    }

    /// Build from configuration. A disabled completion section or a missing
    /// client yields a rule-based extractor.
    pub fn from_config(
        client: Option<Arc<dyn CompletionClient>>,
        completion: &CompletionConfig,
        chat: &ChatConfig,
    ) -> Self {
        let base = match client {
            Some(client) if completion.enabled => Self::new(client),
            _ => Self::rule_based(),
        };
        base.with_options(CompletionOptions {
            temperature: completion.temperature,
            max_tokens: completion.max_tokens,
        })
        .with_timeout(Duration::from_secs(completion.timeout_secs))
        .with_context_turns(chat.context_turns)
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_context_turns(mut self, context_turns: usize) -> Self {
        self.context_turns = context_turns;
        self
    }

    pub fn uses_model(&self) -> bool {
        self.client.is_some()
    }

    /// Decide what to do with `message`.
    ///
    /// `history` should already end with the user's turn for `message`.
    pub async fn propose(
        &self,
        message: &str,
        tasks: &[Task],
        history: &[ChatTurn],
    ) -> ProposedAction {
        let Some(client) = self.client.as_ref() else {
            debug!(source = "keywords", "No completion client configured");
            return self.fallback.propose(message, tasks);
        };

        let messages = prompt::build_messages(tasks, history, self.context_turns);
        let call = client.complete(&messages, self.options);

        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(client = client.name(), error = %e, "Completion call failed, using keyword fallback");
                return self.fallback.propose(message, tasks);
            }
            Err(_) => {
                warn!(
                    client = client.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Completion call timed out, using keyword fallback"
                );
                return self.fallback.propose(message, tasks);
            }
        };

        let text = response.text();
        match parse_structured_reply(&text) {
            Ok(action) => {
                debug!(source = "model", action = %action.action, "Structured reply parsed");
                action
            }
            Err(e) => {
                warn!(error = %e, raw_len = text.len(), "Unreadable completion output, using keyword fallback");
                self.fallback.propose(message, tasks)
            }
        }
    }
}
