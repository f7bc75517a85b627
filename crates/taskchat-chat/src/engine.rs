//! Conversational task engine: one user's tasks and transcript.
//!
//! The engine assumes it is the only writer for its user. The registry
//! guarantees that by running each engine inside its own actor.

use chrono::Utc;
use tracing::{debug, info};

use taskchat_core::config::ChatConfig;
use taskchat_core::types::{ChatOutcome, ChatTurn, Task, TaskMutation};
use taskchat_storage::StateRepository;

use crate::error::ChatError;
use crate::extractor::ActionExtractor;
use crate::tasks::TaskCollection;

/// Size limits applied per message and per transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub max_history: usize,
    pub max_message_length: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_history: 50,
            max_message_length: 2000,
        }
    }
}

impl From<&ChatConfig> for EngineLimits {
    fn from(config: &ChatConfig) -> Self {
        Self {
            max_history: config.max_history,
            max_message_length: config.max_message_length,
        }
    }
}

pub struct ConversationalTaskEngine {
    repo: StateRepository,
    extractor: ActionExtractor,
    limits: EngineLimits,
}

impl ConversationalTaskEngine {
    pub fn new(repo: StateRepository, extractor: ActionExtractor, limits: EngineLimits) -> Self {
        Self {
            repo,
            extractor,
            limits,
        }
    }

    /// Current task list in insertion order.
    pub fn list_tasks(&self) -> Result<Vec<Task>, ChatError> {
        Ok(self.repo.load_tasks()?)
    }

    /// Apply `mutation`, persist, and return the resulting list.
    ///
    /// Unknown ids are a no-op; the list is still written back unchanged.
    pub fn mutate_tasks(&self, mutation: TaskMutation) -> Result<Vec<Task>, ChatError> {
        let mut tasks = TaskCollection::new(self.repo.load_tasks()?);
        self.apply_and_save(&mut tasks, mutation)?;
        Ok(tasks.into_inner())
    }

    /// Full stored transcript, oldest first.
    pub fn get_history(&self) -> Result<Vec<ChatTurn>, ChatError> {
        Ok(self.repo.load_history()?)
    }

    /// Handle one chat message end to end.
    ///
    /// Rejecting a blank or over-long message is the only error besides
    /// storage failures. Completion model problems fall back to keywords, and
    /// a rejected message leaves tasks and transcript untouched.
    pub async fn process_chat_message(&self, message: &str) -> Result<ChatOutcome, ChatError> {
        self.validate(message)?;

        let mut history = self.repo.load_history()?;
        let mut tasks = TaskCollection::new(self.repo.load_tasks()?);

        history.push(ChatTurn::user(message, Utc::now().timestamp_millis()));

        let proposed = self
            .extractor
            .propose(message, tasks.list(), &history)
            .await;
        debug!(action = %proposed.action, "Action proposed");

        if let Some(mutation) = proposed.mutation() {
            self.apply_and_save(&mut tasks, mutation)?;
        }

        history.push(ChatTurn::assistant(
            proposed.reply.clone(),
            Utc::now().timestamp_millis(),
        ));
        trim_history(&mut history, self.limits.max_history);
        self.repo.save_history(&history)?;

        Ok(ChatOutcome {
            reply: proposed.reply,
            action: proposed.action,
            tasks: tasks.into_inner(),
        })
    }

    fn validate(&self, message: &str) -> Result<(), ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.limits.max_message_length {
            return Err(ChatError::MessageTooLong(self.limits.max_message_length));
        }
        Ok(())
    }

    fn apply_and_save(
        &self,
        tasks: &mut TaskCollection,
        mutation: TaskMutation,
    ) -> Result<(), ChatError> {
        let kind = mutation.kind();
        let changed = tasks.apply(mutation, Utc::now());
        if changed {
            info!(action = %kind, count = tasks.list().len(), "Tasks updated");
        } else {
            debug!(action = %kind, "Mutation matched no task");
        }
        self.repo.save_tasks(tasks.list())?;
        Ok(())
    }
}

/// Drop the oldest turns so at most `max` remain.
pub(crate) fn trim_history(history: &mut Vec<ChatTurn>, max: usize) {
    if history.len() > max {
        let overflow = history.len() - max;
        history.drain(..overflow);
    }
}
