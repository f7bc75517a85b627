//! Typed access to one user's persisted state.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use taskchat_core::error::TaskChatError;
use taskchat_core::types::{ChatTurn, Task};

use crate::kv::KeyValueStore;

/// Store key holding the task list.
pub const TASKS_KEY: &str = "tasks";
/// Store key holding the chat transcript.
pub const HISTORY_KEY: &str = "chatHistory";

/// Loads and saves the task list and transcript as JSON documents.
///
/// Absent keys read as empty sequences. Every save writes the whole
/// document, so readers never observe a partial write.
#[derive(Clone)]
pub struct StateRepository {
    store: Arc<dyn KeyValueStore>,
}

impl StateRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load_tasks(&self) -> Result<Vec<Task>, TaskChatError> {
        self.load_list(TASKS_KEY)
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<(), TaskChatError> {
        self.save_list(TASKS_KEY, tasks)
    }

    pub fn load_history(&self) -> Result<Vec<ChatTurn>, TaskChatError> {
        self.load_list(HISTORY_KEY)
    }

    pub fn save_history(&self, history: &[ChatTurn]) -> Result<(), TaskChatError> {
        self.save_list(HISTORY_KEY, history)
    }

    fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, TaskChatError> {
        match self.store.get(key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), TaskChatError> {
        let raw = serde_json::to_string(items)?;
        self.store.put(key, &raw)
    }
}

impl std::fmt::Debug for StateRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRepository").finish()
    }
}
