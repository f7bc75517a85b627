//! Deterministic keyword-based action extraction.
//!
//! Used whenever the completion model is unavailable or its reply cannot be
//! read. Only does string work over the message and the already-loaded
//! tasks, so it cannot fail.

use std::sync::LazyLock;

use regex::Regex;

use taskchat_core::types::{ActionKind, ProposedAction, Task, TaskData, TaskPriority, TaskStatus};

// =============================================================================
// Keyword sets
// =============================================================================

const ADD_KEYWORDS: &[&str] = &["add", "create"];
const COMPLETE_KEYWORDS: &[&str] = &["complete", "done", "finish"];
const LIST_KEYWORDS: &[&str] = &["what", "show", "list"];

/// Lead-in phrases stripped from an add request to leave the title.
/// Longer phrases come first so they win at the same position.
static LEAD_IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)add a task to |create a task to |add task |create task |add |create ")
        .unwrap()
});

const DEFAULT_TITLE: &str = "New Task";

pub const NO_TASKS_TO_COMPLETE: &str = "You don't have any tasks to complete.";
pub const NO_TASKS_YET: &str = "You don't have any tasks yet. Try saying 'Add a task to...'";
pub const CAPABILITY_HINT: &str = "I can help you add, complete, or view tasks. Try: 'Add a task to buy groceries' or 'What are my tasks?'";

// =============================================================================
// RuleBasedFallback
// =============================================================================

/// Keyword matcher producing a fully populated [`ProposedAction`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedFallback;

impl RuleBasedFallback {
    pub fn new() -> Self {
        Self
    }

    /// Classify `message` against the current `tasks`.
    ///
    /// Rules are checked in order: add/create, complete/done/finish,
    /// what/show/list, then a capability hint. Matching is case-insensitive
    /// substring search.
    pub fn propose(&self, message: &str, tasks: &[Task]) -> ProposedAction {
        let lower = message.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if mentions(ADD_KEYWORDS) {
            return self.propose_add(message, &lower);
        }
        if mentions(COMPLETE_KEYWORDS) {
            return self.propose_complete(tasks);
        }
        if mentions(LIST_KEYWORDS) {
            return ProposedAction::reply_only(describe_tasks(tasks));
        }
        ProposedAction::reply_only(CAPABILITY_HINT)
    }

    fn propose_add(&self, message: &str, lower: &str) -> ProposedAction {
        let title = extract_title(message);
        let priority = infer_priority(lower);

        ProposedAction {
            action: ActionKind::Add,
            reply: format!("I've created a {} priority task: \"{}\"", priority, title),
            task_data: Some(TaskData {
                id: None,
                title: Some(title),
                description: Some(String::new()),
                priority: Some(priority),
                status: Some(TaskStatus::Pending),
            }),
        }
    }

    /// Always targets the first task in the collection.
    fn propose_complete(&self, tasks: &[Task]) -> ProposedAction {
        match tasks.first() {
            Some(task) => ProposedAction {
                action: ActionKind::Update,
                reply: format!("I've marked \"{}\" as complete!", task.title),
                task_data: Some(TaskData {
                    id: Some(task.id.clone()),
                    status: Some(TaskStatus::Completed),
                    ..TaskData::default()
                }),
            },
            None => ProposedAction::reply_only(NO_TASKS_TO_COMPLETE),
        }
    }
}

/// Strip the first lead-in phrase from `message`.
pub fn extract_title(message: &str) -> String {
    let title = LEAD_IN_RE.replace(message, "");
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// `high` beats `low`; anything else is medium.
pub fn infer_priority(lower_message: &str) -> TaskPriority {
    if lower_message.contains("high") {
        TaskPriority::High
    } else if lower_message.contains("low") {
        TaskPriority::Low
    } else {
        TaskPriority::Medium
    }
}

/// One-line enumeration of `tasks`.
pub fn describe_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return NO_TASKS_YET.to_string();
    }
    let items: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {} ({}, {})", i + 1, t.title, t.priority, t.status))
        .collect();
    format!("You have {} task(s): {}", tasks.len(), items.join(", "))
}
