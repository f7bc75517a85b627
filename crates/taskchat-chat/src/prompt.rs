//! System prompt and context assembly for the completion model.

use taskchat_core::types::{ChatTurn, Task};

use crate::completion::CompletionMessage;

/// Marker used when the user has no tasks.
pub const NO_TASKS_MARKER: &str = "No tasks yet.";

const OUTPUT_CONTRACT: &str = r#"Respond ONLY with a single valid JSON object in this EXACT format (no markdown, no code blocks):
{
  "reply": "your natural language response to the user",
  "action": "add",
  "taskData": {
    "title": "task title here",
    "description": "task description",
    "priority": "high",
    "status": "pending"
  }
}

OR for queries:
{
  "reply": "your response about their tasks",
  "action": "none"
}

OR for updates and deletions (use the id shown in the task list above):
{
  "reply": "I've updated the task",
  "action": "update",
  "taskData": {
    "id": "task_id_from_list",
    "status": "completed"
  }
}

Rules:
- ALWAYS respond with valid JSON only, no other text
- "action" is one of: add, update, delete, none
- For "add": extract title, description, priority (high/medium/low)
- For "update": include the task id and only the fields that change
- For "delete": include the task id
- For questions about tasks: action is "none"
- Default priority is "medium"
- Be conversational in the "reply" field"#;

/// Human-readable snapshot of the current tasks.
pub fn task_snapshot(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return NO_TASKS_MARKER.to_string();
    }
    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                "{}. [{}] {} ({} priority) id: {}",
                i + 1,
                t.status,
                t.title,
                t.priority,
                t.id
            )
        })
        .collect();
    format!("Current tasks:\n{}", lines.join("\n"))
}

/// The system instruction: role, task snapshot, output contract.
pub fn system_prompt(tasks: &[Task]) -> String {
    format!(
        "You are a helpful task management assistant.\n\n{}\n\n{}",
        task_snapshot(tasks),
        OUTPUT_CONTRACT
    )
}

/// System prompt followed by the last `context_turns` turns of `history`.
pub fn build_messages(
    tasks: &[Task],
    history: &[ChatTurn],
    context_turns: usize,
) -> Vec<CompletionMessage> {
    let start = history.len().saturating_sub(context_turns);
    let mut messages = Vec::with_capacity(history.len() - start + 1);
    messages.push(CompletionMessage::system(system_prompt(tasks)));
    messages.extend(history[start..].iter().map(CompletionMessage::from));
    messages
}
