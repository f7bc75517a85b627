//! In-memory task collection and its mutation rules.

use chrono::{DateTime, Utc};

use taskchat_core::types::{Task, TaskData, TaskMutation};

const UNTITLED: &str = "Untitled Task";

/// Ordered task list owned by one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCollection {
    tasks: Vec<Task>,
}

impl TaskCollection {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_inner(self) -> Vec<Task> {
        self.tasks
    }

    /// Apply `mutation`, returning whether the collection changed.
    ///
    /// Updates and deletes naming an unknown id leave the collection as is.
    pub fn apply(&mut self, mutation: TaskMutation, now: DateTime<Utc>) -> bool {
        match mutation {
            TaskMutation::Add(data) => {
                let id = self.next_id(now);
                self.tasks.push(new_task(id, data, now));
                true
            }
            TaskMutation::Update { id, changes } => match self.position(&id) {
                Some(index) => {
                    overwrite(&mut self.tasks[index], changes);
                    true
                }
                None => false,
            },
            TaskMutation::Delete { id } => match self.position(&id) {
                Some(index) => {
                    self.tasks.remove(index);
                    true
                }
                None => false,
            },
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Epoch-millisecond id, bumped past the largest numeric id already
    /// present so ids stay unique and increasing within one millisecond.
    fn next_id(&self, now: DateTime<Utc>) -> String {
        let candidate = now.timestamp_millis().max(0) as u64;
        let highest = self
            .tasks
            .iter()
            .filter_map(|t| t.id.parse::<u64>().ok())
            .max();
        let mut id = match highest {
            Some(h) if h >= candidate => h + 1,
            _ => candidate,
        };
        // Non-numeric ids (imported data) can still collide in principle.
        while self.position(&id.to_string()).is_some() {
            id += 1;
        }
        id.to_string()
    }
}

fn new_task(id: String, data: TaskData, now: DateTime<Utc>) -> Task {
    let title = data
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    Task {
        id,
        title,
        description: data.description.unwrap_or_default(),
        priority: data.priority.unwrap_or_default(),
        status: data.status.unwrap_or_default(),
        created_at: now,
    }
}

/// Shallow field overwrite. The id is never touched.
fn overwrite(task: &mut Task, changes: TaskData) {
    if let Some(title) = changes.title {
        task.title = title;
    }
    if let Some(description) = changes.description {
        task.description = description;
    }
    if let Some(priority) = changes.priority {
        task.priority = priority;
    }
    if let Some(status) = changes.status {
        task.status = status;
    }
}
