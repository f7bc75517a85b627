//! Route handler functions for all API endpoints.
//!
//! Handlers resolve the caller's user key, forward the operation to that
//! user's engine actor, and return its result as JSON.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{Method, Uri};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use taskchat_core::types::{ActionKind, ChatOutcome, ChatTurn, Task, TaskData, TaskMutation};

use crate::error::ApiError;
use crate::state::AppState;
use crate::user::UserKey;

// =============================================================================
// Request / response types
// =============================================================================

/// Body of `POST /tasks`.
///
/// Task fields may sit at the top level; for `update`, fields inside
/// `updates` take precedence over them.
#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub action: String,
    #[serde(default)]
    pub updates: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TaskRequest {
    /// Convert into a typed mutation, rejecting unknown actions and
    /// update/delete requests without an id.
    pub fn into_mutation(self) -> Result<TaskMutation, ApiError> {
        let mut data = TaskData::from_value(&Value::Object(self.fields)).unwrap_or_default();
        let target = data.id.take();

        match ActionKind::from_name(&self.action) {
            Some(ActionKind::Add) => Ok(TaskMutation::Add(data)),
            Some(ActionKind::Update) => {
                let id = target.ok_or_else(|| missing_id("update"))?;
                if let Some(updates) = self.updates.as_ref().and_then(TaskData::from_value) {
                    data.merge(updates);
                }
                data.id = None;
                Ok(TaskMutation::Update { id, changes: data })
            }
            Some(ActionKind::Delete) => Ok(TaskMutation::Delete {
                id: target.ok_or_else(|| missing_id("delete"))?,
            }),
            _ => Err(ApiError::BadRequest(format!(
                "unknown action '{}', expected add, update or delete",
                self.action
            ))),
        }
    }
}

fn missing_id(action: &str) -> ApiError {
    ApiError::BadRequest(format!("{} requires an id", action))
}

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_users: usize,
    pub model_enabled: bool,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /tasks - the caller's task list.
pub async fn list_tasks(
    State(state): State<AppState>,
    user: UserKey,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.registry.list_tasks(user.as_str()).await?))
}

/// POST /tasks - add, update or delete one task; returns the full list.
pub async fn mutate_tasks(
    State(state): State<AppState>,
    user: UserKey,
    payload: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let Json(request) = payload?;
    let mutation = request.into_mutation()?;
    debug!(user = %user.as_str(), action = %mutation.kind(), "Task mutation requested");

    Ok(Json(
        state
            .registry
            .mutate_tasks(user.as_str(), mutation)
            .await?,
    ))
}

/// POST /chat - run one chat message through the engine.
pub async fn chat(
    State(state): State<AppState>,
    user: UserKey,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let Json(request) = payload?;
    debug!(user = %user.as_str(), len = request.message.len(), "Chat message received");

    let outcome = state
        .registry
        .process_chat_message(user.as_str(), &request.message)
        .await?;
    Ok(Json(outcome))
}

/// GET /history - the caller's full transcript.
pub async fn history(
    State(state): State<AppState>,
    user: UserKey,
) -> Result<Json<Vec<ChatTurn>>, ApiError> {
    Ok(Json(state.registry.get_history(user.as_str()).await?))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_users: state.registry.active_users(),
        model_enabled: state.model_enabled,
    })
}

/// Fallback for paths with no route.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::MethodNotAllowed(format!("{} is not supported on {}", method, uri.path()))
}
