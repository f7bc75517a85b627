//! Integration tests for the taskchat HTTP API.
//!
//! Each test builds its own router over an in-memory SQLite database and
//! drives it with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use taskchat_api::create_router;
use taskchat_api::error::ErrorBody;
use taskchat_api::handlers::HealthResponse;
use taskchat_api::state::AppState;
use taskchat_chat::{
    ActionExtractor, ChatError, CompletionClient, CompletionMessage, CompletionOptions,
    CompletionResponse, ConversationalTaskEngine, EngineLimits, EngineRegistry,
};
use taskchat_core::config::TaskChatConfig;
use taskchat_core::types::{ChatTurn, Task};
use taskchat_storage::{Database, ScopedStore, StateRepository};

// =============================================================================
// Helpers
// =============================================================================

/// Completion service that always answers with the same text.
struct FixedReply(&'static str);

#[async_trait]
impl CompletionClient for FixedReply {
    async fn complete(
        &self,
        _messages: &[CompletionMessage],
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ChatError> {
        Ok(CompletionResponse::Text(self.0.to_string()))
    }
}

/// Completion service that is always down.
struct Unreachable;

#[async_trait]
impl CompletionClient for Unreachable {
    async fn complete(
        &self,
        _messages: &[CompletionMessage],
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ChatError> {
        Err(ChatError::Completion("connection refused".to_string()))
    }
}

fn make_state_with(client: Option<Arc<dyn CompletionClient>>) -> AppState {
    let config = TaskChatConfig::default();
    let db = Arc::new(Database::in_memory().unwrap());
    let limits = EngineLimits::from(&config.chat);
    let extractor = ActionExtractor::from_config(client, &config.completion, &config.chat);

    let registry = EngineRegistry::new(
        move |user_key: &str| -> Result<ConversationalTaskEngine, ChatError> {
            let store = ScopedStore::new(Arc::clone(&db), user_key);
            Ok(ConversationalTaskEngine::new(
                StateRepository::new(Arc::new(store)),
                extractor.clone(),
                limits,
            ))
        },
    );
    AppState::new(config, registry)
}

/// Router whose completion service is down, so chat uses keyword rules.
fn make_app() -> axum::Router {
    create_router(make_state_with(Some(Arc::new(Unreachable))))
}

fn get_as(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json_as(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let resp = make_app().oneshot(get_as("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = body_json(resp).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_users, 0);
    assert!(health.model_enabled);
}

// =============================================================================
// Tasks
// =============================================================================

#[tokio::test]
async fn test_tasks_empty_by_default() {
    let resp = make_app().oneshot(get_as("/tasks", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let tasks: Vec<Task> = body_json(resp).await;
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_task_add_update_delete() {
    let app = make_app();

    let resp = app
        .clone()
        .oneshot(post_json_as(
            "/tasks",
            Some("alice"),
            json!({"action": "add", "title": "Buy milk", "priority": "high"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let tasks: Vec<Value> = body_json(resp).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "Buy milk");
    assert_eq!(tasks[0]["priority"], "high");
    assert_eq!(tasks[0]["status"], "pending");
    assert!(tasks[0]["createdAt"].is_string());
    let id = tasks[0]["id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(post_json_as(
            "/tasks",
            Some("alice"),
            json!({"action": "update", "id": id, "updates": {"status": "completed"}}),
        ))
        .await
        .unwrap();
    let tasks: Vec<Task> = body_json(resp).await;
    assert_eq!(tasks[0].id, id);
    assert_eq!(tasks[0].title, "Buy milk");
    assert_eq!(tasks[0].status.as_str(), "completed");

    let resp = app
        .clone()
        .oneshot(post_json_as(
            "/tasks",
            Some("alice"),
            json!({"action": "delete", "id": id}),
        ))
        .await
        .unwrap();
    let tasks: Vec<Task> = body_json(resp).await;
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_task_update_unknown_id_is_noop() {
    let app = make_app();
    app.clone()
        .oneshot(post_json_as(
            "/tasks",
            None,
            json!({"action": "add", "title": "Walk dog"}),
        ))
        .await
        .unwrap();

    let before = body_bytes(app.clone().oneshot(get_as("/tasks", None)).await.unwrap()).await;

    let resp = app
        .clone()
        .oneshot(post_json_as(
            "/tasks",
            None,
            json!({"action": "update", "id": "does-not-exist", "updates": {"title": "x"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, before);
}

#[tokio::test]
async fn test_task_unknown_action_is_bad_request() {
    let resp = make_app()
        .oneshot(post_json_as("/tasks", None, json!({"action": "archive", "id": "1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(resp).await;
    assert_eq!(body.error, "bad_request");
    assert!(body.message.contains("archive"));
}

#[tokio::test]
async fn test_task_malformed_json_is_bad_request() {
    let req = Request::post("/tasks")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = make_app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(resp).await;
    assert_eq!(body.error, "bad_request");
}

// =============================================================================
// Chat and history
// =============================================================================

#[tokio::test]
async fn test_chat_falls_back_when_model_down() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(post_json_as(
            "/chat",
            None,
            json!({"message": "Add a task to buy milk"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["action"], "add");
    assert_eq!(body["tasks"][0]["title"], "buy milk");
    assert_eq!(body["tasks"][0]["priority"], "medium");
    assert!(body["reply"].as_str().unwrap().contains("buy milk"));

    let resp = app.oneshot(get_as("/history", None)).await.unwrap();
    let history: Vec<ChatTurn> = body_json(resp).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "Add a task to buy milk");
}

#[tokio::test]
async fn test_chat_uses_model_reply() {
    let client: Arc<dyn CompletionClient> = Arc::new(FixedReply(
        "Sure! ```json\n{\"reply\":\"ok\",\"action\":\"none\"}\n```",
    ));
    let app = create_router(make_state_with(Some(client)));

    let resp = app
        .oneshot(post_json_as("/chat", None, json!({"message": "add a task to nap"})))
        .await
        .unwrap();
    let body: Value = body_json(resp).await;
    assert_eq!(body["reply"], "ok");
    assert_eq!(body["action"], "none");
    assert_eq!(body["tasks"], json!([]));
}

#[tokio::test]
async fn test_chat_without_model() {
    let app = create_router(make_state_with(None));
    let resp = app
        .oneshot(post_json_as("/chat", None, json!({"message": "what are my tasks"})))
        .await
        .unwrap();
    let body: Value = body_json(resp).await;
    assert_eq!(body["action"], "none");
    assert!(body["reply"].as_str().unwrap().contains("don't have any tasks yet"));
}

#[tokio::test]
async fn test_chat_empty_message_is_bad_request() {
    let resp = make_app()
        .oneshot(post_json_as("/chat", None, json!({"message": "  "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_missing_message_is_bad_request() {
    let resp = make_app()
        .oneshot(post_json_as("/chat", None, json!({"text": "hi"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_is_bounded() {
    let app = make_app();
    for i in 0..27 {
        let resp = app
            .clone()
            .oneshot(post_json_as("/chat", None, json!({"message": format!("hi {}", i)})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let history: Vec<ChatTurn> = body_json(app.oneshot(get_as("/history", None)).await.unwrap()).await;
    assert_eq!(history.len(), 50);
    assert_eq!(history[0].content, "hi 2");
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_users_are_isolated() {
    let app = make_app();
    app.clone()
        .oneshot(post_json_as(
            "/tasks",
            Some("alice"),
            json!({"action": "add", "title": "Alice only"}),
        ))
        .await
        .unwrap();

    let bob: Vec<Task> = body_json(app.clone().oneshot(get_as("/tasks", Some("bob"))).await.unwrap()).await;
    assert!(bob.is_empty());
    let demo: Vec<Task> = body_json(app.clone().oneshot(get_as("/tasks", None)).await.unwrap()).await;
    assert!(demo.is_empty());
    let alice: Vec<Task> =
        body_json(app.oneshot(get_as("/tasks", Some("alice"))).await.unwrap()).await;
    assert_eq!(alice.len(), 1);
}

#[tokio::test]
async fn test_missing_header_uses_demo_user() {
    let app = make_app();
    app.clone()
        .oneshot(post_json_as("/tasks", None, json!({"action": "add", "title": "Shared"})))
        .await
        .unwrap();
    let demo: Vec<Task> =
        body_json(app.oneshot(get_as("/tasks", Some("demo-user"))).await.unwrap()).await;
    assert_eq!(demo[0].title, "Shared");
}

// =============================================================================
// Routing errors and CORS
// =============================================================================

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let resp = make_app().oneshot(get_as("/nope", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = body_json(resp).await;
    assert_eq!(body.error, "not_found");
}

#[tokio::test]
async fn test_wrong_method_is_method_not_allowed() {
    let resp = make_app().oneshot(get_as("/chat", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: ErrorBody = body_json(resp).await;
    assert_eq!(body.error, "method_not_allowed");

    let req = Request::delete("/tasks").body(Body::empty()).unwrap();
    let resp = make_app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_cors_preflight() {
    let req = Request::options("/chat")
        .header("origin", "http://example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,x-user-id")
        .body(Body::empty())
        .unwrap();
    let resp = make_app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    let allowed = headers["access-control-allow-headers"].to_str().unwrap().to_lowercase();
    assert!(allowed.contains("x-user-id"));
}

#[tokio::test]
async fn test_cors_header_on_simple_request() {
    let req = Request::get("/tasks")
        .header("origin", "http://example.com")
        .body(Body::empty())
        .unwrap();
    let resp = make_app().oneshot(req).await.unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}
