//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::user::USER_HEADER;

/// Create the axum Router with all routes and middleware.
///
/// Unknown paths answer 404 and unsupported methods on known paths answer
/// 405, both with a JSON [`ErrorBody`](crate::error::ErrorBody).
pub fn create_router(state: AppState) -> Router {
    // Browser clients on any origin may call the API and pick a user.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(USER_HEADER)]);

    Router::new()
        .route(
            "/tasks",
            get(handlers::list_tasks)
                .post(handlers::mutate_tasks)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/chat",
            post(handlers::chat).fallback(handlers::method_not_allowed),
        )
        .route(
            "/history",
            get(handlers::history).fallback(handlers::method_not_allowed),
        )
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
