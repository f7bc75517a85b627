//! taskchat API crate - axum HTTP server and route handlers.
//!
//! Exposes each user's task list, chat endpoint and transcript over JSON.
//! The user is picked by the `X-User-Id` header and every request is
//! forwarded to that user's engine actor.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod user;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use user::UserKey;
