//! Caller identity from the `X-User-Id` header.
//!
//! There is no authentication: the header only selects which user's tasks
//! and transcript a request works on. Missing or blank values fall back to
//! the configured default user.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// Longest accepted user key, in bytes.
const MAX_USER_KEY_LEN: usize = 128;

/// The user key a request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKey(String);

impl UserKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve a raw header value against `default_user`.
    pub fn resolve(header: Option<&str>, default_user: &str) -> Result<Self, ApiError> {
        let key = match header.map(str::trim) {
            Some(value) if !value.is_empty() => value,
            _ => default_user,
        };
        if key.len() > MAX_USER_KEY_LEN {
            return Err(ApiError::BadRequest(format!(
                "X-User-Id exceeds {} bytes",
                MAX_USER_KEY_LEN
            )));
        }
        Ok(Self(key.to_string()))
    }
}

impl FromRequestParts<AppState> for UserKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(USER_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| {
                ApiError::BadRequest("Invalid X-User-Id header encoding".to_string())
            })?),
            None => None,
        };
        UserKey::resolve(header, state.default_user())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_header() {
        let key = UserKey::resolve(Some(" alice "), "demo-user").unwrap();
        assert_eq!(key.as_str(), "alice");
    }

    #[test]
    fn test_resolve_defaults_when_missing_or_blank() {
        assert_eq!(UserKey::resolve(None, "demo-user").unwrap().as_str(), "demo-user");
        assert_eq!(UserKey::resolve(Some("  "), "demo-user").unwrap().as_str(), "demo-user");
    }

    #[test]
    fn test_resolve_rejects_oversized_key() {
        let long = "u".repeat(MAX_USER_KEY_LEN + 1);
        assert!(matches!(
            UserKey::resolve(Some(&long), "demo-user"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
