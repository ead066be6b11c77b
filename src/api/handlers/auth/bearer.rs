//! `Authorization: Bearer` extraction.

use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::auth::AuthError;

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Missing or malformed headers are `Unauthorized`.
pub(crate) fn require_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    extract_bearer_token(headers).ok_or(AuthError::Unauthorized)
}
