//! Bearer token endpoints: refresh, logout, and the current user.

use axum::{Json, extract::Extension, http::HeaderMap};
use std::sync::Arc;
use tracing::instrument;

use super::{
    bearer::require_bearer_token,
    types::{ErrorResponse, MeResponse, SuccessResponse, TokenResponse},
};
use crate::auth::{AuthError, SessionManager};

#[utoipa::path(
    post,
    path = "/auth/refresh",
    params(
        ("Authorization" = String, Header, description = "Bearer refresh token")
    ),
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Refresh token missing, invalid, or revoked", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
) -> Result<Json<TokenResponse>, AuthError> {
    let token = require_bearer_token(&headers)?;
    let session = sessions.refresh(&token).await?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    params(
        ("Authorization" = String, Header, description = "Bearer access or refresh token")
    ),
    responses(
        (status = 200, description = "Token revoked", body = SuccessResponse),
        (status = 401, description = "Token signature could not be verified", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
) -> Result<Json<SuccessResponse>, AuthError> {
    let token = require_bearer_token(&headers)?;
    sessions.logout(&token).await?;
    Ok(Json(SuccessResponse::new("Logged out")))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    params(
        ("Authorization" = String, Header, description = "Bearer access token")
    ),
    responses(
        (status = 200, description = "Authenticated user", body = MeResponse),
        (status = 401, description = "Access token missing, invalid, or revoked", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn me(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
) -> Result<Json<MeResponse>, AuthError> {
    let token = require_bearer_token(&headers)?;
    let user = sessions.current_user(&token).await?;
    Ok(Json(user.into()))
}
