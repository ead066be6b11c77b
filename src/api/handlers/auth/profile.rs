//! Self-service profile and password updates.

use axum::{Json, extract::Extension, http::HeaderMap};
use std::sync::Arc;
use tracing::instrument;

use super::{
    bearer::require_bearer_token,
    types::{ChangePasswordRequest, ErrorResponse, MeResponse, ProfileUpdateRequest, SuccessResponse},
};
use crate::auth::{AuthError, SessionManager};

#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = ProfileUpdateRequest,
    params(
        ("Authorization" = String, Header, description = "Bearer access token")
    ),
    responses(
        (status = 200, description = "Updated profile", body = MeResponse),
        (status = 400, description = "Missing or invalid payload", body = ErrorResponse),
        (status = 401, description = "Access token missing, invalid, or revoked", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn update_profile(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
    payload: Option<Json<ProfileUpdateRequest>>,
) -> Result<Json<MeResponse>, AuthError> {
    let token = require_bearer_token(&headers)?;
    let Some(Json(request)) = payload else {
        return Err(AuthError::BadRequest("Missing payload"));
    };

    let user = sessions
        .update_profile(&token, request.full_name.as_deref())
        .await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    params(
        ("Authorization" = String, Header, description = "Bearer access token")
    ),
    responses(
        (status = 200, description = "Password changed; earlier tokens stop working", body = SuccessResponse),
        (status = 400, description = "New password rejected", body = ErrorResponse),
        (status = 401, description = "Token invalid or current password wrong", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn change_password(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<Json<SuccessResponse>, AuthError> {
    let token = require_bearer_token(&headers)?;
    let Some(Json(request)) = payload else {
        return Err(AuthError::BadRequest("Missing payload"));
    };

    sessions
        .change_password(&token, &request.current_password, &request.new_password)
        .await?;
    Ok(Json(SuccessResponse::new("Password changed")))
}
