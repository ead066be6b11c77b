//! Password signin.

use axum::{Json, extract::Extension};
use std::sync::Arc;
use tracing::instrument;

use super::types::{ErrorResponse, SigninRequest, TokenResponse};
use crate::auth::{AuthError, SessionManager};

#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 400, description = "Missing payload", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn signin(
    sessions: Extension<Arc<SessionManager>>,
    payload: Option<Json<SigninRequest>>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::BadRequest("Missing payload"));
    };

    let session = sessions.signin(&request.email, &request.password).await?;
    Ok(Json(session.into()))
}
