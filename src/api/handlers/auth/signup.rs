//! Account creation.

use axum::{Json, extract::Extension};
use std::sync::Arc;
use tracing::instrument;

use super::types::{ErrorResponse, SignupRequest, TokenResponse};
use crate::auth::{AuthError, SessionManager};

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "User created and signed in", body = TokenResponse),
        (status = 400, description = "Invalid input or email already registered", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    sessions: Extension<Arc<SessionManager>>,
    payload: Option<Json<SignupRequest>>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::BadRequest("Missing payload"));
    };

    let session = sessions
        .signup(
            &request.email,
            &request.password,
            request.full_name.as_deref(),
        )
        .await?;
    Ok(Json(session.into()))
}
