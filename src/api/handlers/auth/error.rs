//! HTTP mapping for [`AuthError`].

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use tracing::error;

use super::types::ErrorResponse;
use crate::auth::AuthError;

impl AuthError {
    /// Duplicate emails are reported as 400 to match the documented contract.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Conflict | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::NotFound => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("Auth request failed: {err:#}");
        }

        let status = self.status();
        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.public_message().to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
