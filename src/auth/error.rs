//! Error taxonomy surfaced by the session manager.

use super::{store::StoreError, token::TokenError};

/// Failures a caller of the session manager can observe.
///
/// Messages are static so nothing from the datastore or the hasher ever
/// reaches a client. `Internal` keeps the source for server-side logging only.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email already registered")]
    Conflict,
    #[error("invalid credentials")]
    Unauthorized,
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable machine-readable kind used in error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            // NotFound is reported as unauthorized to avoid leaking user existence.
            Self::Unauthorized | Self::NotFound => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
        }
    }

    /// Message safe to show to clients.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Conflict => "Email already registered",
            Self::Unauthorized | Self::NotFound => "Invalid credentials",
            Self::BadRequest(message) => message,
            Self::Internal(_) => "Internal server error",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::Conflict,
            StoreError::Backend(err) => Self::Internal(err),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encode(err) => Self::Internal(anyhow::Error::new(err)),
            TokenError::Malformed
            | TokenError::BadSignature
            | TokenError::Expired
            | TokenError::WrongKind => Self::Unauthorized,
        }
    }
}
