//! Auth endpoints under `/auth`.
//!
//! Handlers are thin: they extract the bearer token or JSON body, call the
//! [`SessionManager`](crate::auth::SessionManager), and map
//! [`AuthError`](crate::auth::AuthError) to a `{error, message}` body.

mod bearer;
mod error;
pub(crate) mod profile;
pub(crate) mod session;
pub(crate) mod signin;
pub(crate) mod signup;
pub(crate) mod types;
