//! # IceCube
//!
//! `icecube` is a small authentication service: users sign up with an email and
//! password, sign in to receive a signed access/refresh token pair, and use the
//! bearer tokens to read or update their profile.
//!
//! ## Layout
//!
//! - [`auth`]: password hashing (argon2id), the HS256 token codec, the revocation
//!   ledger, and the [`SessionManager`](auth::SessionManager) that ties them to a
//!   credential store.
//! - [`api`]: the axum router, handlers under `/auth`, and the `OpenAPI` document.
//! - [`cli`]: command line/env configuration, telemetry, and the server action.
//!
//! ## Storage
//!
//! Users and revoked tokens live in `PostgreSQL` (`sql/schema.sql`, applied on
//! startup). Revoked tokens are stored as SHA-256 digests until they would have
//! expired anyway; a background sweeper deletes stale rows.

pub mod api;
pub mod auth;
pub mod cli;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
