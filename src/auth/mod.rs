//! Authentication core: password hashing, token issuance, revocation, and the
//! session manager composing them.
//!
//! Everything here is independent of HTTP. The session manager receives its
//! configuration and collaborators at construction:
//!
//! - [`CredentialStore`] persists users; email uniqueness is enforced by the
//!   store (a unique index in PostgreSQL), not by the pre-check.
//! - [`RevocationLedger`] is a denylist keyed by a SHA-256 digest of the raw
//!   token. Entries matter only until the token's own `exp`.
//! - [`IdentityProvider`] is optional; without it the manager is local-only.

mod config;
mod error;
mod identity;
#[cfg(test)]
pub(crate) mod memory;
mod password;
mod revocation;
mod session;
mod storage;
mod store;
mod sweeper;
mod token;
mod utils;

pub use config::{
    AuthConfig, DEFAULT_ACCESS_TOKEN_TTL_SECONDS, DEFAULT_JWT_ISSUER, DEFAULT_PASSWORD_MIN_LENGTH,
    DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
};
pub use error::AuthError;
pub use identity::{IdentityError, IdentityProvider};
pub use password::{PasswordError, PasswordHasher, WorkFactor};
pub use revocation::RevocationLedger;
pub use session::{Session, SessionManager};
pub use storage::{PgCredentialStore, PgRevocationLedger, apply_schema};
pub use store::{CredentialStore, NewUser, StoreError, User};
pub use sweeper::spawn_revocation_sweeper;
pub use token::{Claims, Subject, TokenCodec, TokenError, TokenKind};

#[cfg(test)]
pub(crate) use password::test_work_factor;
