//! Credential store seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Persisted identity record.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    /// Bumped on every password change; tokens carrying an older value are dead.
    pub credential_version: i32,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[redacted]")
            .field("full_name", &self.full_name)
            .field("is_verified", &self.is_verified)
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("last_login_at", &self.last_login_at)
            .field("credential_version", &self.credential_version)
            .finish()
    }
}

/// Fields required to create a user.
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The email is already taken (unique index violation).
    #[error("email already registered")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence for user records.
///
/// Implementations must enforce email uniqueness themselves; callers only
/// pre-check and rely on `insert` returning `StoreError::Conflict`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Stamp `last_login_at`; returns `None` when the user is gone.
    async fn record_login(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn update_full_name(
        &self,
        id: Uuid,
        full_name: Option<String>,
    ) -> Result<Option<User>, StoreError>;

    /// Store a new hash and bump `credential_version`; `false` when no row was updated.
    async fn update_password_hash(&self, id: Uuid, password_hash: &str)
        -> Result<bool, StoreError>;

    /// Mark the user with this email verified; `None` when there is no such user.
    async fn mark_verified(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
