//! Optional remote identity provider.
//!
//! When configured, signup also registers the user remotely and signin must be
//! accepted by both the remote provider and the local password hash. Without a
//! provider the session manager runs entirely on the local store.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("remote identity already exists")]
    Conflict,
    #[error("remote identity rejected the request")]
    Rejected,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_remote_identity(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<(), IdentityError>;

    /// `Ok(false)` means the provider rejected the credentials.
    async fn authenticate_remote_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Result<bool, IdentityError>;
}
