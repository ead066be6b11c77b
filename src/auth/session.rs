//! Signup, signin, refresh, logout and current-user resolution.
//!
//! Session lifecycle: `anonymous -> authenticated(access) -> authenticated(refreshed) -> revoked`.
//! Every bearer token is checked against the revocation ledger before the
//! codec, and identity is always re-read from the credential store.

use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    config::AuthConfig,
    error::AuthError,
    identity::{IdentityError, IdentityProvider},
    password::{PasswordError, PasswordHasher},
    revocation::RevocationLedger,
    store::{CredentialStore, NewUser, StoreError, User},
    token::{Claims, Subject, TokenCodec, TokenKind},
    utils::{normalize_email, normalize_full_name, valid_email},
};

/// Issued token pair plus the user it was issued for.
#[derive(Debug)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: User,
}

pub struct SessionManager {
    config: AuthConfig,
    hasher: Arc<PasswordHasher>,
    codec: TokenCodec,
    store: Arc<dyn CredentialStore>,
    ledger: Arc<dyn RevocationLedger>,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl SessionManager {
    /// # Errors
    /// Returns an error if the configured argon2 work factor is invalid.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        ledger: Arc<dyn RevocationLedger>,
    ) -> Result<Self, PasswordError> {
        let hasher = Arc::new(PasswordHasher::new(config.work_factor())?);
        let codec = TokenCodec::new(config.jwt_secret(), config.jwt_issuer());
        Ok(Self {
            config,
            hasher,
            codec,
            store,
            ledger,
            identity: None,
        })
    }

    #[must_use]
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// # Errors
    /// Returns `Internal` when the credential store is unreachable.
    pub async fn ping(&self) -> Result<(), AuthError> {
        self.store.ping().await.map_err(AuthError::from)
    }

    /// Create a user and issue its first token pair.
    ///
    /// # Errors
    /// `BadRequest` on invalid input, `Conflict` if the email is taken.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::BadRequest("Invalid email"));
        }
        self.check_password_policy(password)?;
        let full_name = normalize_full_name(full_name);

        // Fast path only; the unique index on insert is the authority.
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        if let Some(provider) = &self.identity {
            provider
                .create_remote_identity(&email, password, full_name.as_deref())
                .await
                .map_err(|err| match err {
                    IdentityError::Conflict => AuthError::Conflict,
                    IdentityError::Rejected => {
                        AuthError::BadRequest("Signup rejected by identity provider")
                    }
                    IdentityError::Backend(err) => {
                        AuthError::Internal(err.context("failed to create remote identity"))
                    }
                })?;
        }

        let password_hash = self.hash_password(password).await?;
        let user = self
            .store
            .insert(NewUser {
                email,
                password_hash,
                full_name,
                is_verified: !self.config.require_verification(),
            })
            .await
            .map_err(|err| {
                if matches!(err, StoreError::Conflict) && self.identity.is_some() {
                    warn!("Remote identity created but local signup lost a uniqueness race");
                }
                AuthError::from(err)
            })?;

        info!(user_id = %user.id, "User signed up");
        self.issue_pair(user)
    }

    /// Verify credentials and issue a fresh token pair.
    ///
    /// # Errors
    /// `Unauthorized` for every credential-related failure.
    pub async fn signin(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let user = self.store.find_by_email(&email).await?;

        // Run the hash check even for unknown users so timing does not reveal existence.
        let stored_hash = user.as_ref().map(|user| user.password_hash.clone());
        let password_ok = self.verify_password(password, stored_hash).await?;

        let Some(user) = user else {
            debug!("Signin for unknown email");
            return Err(AuthError::Unauthorized);
        };
        if !password_ok {
            debug!(user_id = %user.id, "Signin with wrong password");
            return Err(AuthError::Unauthorized);
        }
        if !user.is_active {
            debug!(user_id = %user.id, "Signin for deactivated user");
            return Err(AuthError::Unauthorized);
        }
        if self.config.require_verification() && !user.is_verified {
            debug!(user_id = %user.id, "Signin for unverified user");
            return Err(AuthError::Unauthorized);
        }

        if let Some(provider) = &self.identity {
            match provider.authenticate_remote_identity(&email, password).await {
                Ok(true) => {}
                Ok(false) | Err(IdentityError::Rejected | IdentityError::Conflict) => {
                    debug!(user_id = %user.id, "Remote identity rejected signin");
                    return Err(AuthError::Unauthorized);
                }
                Err(IdentityError::Backend(err)) => {
                    return Err(AuthError::Internal(
                        err.context("failed to authenticate remote identity"),
                    ));
                }
            }
        }

        let user = self
            .store
            .record_login(user.id)
            .await?
            .ok_or(AuthError::NotFound)?;

        info!(user_id = %user.id, "User signed in");
        self.issue_pair(user)
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// With rotation enabled the presented token is revoked, so each refresh
    /// token can be exchanged once.
    ///
    /// # Errors
    /// `Unauthorized` if the token is revoked, invalid, not a refresh token,
    /// or its user no longer passes the checks of [`Self::current_user`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        if self.ledger.is_revoked(refresh_token).await? {
            debug!("Refresh with revoked token");
            return Err(AuthError::Unauthorized);
        }
        let claims = self
            .codec
            .decode_expected(refresh_token, TokenKind::Refresh)?;
        let user = self.live_user(&claims).await?;

        if self.config.rotate_refresh_tokens() {
            let expires_at = claims.expires_at().ok_or(AuthError::Unauthorized)?;
            // Only the caller that records the revocation may use the token.
            if !self.ledger.revoke(refresh_token, expires_at).await? {
                debug!(user_id = %user.id, "Refresh token already consumed");
                return Err(AuthError::Unauthorized);
            }
        }

        self.issue_pair(user)
    }

    /// Revoke a token until its own expiry.
    ///
    /// Expired but correctly signed tokens are accepted and need no ledger entry.
    ///
    /// # Errors
    /// `Unauthorized` only when the signature cannot be verified.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.codec.decode_allow_expired(token)?;
        let Some(expires_at) = claims.expires_at() else {
            return Err(AuthError::Unauthorized);
        };
        if expires_at <= Utc::now() {
            debug!("Logout with already expired token");
            return Ok(());
        }

        self.ledger.revoke(token, expires_at).await?;
        info!(sub = %claims.sub, kind = ?claims.kind, "Token revoked");
        Ok(())
    }

    /// Resolve an access token to the live user record.
    ///
    /// # Errors
    /// `Unauthorized` if the token is revoked, invalid, not an access token, or
    /// its user is gone, deactivated, unverified while verification is
    /// required, or has changed password since the token was issued.
    pub async fn current_user(&self, access_token: &str) -> Result<User, AuthError> {
        let (_claims, user) = self.authenticate(access_token).await?;
        Ok(user)
    }

    /// Update the display name of the token's user.
    ///
    /// `None` leaves the profile untouched; a blank name clears it.
    ///
    /// # Errors
    /// Same failures as [`Self::current_user`].
    pub async fn update_profile(
        &self,
        access_token: &str,
        full_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let (_claims, user) = self.authenticate(access_token).await?;
        let Some(full_name) = full_name else {
            return Ok(user);
        };
        self.store
            .update_full_name(user.id, normalize_full_name(Some(full_name)))
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Replace the password after checking the current one.
    ///
    /// The store bumps the credential version, so every token issued before
    /// the change stops working; the presented access token is also revoked.
    ///
    /// # Errors
    /// `BadRequest` if the new password violates policy, `Unauthorized` if the
    /// token is not acceptable or the current password is wrong.
    pub async fn change_password(
        &self,
        access_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let (claims, user) = self.authenticate(access_token).await?;
        self.check_password_policy(new_password)?;

        if !self
            .verify_password(current_password, Some(user.password_hash.clone()))
            .await?
        {
            debug!(user_id = %user.id, "Password change with wrong current password");
            return Err(AuthError::Unauthorized);
        }

        let password_hash = self.hash_password(new_password).await?;
        if !self
            .store
            .update_password_hash(user.id, &password_hash)
            .await?
        {
            return Err(AuthError::NotFound);
        }

        let expires_at = claims.expires_at().ok_or(AuthError::Unauthorized)?;
        self.ledger.revoke(access_token, expires_at).await?;
        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    async fn authenticate(&self, access_token: &str) -> Result<(Claims, User), AuthError> {
        if self.ledger.is_revoked(access_token).await? {
            debug!("Request with revoked token");
            return Err(AuthError::Unauthorized);
        }
        let claims = self.codec.decode_expected(access_token, TokenKind::Access)?;
        let user = self.live_user(&claims).await?;
        Ok((claims, user))
    }

    async fn live_user(&self, claims: &Claims) -> Result<User, AuthError> {
        let user_id: Uuid = claims.user_id().ok_or(AuthError::Unauthorized)?;
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !user.is_active {
            return Err(AuthError::Unauthorized);
        }
        if claims.ver != user.credential_version {
            debug!(user_id = %user.id, "Token predates a password change");
            return Err(AuthError::Unauthorized);
        }
        if self.config.require_verification() && !user.is_verified {
            debug!(user_id = %user.id, "Token for unverified user");
            return Err(AuthError::Unauthorized);
        }
        Ok(user)
    }

    fn check_password_policy(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.config.password_min_length() {
            return Err(AuthError::BadRequest("Password too short"));
        }
        Ok(())
    }

    fn issue_pair(&self, user: User) -> Result<Session, AuthError> {
        let subject = Subject::from(&user);
        let access_token = self.codec.issue(
            subject,
            TokenKind::Access,
            self.config.access_token_ttl_seconds(),
        )?;
        let refresh_token = self.codec.issue(
            subject,
            TokenKind::Refresh,
            self.config.refresh_token_ttl_seconds(),
        )?;
        Ok(Session {
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl_seconds(),
            user,
        })
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("password hashing task failed")?
            .context("failed to hash password")?;
        Ok(hash)
    }

    /// `None` verifies against the dummy hash and always fails.
    async fn verify_password(
        &self,
        password: &str,
        hash: Option<String>,
    ) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => hasher.verify_dummy(&password),
        })
        .await
        .context("password verification task failed")?;
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        memory::{MemoryCredentialStore, MemoryRevocationLedger},
        password::test_work_factor,
    };
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::Duration;
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        manager: SessionManager,
        store: Arc<MemoryCredentialStore>,
        ledger: Arc<MemoryRevocationLedger>,
    }

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("session-test-secret".to_string()))
            .with_work_factor(test_work_factor())
    }

    fn harness_with(config: AuthConfig) -> Result<Harness> {
        let store = Arc::new(MemoryCredentialStore::default());
        let ledger = Arc::new(MemoryRevocationLedger::default());
        let manager = SessionManager::new(config, store.clone(), ledger.clone())?;
        Ok(Harness {
            manager,
            store,
            ledger,
        })
    }

    fn harness() -> Result<Harness> {
        harness_with(config())
    }

    #[tokio::test]
    async fn signup_then_signin_yields_subject_of_created_user() -> Result<()> {
        let h = harness()?;
        let created = h.manager.signup("a@x.com", "Secret123", Some("Ada")).await?;
        assert!(created.user.is_verified);
        assert_eq!(created.expires_in, 86_400);

        let session = h.manager.signin("a@x.com", "Secret123").await?;
        let claims = h
            .manager
            .codec()
            .decode_expected(&session.access_token, TokenKind::Access)?;
        assert_eq!(claims.user_id(), Some(created.user.id));
        assert_eq!(claims.full_name.as_deref(), Some("Ada"));
        assert!(session.user.last_login_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn signup_stores_hash_not_plaintext() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;
        let stored = h
            .store
            .find_by_id(session.user.id)
            .await?
            .ok_or_else(|| anyhow!("user missing"))?;
        assert_ne!(stored.password_hash, "Secret123");
        assert!(stored.password_hash.starts_with("$argon2id$"));
        Ok(())
    }

    #[tokio::test]
    async fn signup_rejects_invalid_input() -> Result<()> {
        let h = harness()?;
        assert!(matches!(
            h.manager.signup("not-an-email", "Secret123", None).await,
            Err(AuthError::BadRequest(_))
        ));
        assert!(matches!(
            h.manager.signup("a@x.com", "short", None).await,
            Err(AuthError::BadRequest(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn signup_duplicate_email_conflicts() -> Result<()> {
        let h = harness()?;
        h.manager.signup("a@x.com", "Secret123", None).await?;
        assert!(matches!(
            h.manager.signup(" a@x.com ", "Other1234", None).await,
            Err(AuthError::Conflict)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_signups_have_one_winner() -> Result<()> {
        let h = Arc::new(harness()?);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let h = Arc::clone(&h);
            handles.push(tokio::spawn(async move {
                h.manager.signup("race@x.com", "Secret123", None).await
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => created += 1,
                Err(AuthError::Conflict) => conflicts += 1,
                Err(err) => return Err(anyhow!("unexpected error: {err}")),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
        Ok(())
    }

    #[tokio::test]
    async fn signin_failures_are_indistinguishable() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;

        let unknown = h.manager.signin("nobody@x.com", "Secret123").await;
        let wrong = h.manager.signin("a@x.com", "wrong").await;
        h.store.set_active(session.user.id, false).await;
        let inactive = h.manager.signin("a@x.com", "Secret123").await;

        for result in [unknown, wrong, inactive] {
            let err = result.err().ok_or_else(|| anyhow!("signin succeeded"))?;
            assert!(matches!(err, AuthError::Unauthorized));
            assert_eq!(err.public_message(), "Invalid credentials");
        }
        Ok(())
    }

    #[tokio::test]
    async fn require_verification_blocks_unverified_signin() -> Result<()> {
        let h = harness_with(config().with_require_verification(true))?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;
        assert!(!session.user.is_verified);
        assert!(matches!(
            h.manager.signin("a@x.com", "Secret123").await,
            Err(AuthError::Unauthorized)
        ));

        assert!(h.store.mark_verified("a@x.com").await?.is_some());
        assert!(h.manager.signin("a@x.com", "Secret123").await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn require_verification_gates_signup_tokens() -> Result<()> {
        let h = harness_with(config().with_require_verification(true))?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;

        assert!(matches!(
            h.manager.current_user(&session.access_token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.manager.refresh(&session.refresh_token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.manager
                .update_profile(&session.access_token, Some("Ada"))
                .await,
            Err(AuthError::Unauthorized)
        ));

        h.store.mark_verified("a@x.com").await?;
        let user = h.manager.current_user(&session.access_token).await?;
        assert!(user.is_verified);
        assert!(h.manager.refresh(&session.refresh_token).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn refresh_issues_new_pair_and_rotates() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;

        let refreshed = h.manager.refresh(&session.refresh_token).await?;
        assert_ne!(refreshed.access_token, session.access_token);
        assert_ne!(refreshed.refresh_token, session.refresh_token);
        assert!(h.ledger.is_revoked(&session.refresh_token).await?);

        assert!(matches!(
            h.manager.refresh(&session.refresh_token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(h.manager.refresh(&refreshed.refresh_token).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn refresh_without_rotation_reuses_token() -> Result<()> {
        let h = harness_with(config().with_rotate_refresh_tokens(false))?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;
        h.manager.refresh(&session.refresh_token).await?;
        h.manager.refresh(&session.refresh_token).await?;
        assert!(!h.ledger.is_revoked(&session.refresh_token).await?);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_access_token_and_vanished_user() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;
        assert!(matches!(
            h.manager.refresh(&session.access_token).await,
            Err(AuthError::Unauthorized)
        ));

        h.store.remove(session.user.id).await;
        let err = h
            .manager
            .refresh(&session.refresh_token)
            .await
            .err()
            .ok_or_else(|| anyhow!("refresh succeeded"))?;
        assert!(matches!(err, AuthError::NotFound));
        assert_eq!(err.kind(), "unauthorized");
        Ok(())
    }

    #[tokio::test]
    async fn logout_revokes_until_expiry() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;
        let other = h.manager.signin("a@x.com", "Secret123").await?;

        h.manager.logout(&session.access_token).await?;
        assert!(matches!(
            h.manager.current_user(&session.access_token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(h.manager.current_user(&other.access_token).await.is_ok());

        // Idempotent.
        h.manager.logout(&session.access_token).await?;
        Ok(())
    }

    #[tokio::test]
    async fn logout_accepts_expired_token_without_write() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;
        let expired = h.manager.codec().issue_at(
            Subject::from(&session.user),
            TokenKind::Access,
            60,
            Utc::now() - Duration::hours(1),
        )?;

        h.manager.logout(&expired).await?;
        assert_eq!(h.ledger.len().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn logout_rejects_bad_signature() -> Result<()> {
        let h = harness()?;
        let foreign = TokenCodec::new(&SecretString::from("other".to_string()), "icecube");
        let token = foreign.issue(
            Subject {
                user_id: Uuid::new_v4(),
                email: "a@x.com",
                full_name: None,
                credential_version: 0,
            },
            TokenKind::Access,
            60,
        )?;
        assert!(matches!(
            h.manager.logout(&token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.manager.logout("garbage").await,
            Err(AuthError::Unauthorized)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn current_user_reads_fresh_fields() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", Some("Ada")).await?;

        let updated = h
            .manager
            .update_profile(&session.access_token, Some("  Ada Lovelace "))
            .await?;
        assert_eq!(updated.full_name.as_deref(), Some("Ada Lovelace"));

        let user = h.manager.current_user(&session.access_token).await?;
        assert_eq!(user.full_name.as_deref(), Some("Ada Lovelace"));

        let cleared = h
            .manager
            .update_profile(&session.access_token, Some("   "))
            .await?;
        assert_eq!(cleared.full_name, None);
        Ok(())
    }

    #[tokio::test]
    async fn update_profile_without_name_keeps_it() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", Some("Ada")).await?;

        let unchanged = h.manager.update_profile(&session.access_token, None).await?;
        assert_eq!(unchanged.full_name.as_deref(), Some("Ada"));

        let user = h.manager.current_user(&session.access_token).await?;
        assert_eq!(user.full_name.as_deref(), Some("Ada"));
        Ok(())
    }

    #[tokio::test]
    async fn current_user_rejects_refresh_token_and_deactivated_user() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;
        assert!(matches!(
            h.manager.current_user(&session.refresh_token).await,
            Err(AuthError::Unauthorized)
        ));

        h.store.set_active(session.user.id, false).await;
        assert!(matches!(
            h.manager.current_user(&session.access_token).await,
            Err(AuthError::Unauthorized)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn change_password_replaces_hash_and_revokes_token() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;

        assert!(matches!(
            h.manager
                .change_password(&session.access_token, "wrong-pass", "NewSecret456")
                .await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.manager
                .change_password(&session.access_token, "Secret123", "short")
                .await,
            Err(AuthError::BadRequest(_))
        ));

        h.manager
            .change_password(&session.access_token, "Secret123", "NewSecret456")
            .await?;

        assert!(matches!(
            h.manager.current_user(&session.access_token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.manager.signin("a@x.com", "Secret123").await,
            Err(AuthError::Unauthorized)
        ));
        assert!(h.manager.signin("a@x.com", "NewSecret456").await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn change_password_invalidates_other_sessions() -> Result<()> {
        let h = harness()?;
        let session = h.manager.signup("a@x.com", "Secret123", None).await?;
        let other = h.manager.signin("a@x.com", "Secret123").await?;

        h.manager
            .change_password(&session.access_token, "Secret123", "NewSecret456")
            .await?;

        assert!(matches!(
            h.manager.refresh(&session.refresh_token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.manager.refresh(&other.refresh_token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            h.manager.current_user(&other.access_token).await,
            Err(AuthError::Unauthorized)
        ));

        let fresh = h.manager.signin("a@x.com", "NewSecret456").await?;
        assert_eq!(fresh.user.credential_version, 1);
        assert!(h.manager.current_user(&fresh.access_token).await.is_ok());
        assert!(h.manager.refresh(&fresh.refresh_token).await.is_ok());
        Ok(())
    }

    struct RecordingProvider {
        created: AtomicUsize,
        accept_signin: bool,
    }

    #[async_trait]
    impl IdentityProvider for RecordingProvider {
        async fn create_remote_identity(
            &self,
            _email: &str,
            _password: &str,
            _full_name: Option<&str>,
        ) -> Result<(), IdentityError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn authenticate_remote_identity(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<bool, IdentityError> {
            Ok(self.accept_signin)
        }
    }

    #[tokio::test]
    async fn identity_provider_participates_in_signup_and_signin() -> Result<()> {
        let provider = Arc::new(RecordingProvider {
            created: AtomicUsize::new(0),
            accept_signin: false,
        });
        let h = harness()?;
        let manager = h.manager.with_identity_provider(provider.clone());

        manager.signup("a@x.com", "Secret123", None).await?;
        assert_eq!(provider.created.load(Ordering::SeqCst), 1);

        // Local password is right but the remote side says no.
        assert!(matches!(
            manager.signin("a@x.com", "Secret123").await,
            Err(AuthError::Unauthorized)
        ));
        Ok(())
    }

    struct DownProvider;

    #[async_trait]
    impl IdentityProvider for DownProvider {
        async fn create_remote_identity(
            &self,
            _email: &str,
            _password: &str,
            _full_name: Option<&str>,
        ) -> Result<(), IdentityError> {
            Err(IdentityError::Backend(anyhow!("provider unreachable")))
        }

        async fn authenticate_remote_identity(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<bool, IdentityError> {
            Err(IdentityError::Backend(anyhow!("provider unreachable")))
        }
    }

    #[tokio::test]
    async fn identity_backend_failure_is_internal_and_creates_nothing() -> Result<()> {
        let h = harness()?;
        let store = h.store.clone();
        let manager = h.manager.with_identity_provider(Arc::new(DownProvider));
        assert!(matches!(
            manager.signup("a@x.com", "Secret123", None).await,
            Err(AuthError::Internal(_))
        ));
        assert!(store.find_by_email("a@x.com").await?.is_none());
        Ok(())
    }
}
