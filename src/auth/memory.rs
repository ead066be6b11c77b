//! In-memory store and ledger used by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    revocation::{RevocationLedger, token_digest},
    store::{CredentialStore, NewUser, StoreError, User},
};

#[derive(Default)]
pub(crate) struct MemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>,
    offline: AtomicBool,
}

impl MemoryCredentialStore {
    pub(crate) async fn set_active(&self, id: Uuid, active: bool) {
        if let Some(user) = self.users.lock().await.get_mut(&id) {
            user.is_active = active;
        }
    }

    pub(crate) async fn remove(&self, id: Uuid) {
        self.users.lock().await.remove(&id);
    }

    /// Make every call fail as if the database were down.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("store offline")));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        let users = self.users.lock().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.check_online()?;
        let mut users = self.users.lock().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict);
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            is_verified: user.is_verified,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
            credential_version: 0,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn record_login(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        let mut users = self.users.lock().await;
        Ok(users.get_mut(&id).map(|user| {
            user.last_login_at = Some(Utc::now());
            user.clone()
        }))
    }

    async fn update_full_name(
        &self,
        id: Uuid,
        full_name: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        let mut users = self.users.lock().await;
        Ok(users.get_mut(&id).map(|user| {
            user.full_name = full_name;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut users = self.users.lock().await;
        Ok(users
            .get_mut(&id)
            .map(|user| {
                user.password_hash = password_hash.to_string();
                user.credential_version += 1;
                user.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn mark_verified(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        let mut users = self.users.lock().await;
        Ok(users.values_mut().find(|user| user.email == email).map(|user| {
            user.is_verified = true;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }
}

#[derive(Default)]
pub(crate) struct MemoryRevocationLedger {
    entries: Mutex<HashMap<Vec<u8>, DateTime<Utc>>>,
}

impl MemoryRevocationLedger {
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl RevocationLedger for MemoryRevocationLedger {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let digest = token_digest(token);
        if entries.contains_key(&digest) {
            return Ok(false);
        }
        entries.insert(digest, expires_at);
        Ok(true)
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        Ok(self
            .entries
            .lock()
            .await
            .get(&token_digest(token))
            .is_some_and(|expires_at| *expires_at > now))
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::Duration;

    #[tokio::test]
    async fn is_revoked_ignores_stale_entries() -> Result<()> {
        let ledger = MemoryRevocationLedger::default();
        let now = Utc::now();
        assert!(ledger.revoke("live", now + Duration::minutes(5)).await?);
        assert!(ledger.revoke("stale", now - Duration::minutes(5)).await?);

        assert!(ledger.is_revoked("live").await?);
        assert!(!ledger.is_revoked("stale").await?);
        assert!(!ledger.is_revoked("never").await?);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent() -> Result<()> {
        let ledger = MemoryRevocationLedger::default();
        let expires_at = Utc::now() + Duration::minutes(5);
        assert!(ledger.revoke("token", expires_at).await?);
        assert!(!ledger.revoke("token", expires_at).await?);
        assert_eq!(ledger.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn purge_expired_keeps_live_entries() -> Result<()> {
        let ledger = MemoryRevocationLedger::default();
        let now = Utc::now();
        ledger.revoke("live", now + Duration::minutes(5)).await?;
        ledger.revoke("stale", now - Duration::minutes(5)).await?;

        assert_eq!(ledger.purge_expired().await?, 1);
        assert_eq!(ledger.len().await, 1);
        assert!(ledger.is_revoked("live").await?);
        Ok(())
    }
}
