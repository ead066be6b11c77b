//! Revocation ledger (token denylist).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::store::StoreError;

/// Denylist of tokens invalidated before their natural expiry.
///
/// Only a digest of the raw token is persisted. An entry is relevant while
/// `now < expires_at`; after that the token is rejected by expiry alone.
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Record `token` as revoked until `expires_at`.
    ///
    /// Idempotent. Returns `true` when this call created the entry, which lets
    /// refresh rotation treat a token as single-use under concurrency.
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// True iff an unexpired entry exists for this exact token string.
    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError>;

    /// Delete entries whose `expires_at` has passed, returning how many.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

/// SHA-256 of the raw token, the ledger's primary key.
pub(crate) fn token_digest(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
