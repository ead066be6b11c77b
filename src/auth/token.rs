//! HS256 access and refresh tokens.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::store::User;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed claim set. The signature covers every field, `kind` and `exp` included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub full_name: Option<String>,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    /// Credential version of the user at issue time.
    pub ver: i32,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    /// `exp` as a timestamp, `None` if it is out of range.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Identity fields copied into a token.
#[derive(Clone, Copy, Debug)]
pub struct Subject<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub full_name: Option<&'a str>,
    pub credential_version: i32,
}

impl<'a> From<&'a User> for Subject<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            user_id: user.id,
            email: &user.email,
            full_name: user.full_name.as_deref(),
            credential_version: user.credential_version,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("unexpected token kind")]
    WrongKind,
    #[error("failed to encode token: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString, issuer: &str) -> Self {
        let key = secret.expose_secret().as_bytes();

        // Expiry is checked by hand so `now >= exp` is rejected with no leeway
        // and logout can still read expired tokens.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            issuer: issuer.to_string(),
        }
    }

    /// Issue a token expiring `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue(
        &self,
        subject: Subject<'_>,
        kind: TokenKind,
        ttl_seconds: i64,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, kind, ttl_seconds, Utc::now())
    }

    /// # Errors
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue_at(
        &self,
        subject: Subject<'_>,
        kind: TokenKind,
        ttl_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: subject.user_id.to_string(),
            email: subject.email.to_string(),
            full_name: subject.full_name.map(str::to_string),
            kind,
            iss: self.issuer.clone(),
            iat,
            exp: iat.saturating_add(ttl_seconds),
            jti: Uuid::new_v4().to_string(),
            ver: subject.credential_version,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Encode)
    }

    /// Verify signature, issuer, and expiry.
    ///
    /// # Errors
    /// Returns a `TokenError` describing why the token is not acceptable.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_at(token, Utc::now())
    }

    /// # Errors
    /// Returns a `TokenError` describing why the token is not acceptable at `now`.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = self.decode_allow_expired(token)?;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Decode and require a specific token kind.
    ///
    /// # Errors
    /// Returns `TokenError::WrongKind` for a valid token of the other kind.
    pub fn decode_expected(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }

    /// Verify signature and issuer but accept expired tokens.
    ///
    /// # Errors
    /// Returns an error when the token cannot be verified at all.
    pub fn decode_allow_expired(&self, token: &str) -> Result<Claims, TokenError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::BadSignature
                }
                _ => TokenError::Malformed,
            })
    }
}
