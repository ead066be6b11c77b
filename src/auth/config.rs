//! Session manager configuration.

use secrecy::SecretString;

use super::password::WorkFactor;

pub const DEFAULT_JWT_ISSUER: &str = "icecube";
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    jwt_issuer: String,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    password_min_length: usize,
    work_factor: WorkFactor,
    require_verification: bool,
    rotate_refresh_tokens: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            jwt_issuer: DEFAULT_JWT_ISSUER.to_string(),
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
            work_factor: WorkFactor::default(),
            require_verification: false,
            rotate_refresh_tokens: true,
        }
    }

    #[must_use]
    pub fn with_jwt_issuer(mut self, issuer: String) -> Self {
        self.jwt_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_password_min_length(mut self, length: usize) -> Self {
        self.password_min_length = length;
        self
    }

    #[must_use]
    pub fn with_work_factor(mut self, work_factor: WorkFactor) -> Self {
        self.work_factor = work_factor;
        self
    }

    #[must_use]
    pub fn with_require_verification(mut self, require: bool) -> Self {
        self.require_verification = require;
        self
    }

    #[must_use]
    pub fn with_rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    pub(crate) fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    #[must_use]
    pub fn jwt_issuer(&self) -> &str {
        &self.jwt_issuer
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn password_min_length(&self) -> usize {
        self.password_min_length
    }

    #[must_use]
    pub fn work_factor(&self) -> WorkFactor {
        self.work_factor
    }

    #[must_use]
    pub fn require_verification(&self) -> bool {
        self.require_verification
    }

    #[must_use]
    pub fn rotate_refresh_tokens(&self) -> bool {
        self.rotate_refresh_tokens
    }
}
