use crate::{
    api,
    auth::{AuthConfig, WorkFactor},
};
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_max_connections: u32,
    pub request_timeout_seconds: u64,
    pub allowed_origin: Option<String>,
    pub jwt_secret: SecretString,
    pub jwt_issuer: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub password_min_length: usize,
    pub work_factor: WorkFactor,
    pub require_verification: bool,
    pub rotate_refresh_tokens: bool,
    pub revocation_sweep_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        db_max_connections = args.db_max_connections,
        "Preparing server"
    );

    let auth_config = AuthConfig::new(args.jwt_secret)
        .with_jwt_issuer(args.jwt_issuer)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_password_min_length(args.password_min_length)
        .with_work_factor(args.work_factor)
        .with_require_verification(args.require_verification)
        .with_rotate_refresh_tokens(args.rotate_refresh_tokens);

    let server_config = api::ServerConfig::new(args.port, args.dsn)
        .with_db_max_connections(args.db_max_connections)
        .with_request_timeout(Duration::from_secs(args.request_timeout_seconds))
        .with_allowed_origin(args.allowed_origin)
        .with_revocation_sweep_interval(Duration::from_secs(args.revocation_sweep_seconds));

    api::new(server_config, auth_config).await
}
