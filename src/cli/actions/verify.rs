use crate::auth::{CredentialStore, PgCredentialStore, apply_schema};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub email: String,
}

/// Mark the account with `args.email` as verified.
/// # Errors
/// Returns an error if the database is unreachable or no such account exists.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;
    apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    let store = PgCredentialStore::new(pool);
    let Some(user) = store.mark_verified(&args.email).await? else {
        anyhow::bail!("no user with email {}", args.email);
    };

    info!(user_id = %user.id, "Account verified");
    println!("verified {}", user.email);
    Ok(())
}
