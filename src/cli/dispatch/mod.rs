//! Map parsed CLI arguments to an [`Action`].

use crate::cli::actions::{Action, server::Args, verify};
use crate::cli::commands::{
    ARG_ALLOWED_ORIGIN, ARG_EMAIL, ARG_PORT, ARG_REQUEST_TIMEOUT_SECONDS, CMD_VERIFY_EMAIL, auth,
    database,
};
use anyhow::{Context, Result};

/// Map validated CLI matches to an action; no subcommand runs the server.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_VERIFY_EMAIL, sub_m)) => verify_email(matches, sub_m),
        Some((name, _)) => anyhow::bail!("unknown command: {name}"),
        None => server(matches),
    }
}

fn verify_email(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> Result<Action> {
    let email = sub_m
        .get_one::<String>(ARG_EMAIL)
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .context("missing required argument: <email>")?;
    let database_opts = database::Options::parse(matches)?;

    Ok(Action::VerifyEmail(verify::Args {
        dsn: database_opts.dsn,
        email,
    }))
}

fn server(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let request_timeout_seconds = matches
        .get_one::<u64>(ARG_REQUEST_TIMEOUT_SECONDS)
        .copied()
        .unwrap_or(30);
    if request_timeout_seconds == 0 {
        anyhow::bail!("--{ARG_REQUEST_TIMEOUT_SECONDS} must be greater than zero");
    }
    let allowed_origin = matches
        .get_one::<String>(ARG_ALLOWED_ORIGIN)
        .cloned()
        .filter(|v| !v.trim().is_empty());

    let database_opts = database::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: database_opts.dsn,
        db_max_connections: database_opts.max_connections,
        request_timeout_seconds,
        allowed_origin,
        jwt_secret: auth_opts.jwt_secret,
        jwt_issuer: auth_opts.jwt_issuer,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        password_min_length: auth_opts.password_min_length,
        work_factor: auth_opts.work_factor,
        require_verification: auth_opts.require_verification,
        rotate_refresh_tokens: auth_opts.rotate_refresh_tokens,
        revocation_sweep_seconds: auth_opts.revocation_sweep_seconds,
    }))
}
