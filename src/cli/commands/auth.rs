use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::{
    DEFAULT_ACCESS_TOKEN_TTL_SECONDS, DEFAULT_JWT_ISSUER, DEFAULT_PASSWORD_MIN_LENGTH,
    DEFAULT_REFRESH_TOKEN_TTL_SECONDS, WorkFactor,
};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_ISSUER: &str = "jwt-issuer";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";
pub const ARG_PASSWORD_MIN_LENGTH: &str = "password-min-length";
pub const ARG_ARGON2_MEMORY_KIB: &str = "argon2-memory-kib";
pub const ARG_ARGON2_ITERATIONS: &str = "argon2-iterations";
pub const ARG_ARGON2_PARALLELISM: &str = "argon2-parallelism";
pub const ARG_REQUIRE_VERIFICATION: &str = "require-verification";
pub const ARG_ROTATE_REFRESH_TOKENS: &str = "rotate-refresh-tokens";
pub const ARG_REVOCATION_SWEEP_SECONDS: &str = "revocation-sweep-seconds";

#[derive(Debug, Clone)]
pub struct Options {
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

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or a TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = match matches.get_one::<String>(ARG_JWT_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}"),
        };

        let jwt_issuer = matches
            .get_one::<String>(ARG_JWT_ISSUER)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string());

        let access_token_ttl_seconds = positive_ttl(
            matches,
            ARG_ACCESS_TOKEN_TTL_SECONDS,
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
        )?;
        let refresh_token_ttl_seconds = positive_ttl(
            matches,
            ARG_REFRESH_TOKEN_TTL_SECONDS,
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
        )?;

        let defaults = WorkFactor::default();
        let work_factor = WorkFactor {
            memory_kib: matches
                .get_one::<u32>(ARG_ARGON2_MEMORY_KIB)
                .copied()
                .unwrap_or(defaults.memory_kib),
            iterations: matches
                .get_one::<u32>(ARG_ARGON2_ITERATIONS)
                .copied()
                .unwrap_or(defaults.iterations),
            parallelism: matches
                .get_one::<u32>(ARG_ARGON2_PARALLELISM)
                .copied()
                .unwrap_or(defaults.parallelism),
        };

        Ok(Self {
            jwt_secret,
            jwt_issuer,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            password_min_length: matches
                .get_one::<usize>(ARG_PASSWORD_MIN_LENGTH)
                .copied()
                .unwrap_or(DEFAULT_PASSWORD_MIN_LENGTH),
            work_factor,
            require_verification: matches
                .get_one::<bool>(ARG_REQUIRE_VERIFICATION)
                .copied()
                .unwrap_or(false),
            rotate_refresh_tokens: matches
                .get_one::<bool>(ARG_ROTATE_REFRESH_TOKENS)
                .copied()
                .unwrap_or(true),
            revocation_sweep_seconds: matches
                .get_one::<u64>(ARG_REVOCATION_SWEEP_SECONDS)
                .copied()
                .unwrap_or(3600),
        })
    }
}

fn positive_ttl(matches: &ArgMatches, id: &str, default: i64) -> Result<i64> {
    let value = matches.get_one::<i64>(id).copied().unwrap_or(default);
    if value <= 0 {
        anyhow::bail!("--{id} must be greater than zero");
    }
    Ok(value)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_password_args(command);
    with_policy_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HS256 signing secret for access and refresh tokens")
                .env("ICECUBE_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_ISSUER)
                .long(ARG_JWT_ISSUER)
                .help("Token issuer (iss) written and required on every token")
                .env("ICECUBE_JWT_ISSUER")
                .default_value(DEFAULT_JWT_ISSUER),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token TTL in seconds")
                .env("ICECUBE_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token TTL in seconds")
                .env("ICECUBE_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_password_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PASSWORD_MIN_LENGTH)
                .long(ARG_PASSWORD_MIN_LENGTH)
                .help("Minimum password length in characters")
                .env("ICECUBE_PASSWORD_MIN_LENGTH")
                .default_value("8")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_ARGON2_MEMORY_KIB)
                .long(ARG_ARGON2_MEMORY_KIB)
                .help("Argon2id memory cost in KiB")
                .env("ICECUBE_ARGON2_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_ITERATIONS)
                .long(ARG_ARGON2_ITERATIONS)
                .help("Argon2id time cost (iterations)")
                .env("ICECUBE_ARGON2_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_PARALLELISM)
                .long(ARG_ARGON2_PARALLELISM)
                .help("Argon2id parallelism (lanes)")
                .env("ICECUBE_ARGON2_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}

fn with_policy_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REQUIRE_VERIFICATION)
                .long(ARG_REQUIRE_VERIFICATION)
                .help("Create users unverified and reject signin until they are verified")
                .env("ICECUBE_REQUIRE_VERIFICATION")
                .num_args(0..=1)
                .default_value("false")
                .default_missing_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_ROTATE_REFRESH_TOKENS)
                .long(ARG_ROTATE_REFRESH_TOKENS)
                .help("Revoke a refresh token once it has been exchanged")
                .env("ICECUBE_ROTATE_REFRESH_TOKENS")
                .num_args(0..=1)
                .default_value("true")
                .default_missing_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_REVOCATION_SWEEP_SECONDS)
                .long(ARG_REVOCATION_SWEEP_SECONDS)
                .help("Interval for purging expired revocation entries (0 disables)")
                .env("ICECUBE_REVOCATION_SWEEP_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
}
