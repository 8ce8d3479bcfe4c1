//! Gate tuning arguments: rate-limit budgets, store timeout, TOTP issuer
//! and CSRF enforcement.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_TOTP_ISSUER: &str = "totp-issuer";
pub const ARG_AUTH_WINDOW_SECONDS: &str = "auth-window-seconds";
pub const ARG_AUTH_MAX_REQUESTS: &str = "auth-max-requests";
pub const ARG_API_WINDOW_SECONDS: &str = "api-window-seconds";
pub const ARG_API_MAX_REQUESTS: &str = "api-max-requests";
pub const ARG_STORE_TIMEOUT_MS: &str = "store-timeout-ms";
pub const ARG_CSRF_PROTECTION: &str = "csrf-protection";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOTP_ISSUER)
                .long(ARG_TOTP_ISSUER)
                .help("Issuer shown in authenticator apps")
                .default_value("Pordisto")
                .env("PORDISTO_TOTP_ISSUER"),
        )
        .arg(
            Arg::new(ARG_AUTH_WINDOW_SECONDS)
                .long(ARG_AUTH_WINDOW_SECONDS)
                .help("Rate-limit window for auth endpoints, in seconds")
                .default_value("60")
                .env("PORDISTO_AUTH_WINDOW_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_AUTH_MAX_REQUESTS)
                .long(ARG_AUTH_MAX_REQUESTS)
                .help("Requests allowed per auth window")
                .default_value("10")
                .env("PORDISTO_AUTH_MAX_REQUESTS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_API_WINDOW_SECONDS)
                .long(ARG_API_WINDOW_SECONDS)
                .help("Rate-limit window for general API endpoints, in seconds")
                .default_value("60")
                .env("PORDISTO_API_WINDOW_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_API_MAX_REQUESTS)
                .long(ARG_API_MAX_REQUESTS)
                .help("Requests allowed per API window")
                .default_value("100")
                .env("PORDISTO_API_MAX_REQUESTS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_MS)
                .long(ARG_STORE_TIMEOUT_MS)
                .help("Upper bound on a single counter/record store call, in milliseconds")
                .default_value("250")
                .env("PORDISTO_STORE_TIMEOUT_MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CSRF_PROTECTION)
                .long(ARG_CSRF_PROTECTION)
                .help("Require issued CSRF tokens on mutating API requests")
                .default_value("true")
                .env("PORDISTO_CSRF_PROTECTION")
                .value_parser(clap::value_parser!(bool)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub totp_issuer: String,
    pub auth_window_seconds: u64,
    pub auth_max_requests: u64,
    pub api_window_seconds: u64,
    pub api_max_requests: u64,
    pub store_timeout_ms: u64,
    pub csrf_protection: bool,
}

impl Options {
    /// # Errors
    /// Returns an error when a defaulted argument is unexpectedly absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            totp_issuer: matches
                .get_one::<String>(ARG_TOTP_ISSUER)
                .cloned()
                .context("missing totp-issuer")?,
            auth_window_seconds: matches
                .get_one::<u64>(ARG_AUTH_WINDOW_SECONDS)
                .copied()
                .context("missing auth-window-seconds")?,
            auth_max_requests: matches
                .get_one::<u64>(ARG_AUTH_MAX_REQUESTS)
                .copied()
                .context("missing auth-max-requests")?,
            api_window_seconds: matches
                .get_one::<u64>(ARG_API_WINDOW_SECONDS)
                .copied()
                .context("missing api-window-seconds")?,
            api_max_requests: matches
                .get_one::<u64>(ARG_API_MAX_REQUESTS)
                .copied()
                .context("missing api-max-requests")?,
            store_timeout_ms: matches
                .get_one::<u64>(ARG_STORE_TIMEOUT_MS)
                .copied()
                .context("missing store-timeout-ms")?,
            csrf_protection: matches
                .get_one::<bool>(ARG_CSRF_PROTECTION)
                .copied()
                .context("missing csrf-protection")?,
        })
    }
}
