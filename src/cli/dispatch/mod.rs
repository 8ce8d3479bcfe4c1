//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the appropriate action,
//! such as starting the gateway with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::gate;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let frontend_base_url = matches
        .get_one::<String>("frontend-base-url")
        .cloned()
        .context("missing required argument: --frontend-base-url")?;

    let gate_opts = gate::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        frontend_base_url,
        totp_issuer: gate_opts.totp_issuer,
        auth_window_seconds: gate_opts.auth_window_seconds,
        auth_max_requests: gate_opts.auth_max_requests,
        api_window_seconds: gate_opts.api_window_seconds,
        api_max_requests: gate_opts.api_max_requests,
        store_timeout_ms: gate_opts.store_timeout_ms,
        csrf_protection: gate_opts.csrf_protection,
    }))
}
