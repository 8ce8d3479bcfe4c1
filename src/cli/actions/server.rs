use crate::{
    api,
    clock::SystemClock,
    gate::{Gate, GateConfig},
    policy::PolicyTable,
    principal::AnonymousResolver,
    ratelimit::{
        EndpointClass, MemoryCounterStore, RateLimitConfig, RateLimitSettings, RateLimiter,
    },
    security::CsrfGuard,
    twofactor::{MemoryTwoFactorStore, TwoFactorService},
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub frontend_base_url: String,
    pub totp_issuer: String,
    pub auth_window_seconds: u64,
    pub auth_max_requests: u64,
    pub api_window_seconds: u64,
    pub api_max_requests: u64,
    pub store_timeout_ms: u64,
    pub csrf_protection: bool,
}

/// Execute the server action.
///
/// Counters and two-factor records run on the in-memory stores here; a
/// multi-instance deployment swaps them (and the principal resolver) for
/// implementations backed by the platform's shared services.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let clock = Arc::new(SystemClock);
    let store_timeout = Duration::from_millis(args.store_timeout_ms);

    let settings = RateLimitSettings::new()
        .with_class(
            EndpointClass::Auth,
            RateLimitConfig::new(
                Duration::from_secs(args.auth_window_seconds),
                args.auth_max_requests,
            ),
        )
        .with_class(
            EndpointClass::Api,
            RateLimitConfig::new(
                Duration::from_secs(args.api_window_seconds),
                args.api_max_requests,
            ),
        )
        .with_store_timeout(store_timeout);

    let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()), clock.clone(), settings);

    let twofactor = TwoFactorService::new(
        Arc::new(MemoryTwoFactorStore::new()),
        clock.clone(),
        args.totp_issuer,
    )
    .with_store_timeout(store_timeout);

    let csrf = CsrfGuard::new(clock);

    let gate = Arc::new(Gate::new(
        PolicyTable::platform_defaults(),
        limiter,
        Arc::new(AnonymousResolver),
        csrf.clone(),
        GateConfig::new().with_csrf_protection(args.csrf_protection),
    ));

    api::serve(args.port, &args.frontend_base_url, gate, twofactor, csrf).await
}
