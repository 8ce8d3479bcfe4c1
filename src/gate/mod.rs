//! The request gate: per-request composition of principal resolution, rate
//! limiting, access evaluation and CSRF verification.
//!
//! Flow Overview:
//! 1) Static-asset paths skip the gate entirely.
//! 2) The principal resolver maps the request credential to an identity;
//!    resolver faults are 500s, never silent anonymity.
//! 3) The rate limiter runs first, so a throttled caller is rejected before
//!    authorization is even evaluated.
//! 4) The access evaluator produces the allow/deny verdict, translated to
//!    JSON errors or redirects per namespace.
//! 5) Mutating API requests from authenticated callers must present the
//!    issued CSRF token.
//!
//! This middleware is the only rate-limiting path in the service; handlers
//! never re-apply their own limits.

pub mod response;

use crate::policy::{Decision, PolicyTable, evaluate};
use crate::principal::{Principal, PrincipalResolver};
use crate::ratelimit::{EndpointClass, Identity, RateLimiter};
use crate::security::CsrfGuard;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Gate tuning; paths are relative to the served origin.
#[derive(Clone, Debug)]
pub struct GateConfig {
    signin_path: String,
    unauthorized_path: String,
    auth_prefixes: Vec<&'static str>,
    payment_prefixes: Vec<&'static str>,
    csrf_protection: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            signin_path: "/signin".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            auth_prefixes: vec!["/api/auth", "/signin", "/signup"],
            payment_prefixes: vec!["/api/payments", "/checkout"],
            csrf_protection: true,
        }
    }
}

impl GateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_signin_path(mut self, path: impl Into<String>) -> Self {
        self.signin_path = path.into();
        self
    }

    #[must_use]
    pub fn with_unauthorized_path(mut self, path: impl Into<String>) -> Self {
        self.unauthorized_path = path.into();
        self
    }

    #[must_use]
    pub fn with_csrf_protection(mut self, enabled: bool) -> Self {
        self.csrf_protection = enabled;
        self
    }
}

/// Shared gate state, one instance per service.
pub struct Gate {
    policy: PolicyTable,
    limiter: RateLimiter,
    resolver: Arc<dyn PrincipalResolver>,
    csrf: CsrfGuard,
    config: GateConfig,
}

impl Gate {
    #[must_use]
    pub fn new(
        policy: PolicyTable,
        limiter: RateLimiter,
        resolver: Arc<dyn PrincipalResolver>,
        csrf: CsrfGuard,
        config: GateConfig,
    ) -> Self {
        Self {
            policy,
            limiter,
            resolver,
            csrf,
            config,
        }
    }

    #[must_use]
    pub fn csrf(&self) -> &CsrfGuard {
        &self.csrf
    }

    /// Endpoint class for rate limiting. Auth and payment surfaces come
    /// first so their stricter budgets win over the namespace defaults.
    fn endpoint_class(&self, path: &str) -> EndpointClass {
        let covers = |prefix: &&str| *path == **prefix || path.starts_with(&format!("{prefix}/"));
        if self.config.auth_prefixes.iter().any(covers) {
            return EndpointClass::Auth;
        }
        if self.config.payment_prefixes.iter().any(covers) {
            return EndpointClass::Payment;
        }
        if self.policy.is_api(path) {
            EndpointClass::Api
        } else {
            EndpointClass::Page
        }
    }

    fn identity(principal: Option<&Principal>, headers: &HeaderMap) -> Identity {
        match principal {
            Some(principal) => Identity::User(principal.id.clone()),
            None => Identity::Ip(
                extract_client_ip(headers).unwrap_or_else(|| "unknown".to_string()),
            ),
        }
    }

    fn csrf_required(&self, method: &Method, path: &str, principal: Option<&Principal>) -> bool {
        self.config.csrf_protection
            && principal.is_some()
            && self.policy.is_api(path)
            && !self.policy.is_public(path)
            && matches!(method.as_str(), "POST" | "PUT" | "PATCH" | "DELETE")
    }
}

/// Axum middleware entry point; install with
/// `axum::middleware::from_fn_with_state(gate, gate::middleware)`.
pub async fn middleware(
    State(gate): State<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    if gate.policy.is_bypassed(&path) {
        return next.run(request).await;
    }

    let principal = match gate.resolver.resolve(request.headers()).await {
        Ok(principal) => principal,
        Err(err) => {
            error!(%method, path, "principal resolution failed: {err}");
            return response::internal_error();
        }
    };

    // Throttling takes precedence over authorization.
    let identity = Gate::identity(principal.as_ref(), request.headers());
    let class = gate.endpoint_class(&path);
    let outcome = gate.limiter.check(&identity, class).await;
    if !outcome.allowed {
        return response::rate_limited(&outcome);
    }

    let decision = evaluate(&gate.policy, &path, &method, principal.as_ref());
    let response = match decision {
        Decision::Allow => {
            if gate.csrf_required(&method, &path, principal.as_ref()) {
                let presented = request
                    .headers()
                    .get(CSRF_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                let session = principal
                    .as_ref()
                    .map(|p| p.id.as_str())
                    .unwrap_or_default();
                if !gate.csrf.verify(session, presented) {
                    return response::with_rate_headers(response::invalid_csrf(), &outcome);
                }
            }
            let mut request = request;
            if let Some(principal) = principal {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        Decision::DenyUnauthenticated => {
            if gate.policy.is_api(&path) {
                response::unauthenticated_api()
            } else {
                response::signin_redirect(&gate.config.signin_path, &path)
            }
        }
        Decision::DenyForbidden { required_role } => {
            if gate.policy.is_api(&path) {
                response::forbidden_api(required_role)
            } else {
                response::unauthorized_redirect(&gate.config.unauthorized_path)
            }
        }
    };
    response::with_rate_headers(response, &outcome)
}

/// Client IP from the usual proxy headers, for anonymous rate-limit keys.
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
