//! Translation of gate verdicts into HTTP responses.
//!
//! API-namespaced paths get JSON bodies with stable error codes; page paths
//! get redirects (sign-in with a callback URL for anonymous callers, the
//! unauthorized page otherwise). Rate-limit metadata rides on every
//! response as `X-RateLimit-*` headers.

use crate::policy::Role;
use crate::ratelimit::RateLimitOutcome;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// JSON body for API denials.
#[derive(Debug, Serialize)]
pub struct ApiDenial {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    #[serde(rename = "requiredRole", skip_serializing_if = "Option::is_none")]
    pub required_role: Option<&'static str>,
}

/// JSON body for 429 responses.
#[derive(Debug, Serialize)]
pub struct RateLimitBody {
    pub error: &'static str,
    pub message: &'static str,
    #[serde(rename = "retryAfter")]
    pub retry_after: u64,
}

pub fn unauthenticated_api() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiDenial {
            success: false,
            error: "Authentication required".to_string(),
            code: "UNAUTHORIZED",
            required_role: None,
        }),
    )
        .into_response()
}

pub fn forbidden_api(required_role: Option<Role>) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiDenial {
            success: false,
            error: "Insufficient permissions".to_string(),
            code: "FORBIDDEN",
            required_role: required_role.map(Role::as_str),
        }),
    )
        .into_response()
}

pub fn invalid_csrf() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiDenial {
            success: false,
            error: "Invalid or missing CSRF token".to_string(),
            code: "FORBIDDEN",
            required_role: None,
        }),
    )
        .into_response()
}

/// Redirect anonymous page requests to sign-in, preserving the original
/// path as `callbackUrl`.
pub fn signin_redirect(signin_path: &str, original_path: &str) -> Response {
    let callback: String = url::form_urlencoded::byte_serialize(original_path.as_bytes()).collect();
    redirect(&format!("{signin_path}?callbackUrl={callback}"))
}

pub fn unauthorized_redirect(unauthorized_path: &str) -> Response {
    redirect(unauthorized_path)
}

fn redirect(location: &str) -> Response {
    let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

pub fn rate_limited(outcome: &RateLimitOutcome) -> Response {
    let retry_after = outcome.retry_after_seconds.unwrap_or(1);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitBody {
            error: "rate_limited",
            message: "Too many requests, slow down",
            retry_after,
        }),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    with_rate_headers(response, outcome)
}

/// Attach the three `X-RateLimit-*` headers. Applied to throttled and
/// successful responses alike.
pub fn with_rate_headers(mut response: Response, outcome: &RateLimitOutcome) -> Response {
    let headers = response.headers_mut();
    let pairs = [
        (HEADER_LIMIT, outcome.limit.to_string()),
        (HEADER_REMAINING, outcome.remaining.to_string()),
        (HEADER_RESET, outcome.reset_at_millis.to_string()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    response
}

/// Generic 500 for infrastructure faults; details stay in the logs.
pub fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "success": false,
            "error": "Internal server error",
            "code": "INTERNAL",
        })),
    )
        .into_response()
}
