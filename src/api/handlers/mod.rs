//! Route handlers and shared request-validation helpers.
//!
//! Handlers trust the gate for authorization and rate limiting: by the time
//! a request arrives here it has already been classified, throttled and
//! role-checked. What remains is payload validation and the actual work.

pub mod admin;
pub mod csrf;
pub mod health;
pub mod twofactor;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;

/// Cheap shape check for one-time and backup codes, applied before any
/// stateful verification. Six digits (TOTP) up to twelve characters
/// (formatted backup codes) from the code alphabets.
pub(crate) fn plausible_code(token: &str) -> bool {
    Regex::new(r"^[0-9A-Za-z-]{6,12}$").is_ok_and(|re| re.is_match(token))
}

/// 404 fallback for paths the gate forwarded but no route serves; page
/// rendering lives in the platform frontend, not here.
pub async fn fallback() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not_found" })),
    )
        .into_response()
}
