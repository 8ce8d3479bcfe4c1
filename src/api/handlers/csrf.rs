//! CSRF token issuance for authenticated sessions.
//!
//! The gate verifies the `x-csrf-token` header on mutating API requests
//! against the value issued here; tokens are per-principal and expire.

use crate::principal::Principal;
use crate::security::CsrfGuard;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CsrfTokenResponse {
    pub token: String,
}

#[utoipa::path(
    get,
    path = "/api/csrf",
    responses(
        (status = 200, description = "Fresh CSRF token for the session", body = CsrfTokenResponse),
        (status = 401, description = "Unauthenticated")
    ),
    tag = "security"
)]
pub async fn issue(
    principal: Option<Extension<Principal>>,
    csrf: Extension<CsrfGuard>,
) -> impl IntoResponse {
    let Some(Extension(principal)) = principal else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let token = csrf.issue(&principal.id);
    (StatusCode::OK, Json(CsrfTokenResponse { token })).into_response()
}
