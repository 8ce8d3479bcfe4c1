//! Two-factor account endpoints.
//!
//! Flow Overview:
//! 1) `setup` mints a secret, enrollment URI and preview codes; nothing is
//!    persisted yet.
//! 2) `enable` activates the enrollment once the first code checks out and
//!    returns the stored backup codes for one-time display.
//! 3) `verify` checks a time-based or backup code.
//! 4) `disable` clears the enrollment after a current time-based code.
//!
//! Bad codes come back as `success`/`isValid` false; only store faults are
//! 500s. Missing payload fields are rejected before any stateful check.

use super::plausible_code;
use crate::principal::Principal;
use crate::twofactor::TwoFactorService;
use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorSetupResponse {
    pub secret: String,
    /// `otpauth://` URI the frontend renders as a scannable code.
    pub qr_code_url: String,
    pub backup_codes: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorEnableRequest {
    pub secret: String,
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorEnableResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_codes: Option<Vec<String>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorVerifyRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorVerifyResponse {
    pub is_valid: bool,
    pub backup_code_used: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorDisableRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorDisableResponse {
    pub success: bool,
}

fn require_principal(principal: Option<Extension<Principal>>) -> Result<Principal, Response> {
    match principal {
        Some(Extension(principal)) => Ok(principal),
        None => Err(StatusCode::UNAUTHORIZED.into_response()),
    }
}

fn require_token(token: &str) -> Result<(), Response> {
    if token.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing token").into_response());
    }
    if !plausible_code(token.trim()) {
        return Err((StatusCode::BAD_REQUEST, "Malformed token").into_response());
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/account/two-factor/setup",
    responses(
        (status = 200, description = "Enrollment material generated", body = TwoFactorSetupResponse),
        (status = 401, description = "Unauthenticated")
    ),
    tag = "two-factor"
)]
pub async fn setup(
    principal: Option<Extension<Principal>>,
    service: Extension<TwoFactorService>,
) -> Response {
    let principal = match require_principal(principal) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match service.generate_setup(&principal.id) {
        Ok(bundle) => (
            StatusCode::OK,
            Json(TwoFactorSetupResponse {
                secret: bundle.secret,
                qr_code_url: bundle.enrollment_uri,
                backup_codes: bundle.backup_codes,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to generate two-factor setup: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/account/two-factor/enable",
    request_body = TwoFactorEnableRequest,
    responses(
        (status = 200, description = "Enrollment result; backup codes present on success", body = TwoFactorEnableResponse),
        (status = 400, description = "Missing secret or token"),
        (status = 401, description = "Unauthenticated")
    ),
    tag = "two-factor"
)]
pub async fn enable(
    principal: Option<Extension<Principal>>,
    service: Extension<TwoFactorService>,
    payload: Option<Json<TwoFactorEnableRequest>>,
) -> Response {
    let principal = match require_principal(principal) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    if request.secret.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing secret").into_response();
    }
    if let Err(response) = require_token(&request.token) {
        return response;
    }

    match service
        .enable(&principal.id, request.secret.trim(), request.token.trim())
        .await
    {
        Ok(Some(backup_codes)) => (
            StatusCode::OK,
            Json(TwoFactorEnableResponse {
                success: true,
                backup_codes: Some(backup_codes),
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(TwoFactorEnableResponse {
                success: false,
                backup_codes: None,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to enable two-factor: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/account/two-factor/verify",
    request_body = TwoFactorVerifyRequest,
    responses(
        (status = 200, description = "Verification result", body = TwoFactorVerifyResponse),
        (status = 400, description = "Missing token"),
        (status = 401, description = "Unauthenticated")
    ),
    tag = "two-factor"
)]
pub async fn verify(
    principal: Option<Extension<Principal>>,
    service: Extension<TwoFactorService>,
    payload: Option<Json<TwoFactorVerifyRequest>>,
) -> Response {
    let principal = match require_principal(principal) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    if let Err(response) = require_token(&request.token) {
        return response;
    }

    match service.verify(&principal.id, request.token.trim()).await {
        Ok(verification) => (
            StatusCode::OK,
            Json(TwoFactorVerifyResponse {
                is_valid: verification.is_valid,
                backup_code_used: verification.backup_code_used,
            }),
        )
            .into_response(),
        Err(err) => {
            // A degraded store must never read as "invalid code".
            error!("Two-factor verification failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/account/two-factor/disable",
    request_body = TwoFactorDisableRequest,
    responses(
        (status = 200, description = "Disable result", body = TwoFactorDisableResponse),
        (status = 400, description = "Missing token"),
        (status = 401, description = "Unauthenticated")
    ),
    tag = "two-factor"
)]
pub async fn disable(
    principal: Option<Extension<Principal>>,
    service: Extension<TwoFactorService>,
    payload: Option<Json<TwoFactorDisableRequest>>,
) -> Response {
    let principal = match require_principal(principal) {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    if let Err(response) = require_token(&request.token) {
        return response;
    }

    match service.disable(&principal.id, request.token.trim()).await {
        Ok(success) => {
            (StatusCode::OK, Json(TwoFactorDisableResponse { success })).into_response()
        }
        Err(err) => {
            error!("Failed to disable two-factor: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
