//! Admin console endpoints. The gate admits only `ADMIN` principals here;
//! the handlers do not re-check roles.

use crate::GIT_COMMIT_HASH;
use crate::principal::Principal;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    service: String,
    version: String,
    commit: String,
    requested_by: String,
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Platform service stats", body = AdminStats),
        (status = 401, description = "Unauthenticated"),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "admin"
)]
pub async fn stats(principal: Option<Extension<Principal>>) -> impl IntoResponse {
    let Some(Extension(principal)) = principal else {
        // Unreachable when the gate is installed; kept so the route fails
        // safe if mounted without it.
        return StatusCode::UNAUTHORIZED.into_response();
    };
    (
        StatusCode::OK,
        Json(AdminStats {
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: GIT_COMMIT_HASH.to_string(),
            requested_by: principal.id,
        }),
    )
        .into_response()
}
