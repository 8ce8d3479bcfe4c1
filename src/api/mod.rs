//! HTTP surface: router assembly, middleware layers and the server loop.

use crate::{
    gate::{self, Gate},
    security::CsrfGuard,
    twofactor::TwoFactorService,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    middleware,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the full application router: documented routes, page fallback,
/// the gate middleware and the observability layers.
///
/// Kept separate from [`serve`] so tests can drive the exact production
/// stack without binding a socket.
#[must_use]
pub fn app(gate: Arc<Gate>, twofactor: TwoFactorService, csrf: CsrfGuard) -> Router {
    let (router, _openapi) = openapi::api_router().split_for_parts();
    router
        .fallback(handlers::fallback)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &Request<Body>| {
                        HeaderValue::from_str(Ulid::new().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(middleware::from_fn_with_state(gate, gate::middleware))
                .layer(Extension(twofactor))
                .layer(Extension(csrf)),
        )
}

/// Start the server.
///
/// # Errors
/// Returns an error if the frontend origin is invalid or the listener
/// cannot be bound.
pub async fn serve(
    port: u16,
    frontend_base_url: &str,
    gate: Arc<Gate>,
    twofactor: TwoFactorService,
    csrf: CsrfGuard,
) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(gate::CSRF_HEADER),
            axum::http::header::AUTHORIZATION,
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin(frontend_base_url)?))
        .allow_credentials(true);

    let app = app(gate, twofactor, csrf).layer(cors);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::frontend_origin;

    #[test]
    fn frontend_origin_strips_path_and_keeps_port() {
        let origin = frontend_origin("https://play.example.com:8443/landing").unwrap();
        assert_eq!(origin, "https://play.example.com:8443");
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
