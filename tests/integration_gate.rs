//! End-to-end tests for the gateway: the full router with the gate
//! middleware installed, driven in-process without a socket.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::TimeZone;
use http_body_util::BodyExt;
use pordisto::{
    api,
    clock::ManualClock,
    gate::{CSRF_HEADER, Gate, GateConfig},
    policy::{PolicyTable, Role},
    principal::{Principal, PrincipalResolver, ResolveError, TokenMapResolver},
    ratelimit::{
        CounterStore, EndpointClass, MemoryCounterStore, RateLimitConfig, RateLimitSettings,
        RateLimiter, UnavailableCounterStore,
    },
    security::CsrfGuard,
    twofactor::{MemoryTwoFactorStore, TwoFactorService},
};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    clock: ManualClock,
    resolver: TokenMapResolver,
}

struct TestAppConfig {
    api_limit: RateLimitConfig,
    csrf_protection: bool,
    counter_store: Arc<dyn CounterStore>,
}

impl Default for TestAppConfig {
    fn default() -> Self {
        Self {
            api_limit: RateLimitConfig::new(std::time::Duration::from_secs(60), 100),
            csrf_protection: false,
            counter_store: Arc::new(MemoryCounterStore::new()),
        }
    }
}

fn build_app(config: TestAppConfig) -> TestApp {
    let clock = ManualClock::new(chrono::Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    let clock_arc: Arc<ManualClock> = Arc::new(clock.clone());

    let resolver = TokenMapResolver::new();
    resolver.insert(
        "player-token",
        Principal {
            id: "player-1".to_string(),
            role: Role::Player,
        },
    );
    resolver.insert(
        "moderator-token",
        Principal {
            id: "mod-1".to_string(),
            role: Role::Moderator,
        },
    );
    resolver.insert(
        "developer-token",
        Principal {
            id: "dev-1".to_string(),
            role: Role::Developer,
        },
    );
    resolver.insert(
        "admin-token",
        Principal {
            id: "admin-1".to_string(),
            role: Role::Admin,
        },
    );

    let settings = RateLimitSettings::new().with_class(EndpointClass::Api, config.api_limit);
    let limiter = RateLimiter::new(config.counter_store, clock_arc.clone(), settings);
    let csrf = CsrfGuard::new(clock_arc.clone());
    let twofactor = TwoFactorService::new(
        Arc::new(MemoryTwoFactorStore::new()),
        clock_arc,
        "Pordisto Arcade".to_string(),
    );

    let gate = Arc::new(Gate::new(
        PolicyTable::platform_defaults(),
        limiter,
        Arc::new(resolver.clone()),
        csrf.clone(),
        GateConfig::new().with_csrf_protection(config.csrf_protection),
    ));

    TestApp {
        router: api::app(gate, twofactor, csrf),
        clock,
        resolver,
    }
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("request")
}

fn get_as(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

fn post_json(path: &str, token: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn anonymous_admin_page_redirects_to_signin_with_callback() {
    let app = build_app(TestAppConfig::default());
    let response = app.router.oneshot(get("/admin/anything")).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/signin?callbackUrl=%2Fadmin%2Fanything"
    );
}

#[tokio::test]
async fn player_gets_403_json_on_admin_api() {
    let app = build_app(TestAppConfig::default());
    let response = app
        .router
        .oneshot(get_as("/api/admin/stats", "player-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["success"], serde_json::json!(false));
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(body["requiredRole"], "ADMIN");
}

#[tokio::test]
async fn admin_reaches_admin_api() {
    let app = build_app(TestAppConfig::default());
    let response = app
        .router
        .oneshot(get_as("/api/admin/stats", "admin-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["requestedBy"], "admin-1");
}

#[tokio::test]
async fn anonymous_admin_api_gets_401_json() {
    let app = build_app(TestAppConfig::default());
    let response = app.router.oneshot(get("/api/admin/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn forbidden_page_redirects_to_unauthorized() {
    let app = build_app(TestAppConfig::default());
    // Developers do not get moderation surfaces.
    let response = app
        .router
        .oneshot(get_as("/moderate/reports", "developer-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/unauthorized"
    );
}

#[tokio::test]
async fn moderator_passes_the_moderation_gate() {
    let app = build_app(TestAppConfig::default());
    let response = app
        .router
        .oneshot(get_as("/moderate/reports", "moderator-token"))
        .await
        .unwrap();

    // Forwarded past the gate; page rendering lives elsewhere, so the
    // fallback answers.
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn static_assets_bypass_the_gate_entirely() {
    let app = build_app(TestAppConfig::default());
    let response = app.router.oneshot(get("/static/covers/halo.png")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    // Bypassed requests are not rate-limited, so no budget headers.
    assert!(response.headers().get("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn public_paths_allow_anonymous_and_carry_budget_headers() {
    let app = build_app(TestAppConfig::default());
    let response = app.router.oneshot(get("/browse/featured")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get("x-ratelimit-limit").is_some());
}

#[tokio::test]
async fn api_requests_over_budget_get_429_with_headers() {
    let app = build_app(TestAppConfig {
        api_limit: RateLimitConfig::new(std::time::Duration::from_secs(60), 3),
        ..TestAppConfig::default()
    });

    for n in 1..=3 {
        let response = app
            .router
            .clone()
            .oneshot(get_as("/api/library", "player-token"))
            .await
            .unwrap();
        assert_ne!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "request {n} should pass"
        );
    }

    let response = app
        .router
        .clone()
        .oneshot(get_as("/api/library", "player-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");
    let body = json_body(response).await;
    assert_eq!(body["retryAfter"], 60);

    // The next window starts fresh.
    app.clock.advance(chrono::Duration::seconds(61));
    let response = app
        .router
        .oneshot(get_as("/api/library", "player-token"))
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn rate_limit_rejection_precedes_authorization() {
    let app = build_app(TestAppConfig {
        api_limit: RateLimitConfig::new(std::time::Duration::from_secs(60), 1),
        ..TestAppConfig::default()
    });

    let first = app
        .router
        .clone()
        .oneshot(get_as("/api/admin/stats", "player-token"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::FORBIDDEN);

    // Over budget now: throttled before the 403 would even be computed.
    let second = app
        .router
        .oneshot(get_as("/api/admin/stats", "player-token"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unreachable_counter_store_fails_open() {
    let app = build_app(TestAppConfig {
        api_limit: RateLimitConfig::new(std::time::Duration::from_secs(60), 1),
        counter_store: Arc::new(UnavailableCounterStore),
        ..TestAppConfig::default()
    });

    for _ in 0..5 {
        let response = app
            .router
            .clone()
            .oneshot(get_as("/api/library", "player-token"))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

struct OutageResolver;

#[async_trait::async_trait]
impl PrincipalResolver for OutageResolver {
    async fn resolve(
        &self,
        _headers: &axum::http::HeaderMap,
    ) -> Result<Option<Principal>, ResolveError> {
        Err(ResolveError::StoreUnavailable("session db down".to_string()))
    }
}

#[tokio::test]
async fn principal_store_outage_is_500_not_anonymous() {
    let clock: Arc<ManualClock> = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ));
    let csrf = CsrfGuard::new(clock.clone());
    let gate = Arc::new(Gate::new(
        PolicyTable::platform_defaults(),
        RateLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            clock.clone(),
            RateLimitSettings::new(),
        ),
        Arc::new(OutageResolver),
        csrf.clone(),
        GateConfig::new(),
    ));
    let twofactor = TwoFactorService::new(
        Arc::new(MemoryTwoFactorStore::new()),
        clock,
        "Pordisto Arcade".to_string(),
    );
    let router = api::app(gate, twofactor, csrf);

    // Were the outage treated as anonymous, this would be a 307 redirect.
    let response = router.oneshot(get("/account")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

fn current_code(secret_base32: &str) -> String {
    use totp_rs::{Algorithm, Secret, TOTP};
    let secret = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .expect("secret");
    TOTP::new(Algorithm::SHA1, 6, 2, 30, secret, None, "test".to_string())
        .expect("totp")
        .generate_current()
        .expect("code")
}

#[tokio::test]
async fn two_factor_lifecycle_over_http() {
    let app = build_app(TestAppConfig::default());
    let router = app.router;

    // Setup: enrollment material, nothing persisted yet.
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/account/two-factor/setup",
            "player-token",
            &serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let setup = json_body(response).await;
    let secret = setup["secret"].as_str().expect("secret").to_string();
    assert!(setup["qrCodeUrl"].as_str().unwrap().starts_with("otpauth://totp/"));
    assert_eq!(setup["backupCodes"].as_array().unwrap().len(), 10);

    // Enable with the current code; the response carries the stored batch.
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/account/two-factor/enable",
            "player-token",
            &serde_json::json!({ "secret": secret, "token": current_code(&secret) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let enabled = json_body(response).await;
    assert_eq!(enabled["success"], serde_json::json!(true));
    let backup_codes: Vec<String> = enabled["backupCodes"]
        .as_array()
        .expect("stored codes")
        .iter()
        .map(|code| code.as_str().unwrap().to_string())
        .collect();
    assert_eq!(backup_codes.len(), 10);

    // Verify with a fresh time-based code.
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/account/two-factor/verify",
            "player-token",
            &serde_json::json!({ "token": current_code(&secret) }),
        ))
        .await
        .unwrap();
    let verified = json_body(response).await;
    assert_eq!(verified["isValid"], serde_json::json!(true));
    assert_eq!(verified["backupCodeUsed"], serde_json::json!(false));

    // A backup code works exactly once.
    let backup = &backup_codes[0];
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/account/two-factor/verify",
            "player-token",
            &serde_json::json!({ "token": backup }),
        ))
        .await
        .unwrap();
    let first_use = json_body(response).await;
    assert_eq!(first_use["isValid"], serde_json::json!(true));
    assert_eq!(first_use["backupCodeUsed"], serde_json::json!(true));

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/account/two-factor/verify",
            "player-token",
            &serde_json::json!({ "token": backup }),
        ))
        .await
        .unwrap();
    let replay = json_body(response).await;
    assert_eq!(replay["isValid"], serde_json::json!(false));

    // Disable with a current code.
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/account/two-factor/disable",
            "player-token",
            &serde_json::json!({ "token": current_code(&secret) }),
        ))
        .await
        .unwrap();
    let disabled = json_body(response).await;
    assert_eq!(disabled["success"], serde_json::json!(true));
}

#[tokio::test]
async fn missing_token_is_400_before_any_state_change() {
    let app = build_app(TestAppConfig::default());
    let response = app
        .router
        .oneshot(post_json(
            "/api/account/two-factor/verify",
            "player-token",
            &serde_json::json!({ "token": "" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn two_factor_endpoints_require_authentication() {
    let app = build_app(TestAppConfig::default());
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/account/two-factor/setup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mutating_api_requests_need_an_issued_csrf_token() {
    let app = build_app(TestAppConfig {
        csrf_protection: true,
        ..TestAppConfig::default()
    });
    let router = app.router;

    // Without a token the gate refuses the mutation.
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/account/two-factor/setup",
            "player-token",
            &serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // A 64-hex string that was never issued is refused too.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/account/two-factor/setup")
                .header(header::AUTHORIZATION, "Bearer player-token")
                .header(header::CONTENT_TYPE, "application/json")
                .header(CSRF_HEADER, "ab".repeat(32))
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Fetch the real token, then the mutation passes the gate.
    let response = router
        .clone()
        .oneshot(get_as("/api/csrf", "player-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let issued = json_body(response).await;
    let token = issued["token"].as_str().expect("token");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/account/two-factor/setup")
                .header(header::AUTHORIZATION, "Bearer player-token")
                .header(header::CONTENT_TYPE, "application/json")
                .header(CSRF_HEADER, token)
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn revoked_session_becomes_anonymous() {
    let app = build_app(TestAppConfig::default());
    let response = app
        .router
        .clone()
        .oneshot(get_as("/account", "player-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.resolver.revoke("player-token");
    let response = app
        .router
        .oneshot(get_as("/account", "player-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}
