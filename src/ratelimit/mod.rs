//! Fixed-window rate limiting keyed by namespaced identity.
//!
//! Flow Overview:
//! 1) Resolve the caller to an identity: `user:{id}` when authenticated,
//!    `ip:{addr}` otherwise. The namespaces keep the two spaces disjoint.
//! 2) Bucket the request into `floor(now / window)` and atomically increment
//!    the counter for `(class, identity, window)`.
//! 3) Allowed while the post-increment count stays within the class limit.
//!
//! The store call is bounded by a timeout and the limiter fails open: when
//! counters are unreachable, traffic flows and a warning is logged.
//! Availability is deliberately favored over strict enforcement here.

mod store;

pub use store::{CounterError, CounterStore, MemoryCounterStore, UnavailableCounterStore};

use crate::clock::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Endpoint classes with distinct budgets. Authentication and payment
/// endpoints are throttled harder than general reads.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EndpointClass {
    Auth,
    Payment,
    Api,
    Page,
}

impl EndpointClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Payment => "payment",
            Self::Api => "api",
            Self::Page => "page",
        }
    }
}

/// Caller identity for counter keys.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Identity {
    User(String),
    Ip(String),
}

impl Identity {
    /// Namespaced key fragment; `user:` and `ip:` never collide.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::User(id) => format!("user:{id}"),
            Self::Ip(addr) => format!("ip:{addr}"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u64,
}

impl RateLimitConfig {
    #[must_use]
    pub const fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// Per-class budgets plus the store-call timeout.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitSettings {
    auth: RateLimitConfig,
    payment: RateLimitConfig,
    api: RateLimitConfig,
    page: RateLimitConfig,
    store_timeout: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            auth: RateLimitConfig::new(Duration::from_secs(60), 10),
            payment: RateLimitConfig::new(Duration::from_secs(60), 30),
            api: RateLimitConfig::new(Duration::from_secs(60), 100),
            page: RateLimitConfig::new(Duration::from_secs(60), 300),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl RateLimitSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_class(mut self, class: EndpointClass, config: RateLimitConfig) -> Self {
        match class {
            EndpointClass::Auth => self.auth = config,
            EndpointClass::Payment => self.payment = config,
            EndpointClass::Api => self.api = config,
            EndpointClass::Page => self.page = config,
        }
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn config(&self, class: EndpointClass) -> RateLimitConfig {
        match class {
            EndpointClass::Auth => self.auth,
            EndpointClass::Payment => self.payment,
            EndpointClass::Api => self.api,
            EndpointClass::Page => self.page,
        }
    }
}

/// Result of a limiter check, carrying everything the boundary needs for
/// the `X-RateLimit-*` headers and the 429 body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RateLimitOutcome {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Epoch milliseconds at which the current window closes.
    pub reset_at_millis: i64,
    pub retry_after_seconds: Option<u64>,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    #[must_use]
    pub fn new(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        settings: RateLimitSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Count this request against `identity`'s window for `class`.
    ///
    /// Never fails: store errors and timeouts degrade to an allowed
    /// outcome with the full budget reported as remaining.
    pub async fn check(&self, identity: &Identity, class: EndpointClass) -> RateLimitOutcome {
        let config = self.settings.config(class);
        let window_millis = i64::try_from(config.window.as_millis()).unwrap_or(i64::MAX);
        let now = self.clock.now_millis();
        let window_index = now.div_euclid(window_millis);
        let reset_at_millis = (window_index + 1).saturating_mul(window_millis);
        let key = format!("rl:{}:{}:{window_index}", class.as_str(), identity.key());

        let increment = self.store.increment(&key, config.window);
        let count = match tokio::time::timeout(self.settings.store_timeout, increment).await {
            Ok(Ok(count)) => count,
            Ok(Err(err)) => {
                warn!(class = class.as_str(), "counter store failed, allowing: {err}");
                return Self::fail_open(&config, reset_at_millis);
            }
            Err(_) => {
                warn!(
                    class = class.as_str(),
                    "counter store timed out, allowing request"
                );
                return Self::fail_open(&config, reset_at_millis);
            }
        };

        let allowed = count <= config.max_requests;
        RateLimitOutcome {
            allowed,
            limit: config.max_requests,
            remaining: config.max_requests.saturating_sub(count),
            reset_at_millis,
            retry_after_seconds: (!allowed).then(|| retry_after_seconds(&config)),
        }
    }

    fn fail_open(config: &RateLimitConfig, reset_at_millis: i64) -> RateLimitOutcome {
        RateLimitOutcome {
            allowed: true,
            limit: config.max_requests,
            remaining: config.max_requests,
            reset_at_millis,
            retry_after_seconds: None,
        }
    }
}

/// Advertised wait once a window is exhausted: the window length, rounded
/// up to whole seconds.
fn retry_after_seconds(config: &RateLimitConfig) -> u64 {
    config.window.as_millis().div_ceil(1000).try_into().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::TimeZone;

    fn limiter_with(
        store: Arc<dyn CounterStore>,
        clock: ManualClock,
        max_requests: u64,
        window: Duration,
    ) -> RateLimiter {
        let settings = RateLimitSettings::new()
            .with_class(EndpointClass::Api, RateLimitConfig::new(window, max_requests));
        RateLimiter::new(store, Arc::new(clock), settings)
    }

    fn test_clock() -> ManualClock {
        ManualClock::new(chrono::Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn eleventh_request_in_window_is_rejected() {
        let clock = test_clock();
        let limiter = limiter_with(
            Arc::new(MemoryCounterStore::new()),
            clock.clone(),
            10,
            Duration::from_secs(60),
        );
        let identity = Identity::User("u-1".to_string());

        for n in 1..=10 {
            let outcome = limiter.check(&identity, EndpointClass::Api).await;
            assert!(outcome.allowed, "request {n} should pass");
            assert_eq!(outcome.remaining, 10 - n);
        }
        let outcome = limiter.check(&identity, EndpointClass::Api).await;
        assert!(!outcome.allowed);
        assert_eq!(outcome.remaining, 0);
        assert_eq!(outcome.retry_after_seconds, Some(60));
    }

    #[tokio::test]
    async fn next_window_resets_the_count() {
        let clock = test_clock();
        let limiter = limiter_with(
            Arc::new(MemoryCounterStore::new()),
            clock.clone(),
            1,
            Duration::from_secs(60),
        );
        let identity = Identity::Ip("203.0.113.9".to_string());

        assert!(limiter.check(&identity, EndpointClass::Api).await.allowed);
        assert!(!limiter.check(&identity, EndpointClass::Api).await.allowed);

        clock.advance(chrono::Duration::seconds(61));
        let outcome = limiter.check(&identity, EndpointClass::Api).await;
        assert!(outcome.allowed);
        assert_eq!(outcome.remaining, 0);
    }

    #[tokio::test]
    async fn identities_do_not_share_windows() {
        let clock = test_clock();
        let limiter = limiter_with(
            Arc::new(MemoryCounterStore::new()),
            clock,
            1,
            Duration::from_secs(60),
        );

        assert!(
            limiter
                .check(&Identity::User("u-1".to_string()), EndpointClass::Api)
                .await
                .allowed
        );
        // Same text as the user id, but in the ip namespace.
        assert!(
            limiter
                .check(&Identity::Ip("u-1".to_string()), EndpointClass::Api)
                .await
                .allowed
        );
    }

    #[tokio::test]
    async fn unreachable_store_fails_open() {
        let clock = test_clock();
        let limiter = limiter_with(
            Arc::new(UnavailableCounterStore),
            clock,
            1,
            Duration::from_secs(60),
        );
        let identity = Identity::User("u-1".to_string());

        for _ in 0..5 {
            let outcome = limiter.check(&identity, EndpointClass::Api).await;
            assert!(outcome.allowed);
            assert_eq!(outcome.remaining, 1);
        }
    }

    #[tokio::test]
    async fn reset_marks_the_end_of_the_current_window() {
        let clock = test_clock();
        let now = clock.now_millis();
        let limiter = limiter_with(
            Arc::new(MemoryCounterStore::new()),
            clock,
            10,
            Duration::from_secs(60),
        );
        let outcome = limiter
            .check(&Identity::User("u-1".to_string()), EndpointClass::Api)
            .await;
        assert!(outcome.reset_at_millis > now);
        assert!(outcome.reset_at_millis <= now + 60_000);
    }
}
