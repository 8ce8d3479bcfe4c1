//! Authenticated principal and its resolver collaborator.
//!
//! Credential exchange happens outside this service; whatever performs it
//! (OAuth callback, session service) hands the gate a resolver that maps the
//! request's bearer credential to a verified principal. A resolver failure is
//! an infrastructure fault and must surface as a 500, never as "anonymous".

use crate::policy::Role;
use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

/// Verified identity attached to a request; absent for anonymous traffic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("principal store unavailable: {0}")]
    StoreUnavailable(String),
}

#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Resolve the request's credential to a principal.
    ///
    /// `Ok(None)` means anonymous; only genuine store faults are errors.
    ///
    /// # Errors
    /// Returns [`ResolveError::StoreUnavailable`] when the backing session
    /// store cannot be reached.
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, ResolveError>;
}

/// Resolver that treats every request as anonymous. Mirrors the no-op rate
/// limiter: a safe default until a real session backend is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousResolver;

#[async_trait]
impl PrincipalResolver for AnonymousResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Principal>, ResolveError> {
        Ok(None)
    }
}

/// Bearer-token resolver over a shared token map.
///
/// Used by tests and local development; production deployments substitute a
/// resolver backed by the platform's session service.
#[derive(Clone, Debug, Default)]
pub struct TokenMapResolver {
    tokens: Arc<DashMap<String, Principal>>,
}

impl TokenMapResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, principal: Principal) {
        self.tokens.insert(token.into(), principal);
    }

    pub fn revoke(&self, token: &str) {
        self.tokens.remove(token);
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl PrincipalResolver for TokenMapResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, ResolveError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };
        Ok(self.tokens.get(token).map(|entry| entry.value().clone()))
    }
}
