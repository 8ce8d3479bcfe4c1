//! Counter store behind the rate limiter.
//!
//! The store owns the counters; the limiter only computes window keys and
//! interprets counts. The production deployment points this at a shared
//! counter service, the in-memory implementation covers tests and
//! single-node setups.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key` and return the post-increment count.
    ///
    /// The increment that creates the key attaches `ttl` as its expiry so
    /// stale windows self-clean.
    ///
    /// # Errors
    /// Returns [`CounterError::Unavailable`] when the store cannot be
    /// reached; the limiter treats that as fail-open.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, CounterError>;
}

/// In-memory counters on a concurrent map. Entries are replaced in place
/// once their deadline passes; the per-shard entry lock makes
/// check-then-increment atomic.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, (u64, Instant)>,
}

impl MemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, CounterError> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert((0, now + ttl));
        if entry.1 <= now {
            *entry = (0, now + ttl);
        }
        entry.0 += 1;
        Ok(entry.0)
    }
}

/// Store that always fails, for exercising the fail-open path.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableCounterStore;

#[async_trait]
impl CounterStore for UnavailableCounterStore {
    async fn increment(&self, _key: &str, _ttl: Duration) -> Result<u64, CounterError> {
        Err(CounterError::Unavailable("not configured".to_string()))
    }
}
