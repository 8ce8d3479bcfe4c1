//! Per-session CSRF tokens.
//!
//! Tokens are issued server-side and verified against the stored value, not
//! merely format-checked: 32 random bytes, hex-encoded for the client, with
//! only a SHA-256 digest and an expiry retained. Comparison is constant-time
//! over the digests.

use crate::clock::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const TOKEN_BYTES: usize = 32;
const DEFAULT_TTL_MINUTES: i64 = 60;

/// Hex format pre-filter; cheap rejection before any lookup.
fn well_formed(token: &str) -> bool {
    Regex::new(r"^[0-9a-f]{64}$").is_ok_and(|re| re.is_match(token))
}

fn digest(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Byte-wise comparison without early exit.
fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Clone)]
pub struct CsrfGuard {
    issued: Arc<DashMap<String, ([u8; 32], DateTime<Utc>)>>,
    clock: Arc<dyn Clock>,
    ttl: ChronoDuration,
}

impl CsrfGuard {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            issued: Arc::new(DashMap::new()),
            clock,
            ttl: ChronoDuration::minutes(DEFAULT_TTL_MINUTES),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: ChronoDuration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a fresh token for `session_id`, replacing any previous one.
    /// Only the raw value is returned to the client; the map keeps a digest.
    pub fn issue(&self, session_id: &str) -> String {
        let now = self.clock.now();
        // Opportunistic pruning keeps the map from accumulating dead sessions.
        self.issued.retain(|_, (_, expiry)| *expiry > now);

        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
        self.issued
            .insert(session_id.to_string(), (digest(&token), now + self.ttl));
        token
    }

    /// Verify a presented token against the value issued for `session_id`.
    #[must_use]
    pub fn verify(&self, session_id: &str, presented: &str) -> bool {
        if !well_formed(presented) {
            return false;
        }
        let Some(entry) = self.issued.get(session_id) else {
            return false;
        };
        let (stored_digest, expiry) = entry.value();
        if *expiry <= self.clock.now() {
            return false;
        }
        constant_time_eq(stored_digest, &digest(presented))
    }

    pub fn revoke(&self, session_id: &str) {
        self.issued.remove(session_id);
    }
}
