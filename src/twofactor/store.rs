//! Record store behind the two-factor verifier.
//!
//! Failure counting and backup-code consumption are single conditioned
//! operations on the store so concurrent verification attempts for one
//! principal cannot lose updates: a backup code is consumed by at most one
//! caller, and every failure lands in the counter exactly once.

use super::models::TwoFactorRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwoFactorStoreError {
    #[error("two-factor store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TwoFactorStore: Send + Sync {
    /// # Errors
    /// Returns [`TwoFactorStoreError::Unavailable`] when the store cannot be
    /// reached. The verifier fails closed on that.
    async fn load(&self, principal_id: &str) -> Result<Option<TwoFactorRecord>, TwoFactorStoreError>;

    /// Persist `secret` as the active enrollment with a fresh code batch,
    /// replacing any previous record.
    async fn activate(
        &self,
        principal_id: &str,
        secret: &str,
        backup_code_hashes: Vec<String>,
    ) -> Result<(), TwoFactorStoreError>;

    /// Drop the enrollment entirely.
    async fn deactivate(&self, principal_id: &str) -> Result<(), TwoFactorStoreError>;

    /// Atomically remove one backup code by hash. Returns whether this
    /// caller consumed it; a second concurrent caller sees `false`.
    async fn consume_backup_code(
        &self,
        principal_id: &str,
        code_hash: &str,
    ) -> Result<bool, TwoFactorStoreError>;

    /// Atomically increment the failure counter, returning the new value.
    async fn register_failure(&self, principal_id: &str) -> Result<u32, TwoFactorStoreError>;

    async fn apply_lock(
        &self,
        principal_id: &str,
        until: DateTime<Utc>,
    ) -> Result<(), TwoFactorStoreError>;

    /// Reset the failure counter and clear any lock.
    async fn clear_failures(&self, principal_id: &str) -> Result<(), TwoFactorStoreError>;

    async fn record_verified(
        &self,
        principal_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), TwoFactorStoreError>;
}

/// In-memory records on a concurrent map; each operation holds the entry
/// lock for its full read-modify-write.
#[derive(Debug, Default)]
pub struct MemoryTwoFactorStore {
    records: DashMap<String, TwoFactorRecord>,
}

impl MemoryTwoFactorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TwoFactorStore for MemoryTwoFactorStore {
    async fn load(&self, principal_id: &str) -> Result<Option<TwoFactorRecord>, TwoFactorStoreError> {
        Ok(self.records.get(principal_id).map(|entry| entry.value().clone()))
    }

    async fn activate(
        &self,
        principal_id: &str,
        secret: &str,
        backup_code_hashes: Vec<String>,
    ) -> Result<(), TwoFactorStoreError> {
        self.records.insert(
            principal_id.to_string(),
            TwoFactorRecord {
                secret: SecretString::from(secret.to_string()),
                backup_code_hashes,
                failed_attempts: 0,
                locked_until: None,
                verified_at: None,
            },
        );
        Ok(())
    }

    async fn deactivate(&self, principal_id: &str) -> Result<(), TwoFactorStoreError> {
        self.records.remove(principal_id);
        Ok(())
    }

    async fn consume_backup_code(
        &self,
        principal_id: &str,
        code_hash: &str,
    ) -> Result<bool, TwoFactorStoreError> {
        let Some(mut entry) = self.records.get_mut(principal_id) else {
            return Ok(false);
        };
        let before = entry.backup_code_hashes.len();
        entry.backup_code_hashes.retain(|hash| hash != code_hash);
        Ok(entry.backup_code_hashes.len() < before)
    }

    async fn register_failure(&self, principal_id: &str) -> Result<u32, TwoFactorStoreError> {
        let Some(mut entry) = self.records.get_mut(principal_id) else {
            return Ok(0);
        };
        entry.failed_attempts += 1;
        Ok(entry.failed_attempts)
    }

    async fn apply_lock(
        &self,
        principal_id: &str,
        until: DateTime<Utc>,
    ) -> Result<(), TwoFactorStoreError> {
        if let Some(mut entry) = self.records.get_mut(principal_id) {
            entry.locked_until = Some(until);
        }
        Ok(())
    }

    async fn clear_failures(&self, principal_id: &str) -> Result<(), TwoFactorStoreError> {
        if let Some(mut entry) = self.records.get_mut(principal_id) {
            entry.failed_attempts = 0;
            entry.locked_until = None;
        }
        Ok(())
    }

    async fn record_verified(
        &self,
        principal_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), TwoFactorStoreError> {
        if let Some(mut entry) = self.records.get_mut(principal_id) {
            entry.verified_at = Some(at);
        }
        Ok(())
    }
}

/// Store that always fails, for exercising the fail-closed path.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableTwoFactorStore;

#[async_trait]
impl TwoFactorStore for UnavailableTwoFactorStore {
    async fn load(&self, _: &str) -> Result<Option<TwoFactorRecord>, TwoFactorStoreError> {
        Err(TwoFactorStoreError::Unavailable("not configured".to_string()))
    }

    async fn activate(
        &self,
        _: &str,
        _: &str,
        _: Vec<String>,
    ) -> Result<(), TwoFactorStoreError> {
        Err(TwoFactorStoreError::Unavailable("not configured".to_string()))
    }

    async fn deactivate(&self, _: &str) -> Result<(), TwoFactorStoreError> {
        Err(TwoFactorStoreError::Unavailable("not configured".to_string()))
    }

    async fn consume_backup_code(&self, _: &str, _: &str) -> Result<bool, TwoFactorStoreError> {
        Err(TwoFactorStoreError::Unavailable("not configured".to_string()))
    }

    async fn register_failure(&self, _: &str) -> Result<u32, TwoFactorStoreError> {
        Err(TwoFactorStoreError::Unavailable("not configured".to_string()))
    }

    async fn apply_lock(&self, _: &str, _: DateTime<Utc>) -> Result<(), TwoFactorStoreError> {
        Err(TwoFactorStoreError::Unavailable("not configured".to_string()))
    }

    async fn clear_failures(&self, _: &str) -> Result<(), TwoFactorStoreError> {
        Err(TwoFactorStoreError::Unavailable("not configured".to_string()))
    }

    async fn record_verified(&self, _: &str, _: DateTime<Utc>) -> Result<(), TwoFactorStoreError> {
        Err(TwoFactorStoreError::Unavailable("not configured".to_string()))
    }
}
