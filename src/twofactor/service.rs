//! Two-factor verification service.
//!
//! Flow Overview:
//! 1) `generate_setup` mints a secret, an `otpauth://` URI and preview backup
//!    codes. Nothing is persisted.
//! 2) `enable` proves possession of the secret with a first code, then
//!    activates the enrollment with a freshly generated stored code batch.
//! 3) `verify` checks a time-based code (±2 steps), falls back to single-use
//!    backup codes, and locks the principal for 15 minutes after 5 failures.
//! 4) `disable` requires a current time-based code before clearing state.
//!
//! All operations report bad codes as `false`/invalid results; errors are
//! reserved for store faults, which fail closed.

use super::backup::BackupCodeBatch;
use super::backup::hash_backup_code;
use super::models::{SetupBundle, Verification};
use super::store::{TwoFactorStore, TwoFactorStoreError};
use crate::clock::Clock;
use chrono::Duration as ChronoDuration;
use secrecy::ExposeSecret;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{debug, warn};

const TOTP_DIGITS: usize = 6;
/// Accepted clock drift in 30-second steps on either side.
const TOTP_SKEW: u8 = 2;
const TOTP_STEP_SECONDS: u64 = 30;
const MAX_FAILED_ATTEMPTS: u32 = 5;
const LOCKOUT_MINUTES: i64 = 15;
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum TwoFactorError {
    #[error(transparent)]
    Store(#[from] TwoFactorStoreError),
    #[error("two-factor store timed out")]
    StoreTimeout,
    #[error("invalid secret material: {0}")]
    Secret(String),
}

#[derive(Clone)]
pub struct TwoFactorService {
    store: Arc<dyn TwoFactorStore>,
    clock: Arc<dyn Clock>,
    issuer: String,
    store_timeout: Duration,
}

impl TwoFactorService {
    #[must_use]
    pub fn new(store: Arc<dyn TwoFactorStore>, clock: Arc<dyn Clock>, issuer: String) -> Self {
        Self {
            store,
            clock,
            issuer,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Mint enrollment material for a principal. Nothing is persisted or
    /// activated; the returned backup codes are a preview, the stored batch
    /// is generated by [`Self::enable`].
    ///
    /// # Errors
    /// Returns [`TwoFactorError::Secret`] if secret generation fails.
    pub fn generate_setup(&self, principal_id: &str) -> Result<SetupBundle, TwoFactorError> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|err| TwoFactorError::Secret(format!("{err:?}")))?;
        let totp = self.build_totp(secret_bytes, principal_id)?;
        let batch = BackupCodeBatch::generate();
        Ok(SetupBundle {
            secret: totp.get_secret_base32(),
            enrollment_uri: totp.get_url(),
            backup_codes: batch.codes,
        })
    }

    /// Activate an enrollment once the candidate code proves possession of
    /// `secret`. On success the stored batch of backup codes is returned for
    /// one-time display; on a bad code nothing is persisted and `None` comes
    /// back.
    ///
    /// # Errors
    /// Returns an error when the secret is malformed or the store fails.
    pub async fn enable(
        &self,
        principal_id: &str,
        secret: &str,
        candidate_code: &str,
    ) -> Result<Option<Vec<String>>, TwoFactorError> {
        let totp = self.totp_from_base32(secret, principal_id)?;
        if !totp.check_current(candidate_code).unwrap_or(false) {
            debug!(principal_id, "enable rejected: code does not match secret");
            return Ok(None);
        }

        let batch = BackupCodeBatch::generate();
        self.bounded(self.store.activate(
            principal_id,
            &totp.get_secret_base32(),
            batch.code_hashes,
        ))
        .await?;
        Ok(Some(batch.codes))
    }

    /// Verify a time-based or backup code against the active enrollment.
    ///
    /// # Errors
    /// Store faults surface as errors so a degraded store is never reported
    /// as "invalid code".
    pub async fn verify(
        &self,
        principal_id: &str,
        candidate_code: &str,
    ) -> Result<Verification, TwoFactorError> {
        let Some(record) = self.bounded(self.store.load(principal_id)).await? else {
            return Ok(Verification::invalid());
        };

        let now = self.clock.now();
        if let Some(locked_until) = record.locked_until
            && locked_until > now
        {
            debug!(principal_id, %locked_until, "verification while locked");
            return Ok(Verification::invalid());
        }

        let totp = self.totp_from_base32(record.secret.expose_secret(), principal_id)?;
        if totp.check_current(candidate_code).unwrap_or(false) {
            self.bounded(self.store.clear_failures(principal_id)).await?;
            self.bounded(self.store.record_verified(principal_id, now))
                .await?;
            return Ok(Verification::totp());
        }

        let code_hash = hash_backup_code(candidate_code);
        if self
            .bounded(self.store.consume_backup_code(principal_id, &code_hash))
            .await?
        {
            self.bounded(self.store.clear_failures(principal_id)).await?;
            return Ok(Verification::backup());
        }

        let failures = self.bounded(self.store.register_failure(principal_id)).await?;
        if failures >= MAX_FAILED_ATTEMPTS {
            let until = now + ChronoDuration::minutes(LOCKOUT_MINUTES);
            warn!(principal_id, %until, "two-factor lockout engaged");
            self.bounded(self.store.apply_lock(principal_id, until)).await?;
        }
        Ok(Verification::invalid())
    }

    /// Clear the enrollment after a current time-based code. Backup codes
    /// are not accepted here.
    ///
    /// # Errors
    /// Returns an error when the store fails or the stored secret is
    /// malformed.
    pub async fn disable(
        &self,
        principal_id: &str,
        candidate_code: &str,
    ) -> Result<bool, TwoFactorError> {
        let Some(record) = self.bounded(self.store.load(principal_id)).await? else {
            return Ok(false);
        };
        let totp = self.totp_from_base32(record.secret.expose_secret(), principal_id)?;
        if !totp.check_current(candidate_code).unwrap_or(false) {
            return Ok(false);
        }
        self.bounded(self.store.deactivate(principal_id)).await?;
        Ok(true)
    }

    /// Whether the principal has an active enrollment.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn is_enrolled(&self, principal_id: &str) -> Result<bool, TwoFactorError> {
        Ok(self.bounded(self.store.load(principal_id)).await?.is_some())
    }

    fn totp_from_base32(&self, secret: &str, account: &str) -> Result<TOTP, TwoFactorError> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|err| TwoFactorError::Secret(format!("{err:?}")))?;
        self.build_totp(secret_bytes, account)
    }

    fn build_totp(&self, secret_bytes: Vec<u8>, account: &str) -> Result<TOTP, TwoFactorError> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|err| TwoFactorError::Secret(err.to_string()))
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, TwoFactorStoreError>>,
    ) -> Result<T, TwoFactorError> {
        match tokio::time::timeout(self.store_timeout, operation).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TwoFactorError::StoreTimeout),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::twofactor::store::{MemoryTwoFactorStore, UnavailableTwoFactorStore};
    use chrono::{TimeZone, Utc};

    fn manual_clock() -> ManualClock {
        // The TOTP check uses the real system clock; the manual clock only
        // drives lockout timestamps, so any fixed start works.
        ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    fn service(store: Arc<dyn TwoFactorStore>, clock: ManualClock) -> TwoFactorService {
        TwoFactorService::new(store, Arc::new(clock), "Pordisto Arcade".to_string())
    }

    fn current_code(secret_base32: &str) -> String {
        let secret = Secret::Encoded(secret_base32.to_string()).to_bytes().unwrap();
        let totp = TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP_SECONDS,
            secret,
            None,
            "test".to_string(),
        )
        .unwrap();
        totp.generate_current().unwrap()
    }

    async fn enrolled_service() -> (TwoFactorService, ManualClock, String, Vec<String>) {
        let clock = manual_clock();
        let service = service(Arc::new(MemoryTwoFactorStore::new()), clock.clone());
        let setup = service.generate_setup("u-1").unwrap();
        let codes = service
            .enable("u-1", &setup.secret, &current_code(&setup.secret))
            .await
            .unwrap()
            .expect("enable should accept the current code");
        (service, clock, setup.secret, codes)
    }

    #[test]
    fn setup_bundle_has_uri_and_preview_codes() {
        let service = service(Arc::new(MemoryTwoFactorStore::new()), manual_clock());
        let setup = service.generate_setup("u-1").unwrap();
        assert!(setup.enrollment_uri.starts_with("otpauth://totp/"));
        assert!(setup.enrollment_uri.contains("Pordisto%20Arcade"));
        assert_eq!(setup.backup_codes.len(), 10);
        assert!(!setup.secret.is_empty());
    }

    #[tokio::test]
    async fn setup_alone_persists_nothing() {
        let service = service(Arc::new(MemoryTwoFactorStore::new()), manual_clock());
        let setup = service.generate_setup("u-1").unwrap();
        assert!(!service.is_enrolled("u-1").await.unwrap());
        // And a valid code against the un-persisted secret still fails verify.
        let verification = service
            .verify("u-1", &current_code(&setup.secret))
            .await
            .unwrap();
        assert!(!verification.is_valid);
    }

    #[tokio::test]
    async fn enable_rejects_wrong_code_without_persisting() {
        let service = service(Arc::new(MemoryTwoFactorStore::new()), manual_clock());
        let setup = service.generate_setup("u-1").unwrap();
        let stored = service.enable("u-1", &setup.secret, "000000").await.unwrap();
        assert_eq!(stored, None);
        assert!(!service.is_enrolled("u-1").await.unwrap());
    }

    #[tokio::test]
    async fn totp_verification_succeeds_after_enable() {
        let (service, _clock, secret, _codes) = enrolled_service().await;
        let verification = service.verify("u-1", &current_code(&secret)).await.unwrap();
        assert_eq!(verification, Verification::totp());
    }

    #[tokio::test]
    async fn backup_code_works_exactly_once() {
        let (service, _clock, _secret, codes) = enrolled_service().await;
        let code = codes.first().unwrap();

        let first = service.verify("u-1", code).await.unwrap();
        assert_eq!(first, Verification::backup());

        let replay = service.verify("u-1", code).await.unwrap();
        assert!(!replay.is_valid);
    }

    #[tokio::test]
    async fn fifth_failure_locks_even_against_correct_codes() {
        let (service, clock, secret, _codes) = enrolled_service().await;

        for n in 1..=MAX_FAILED_ATTEMPTS {
            let verification = service.verify("u-1", "000000").await.unwrap();
            assert!(!verification.is_valid, "attempt {n}");
        }

        // Locked now: the correct code is refused and does not count as
        // another failure.
        let while_locked = service.verify("u-1", &current_code(&secret)).await.unwrap();
        assert!(!while_locked.is_valid);

        clock.advance(ChronoDuration::minutes(LOCKOUT_MINUTES) + ChronoDuration::seconds(1));
        let after_expiry = service.verify("u-1", &current_code(&secret)).await.unwrap();
        assert_eq!(after_expiry, Verification::totp());
    }

    #[tokio::test]
    async fn success_resets_failure_counter() {
        let (service, _clock, secret, _codes) = enrolled_service().await;

        for _ in 0..3 {
            assert!(!service.verify("u-1", "000000").await.unwrap().is_valid);
        }
        assert!(service.verify("u-1", &current_code(&secret)).await.unwrap().is_valid);

        // Counter restarted: four more failures stay short of the lockout.
        for _ in 0..4 {
            assert!(!service.verify("u-1", "000000").await.unwrap().is_valid);
        }
        assert!(service.verify("u-1", &current_code(&secret)).await.unwrap().is_valid);
    }

    #[tokio::test]
    async fn disable_requires_totp_not_backup() {
        let (service, _clock, secret, codes) = enrolled_service().await;

        assert!(!service.disable("u-1", codes.first().unwrap()).await.unwrap());
        assert!(service.is_enrolled("u-1").await.unwrap());

        assert!(service.disable("u-1", &current_code(&secret)).await.unwrap());
        assert!(!service.is_enrolled("u-1").await.unwrap());
    }

    #[tokio::test]
    async fn unenrolled_principal_is_invalid_not_error() {
        let service = service(Arc::new(MemoryTwoFactorStore::new()), manual_clock());
        let verification = service.verify("ghost", "123456").await.unwrap();
        assert!(!verification.is_valid);
    }

    #[tokio::test]
    async fn store_outage_is_an_error_not_invalid() {
        let service = service(Arc::new(UnavailableTwoFactorStore), manual_clock());
        let result = service.verify("u-1", "123456").await;
        assert!(matches!(result, Err(TwoFactorError::Store(_))));
    }
}
