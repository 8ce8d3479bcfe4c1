//! Records and result types for two-factor verification.

use chrono::{DateTime, Utc};
use secrecy::SecretString;

/// Per-principal two-factor state as held by the record store.
#[derive(Clone, Debug)]
pub struct TwoFactorRecord {
    /// Active shared secret, base32-encoded.
    pub secret: SecretString,
    /// SHA-256 hashes of the unused backup codes; raw codes are never stored.
    pub backup_code_hashes: Vec<String>,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Freshly generated enrollment material. Nothing is persisted until the
/// principal proves possession via `enable`.
#[derive(Clone, Debug)]
pub struct SetupBundle {
    pub secret: String,
    /// `otpauth://` URI for the authenticator app's scanner.
    pub enrollment_uri: String,
    pub backup_codes: Vec<String>,
}

/// Outcome of a verification attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Verification {
    pub is_valid: bool,
    pub backup_code_used: bool,
}

impl Verification {
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            is_valid: false,
            backup_code_used: false,
        }
    }

    #[must_use]
    pub const fn totp() -> Self {
        Self {
            is_valid: true,
            backup_code_used: false,
        }
    }

    #[must_use]
    pub const fn backup() -> Self {
        Self {
            is_valid: true,
            backup_code_used: true,
        }
    }
}
