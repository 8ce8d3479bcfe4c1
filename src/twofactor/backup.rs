//! Backup code generation and hashing.
//!
//! Codes are single-use fallbacks for when the authenticator app is
//! unavailable. Only SHA-256 hashes reach the record store; the raw codes
//! are shown to the user once at enrollment.

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

pub const BACKUP_CODE_COUNT: usize = 10;
pub const BACKUP_CODE_LEN: usize = 8;
/// Ambiguous glyphs (0/O, 1/I/L) are excluded so codes survive being read
/// aloud or written down.
const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// A freshly generated batch: plaintext for display, hashes for storage.
#[derive(Debug)]
pub struct BackupCodeBatch {
    pub codes: Vec<String>,
    pub code_hashes: Vec<String>,
}

impl BackupCodeBatch {
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = OsRng;
        Self::generate_with_rng(&mut rng)
    }

    fn generate_with_rng<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut codes = Vec::with_capacity(BACKUP_CODE_COUNT);
        let mut code_hashes = Vec::with_capacity(BACKUP_CODE_COUNT);
        for _ in 0..BACKUP_CODE_COUNT {
            let code = generate_code(rng);
            code_hashes.push(hash_backup_code(&code));
            codes.push(code);
        }
        Self { codes, code_hashes }
    }
}

/// Uppercase and strip separators before hashing so user input survives
/// copy/paste formatting.
#[must_use]
pub fn normalize_backup_code(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Hash a (normalized) backup code for storage or lookup.
#[must_use]
pub fn hash_backup_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_backup_code(code).as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn generate_code<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut raw = [0u8; BACKUP_CODE_LEN];
    rng.fill_bytes(&mut raw);
    raw.iter()
        .map(|byte| {
            let idx = usize::from(*byte) % BACKUP_CODE_ALPHABET.len();
            BACKUP_CODE_ALPHABET[idx] as char
        })
        .collect()
}
