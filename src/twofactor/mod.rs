//! Two-factor authentication: TOTP codes, single-use backup codes and
//! failure lockout, over an injected record store.

mod backup;
mod models;
mod service;
mod store;

pub use backup::{BACKUP_CODE_COUNT, BACKUP_CODE_LEN, BackupCodeBatch, hash_backup_code};
pub use models::{SetupBundle, TwoFactorRecord, Verification};
pub use service::{TwoFactorError, TwoFactorService};
pub use store::{
    MemoryTwoFactorStore, TwoFactorStore, TwoFactorStoreError, UnavailableTwoFactorStore,
};
