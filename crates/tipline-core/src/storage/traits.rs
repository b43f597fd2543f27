//! Persistence interfaces.
//!
//! Every method takes `&self`: stores are shared behind an `Arc` by the login and
//! envelope services, so implementations provide their own interior locking.
//! Operations that must not interleave with a concurrent caller (the HOTP counter
//! swap, the attempt append-and-count) are documented as atomic and must be
//! implemented as a single transaction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Journalist, LoginAttempt, NewJournalist, SourceRecord, StoredKeyPair};
use crate::credentials::PasswordHash;
use crate::error::Result;
use crate::identity::FilesystemId;
use crate::otp::{CounterAdvance, OtpState};

/// Journalist accounts and their login attempts.
pub trait JournalistStore: Send + Sync {
    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `TiplineError::InvalidUsername` if the username is taken.
    fn insert_journalist(&self, journalist: &NewJournalist) -> Result<Journalist>;

    fn get_journalist(&self, id: &Uuid) -> Result<Option<Journalist>>;

    fn find_by_username(&self, username: &str) -> Result<Option<Journalist>>;

    /// Replace the stored password verifier.
    fn update_password(&self, id: &Uuid, password: &PasswordHash) -> Result<()>;

    /// Replace the second factor. The HOTP counter is stored as given, so callers
    /// switching to HOTP pass a state whose counter is zero.
    fn update_otp(&self, id: &Uuid, otp: &OtpState) -> Result<()>;

    /// Atomically move the HOTP counter from `advance.expected` to `advance.next`.
    ///
    /// Returns `false` without writing if the stored counter is no longer
    /// `advance.expected`; the caller lost a race and must re-verify.
    fn advance_hotp_counter(&self, id: &Uuid, advance: CounterAdvance) -> Result<bool>;

    fn update_last_access(&self, id: &Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Atomically set `last_access` to `at` if it still equals `expected`.
    ///
    /// Returns `false` without writing if another login recorded an access first.
    fn swap_last_access(
        &self,
        id: &Uuid,
        expected: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Atomically append an attempt at `at` and count the journalist's attempts with
    /// a timestamp strictly after `since`, the new one included.
    fn record_login_attempt(
        &self,
        id: &Uuid,
        at: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> Result<u64>;

    /// Attempts for one journalist, oldest first.
    fn login_attempts(&self, id: &Uuid) -> Result<Vec<LoginAttempt>>;

    /// Delete attempts at or before `before`. Returns how many were removed.
    fn prune_login_attempts(&self, before: DateTime<Utc>) -> Result<usize>;
}

/// Source key pairs, keyed by filesystem id.
pub trait KeyPairStore: Send + Sync {
    fn get_key_pair(&self, identity_ref: &FilesystemId) -> Result<Option<StoredKeyPair>>;

    /// Persist `key_pair`.
    ///
    /// # Errors
    ///
    /// Returns `TiplineError::KeyGeneration` if a pair already exists for the
    /// identity and `overwrite` is false.
    fn put_key_pair(&self, key_pair: &StoredKeyPair, overwrite: bool) -> Result<()>;

    /// Remove the pair. Returns `false` if there was none.
    fn delete_key_pair(&self, identity_ref: &FilesystemId) -> Result<bool>;
}

/// Source records.
pub trait SourceStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `TiplineError::InvalidInput` if the filesystem id is already taken.
    fn insert_source(&self, source: &SourceRecord) -> Result<()>;

    fn get_source(&self, filesystem_id: &FilesystemId) -> Result<Option<SourceRecord>>;

    /// Remove the record. Returns `false` if there was none.
    fn delete_source(&self, filesystem_id: &FilesystemId) -> Result<bool>;

    /// Atomically bump the interaction count and return the new value, which
    /// numbers the next artifact. Also moves `last_updated` to `at`.
    ///
    /// # Errors
    ///
    /// Returns `TiplineError::NotFound` if there is no such source.
    fn next_interaction(&self, filesystem_id: &FilesystemId, at: DateTime<Utc>) -> Result<u64>;

    /// Clear the pending flag. Returns `true` if the source was pending.
    fn mark_active(&self, filesystem_id: &FilesystemId) -> Result<bool>;

    /// # Errors
    ///
    /// Returns `TiplineError::NotFound` if there is no such source.
    fn set_flagged(&self, filesystem_id: &FilesystemId, flagged: bool) -> Result<()>;

    /// # Errors
    ///
    /// Returns `TiplineError::NotFound` if there is no such source.
    fn set_starred(&self, filesystem_id: &FilesystemId, starred: bool) -> Result<()>;
}
