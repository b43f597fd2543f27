//! Records held by the persistence layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::credentials::PasswordHash;
use crate::identity::FilesystemId;
use crate::otp::OtpState;

/// A journalist account.
#[derive(Debug, Clone)]
pub struct Journalist {
    /// Unique identifier (UUIDv7 so accounts sort by creation)
    pub id: Uuid,

    /// Login name, unique across accounts
    pub username: String,

    /// Stored password verifier
    pub password: PasswordHash,

    /// Second factor, including the counter and the time of the last full login
    pub otp: OtpState,

    pub is_admin: bool,

    pub created_on: DateTime<Utc>,
}

impl Journalist {
    /// Time of the last fully successful login.
    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        self.otp.last_access
    }
}

/// Input for creating a journalist account.
#[derive(Debug, Clone)]
pub struct NewJournalist {
    pub username: String,
    pub password: PasswordHash,
    pub otp: OtpState,
    pub is_admin: bool,
    pub created_on: DateTime<Utc>,
}

/// A recorded login attempt. Attempts are append-only; they are removed in bulk by
/// retention pruning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginAttempt {
    pub journalist_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// A source's asymmetric key pair as persisted.
///
/// The private half is never stored in the clear: `locked_private_key` is an age
/// passphrase-encrypted blob, unlockable only with the passphrase derived from the
/// source's codename.
#[derive(Clone)]
pub struct StoredKeyPair {
    pub identity_ref: FilesystemId,

    /// age X25519 recipient string (`age1...`)
    pub public_key: String,

    pub locked_private_key: Vec<u8>,

    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for StoredKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredKeyPair")
            .field("identity_ref", &self.identity_ref)
            .field("public_key", &self.public_key)
            .field("locked_private_key", &format!("{} bytes", self.locked_private_key.len()))
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A persisted source record.
///
/// A source stays `pending`, hidden from journalists, until its first submission.
/// `interaction_count` numbers every submission and reply in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub filesystem_id: FilesystemId,
    pub designation: String,
    pub pending: bool,
    pub flagged: bool,
    pub starred: bool,
    pub interaction_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl SourceRecord {
    /// A fresh, pending source with no interactions yet.
    pub fn new(filesystem_id: FilesystemId, designation: String, created_at: DateTime<Utc>) -> Self {
        Self {
            filesystem_id,
            designation,
            pending: true,
            flagged: false,
            starred: false,
            interaction_count: 0,
            created_at,
            last_updated: created_at,
        }
    }
}
