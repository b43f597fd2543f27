//! Raw row types for database queries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::credentials::PasswordHash;
use crate::error::{Result, TiplineError};
use crate::identity::FilesystemId;
use crate::kdf::KdfProfile;
use crate::otp::{OtpMode, OtpSecret, OtpState};
use crate::storage::types::{Journalist, SourceRecord, StoredKeyPair};

pub(super) const JOURNALIST_COLUMNS: &str = "id, username, pw_salt, pw_hash, pw_profile, \
     otp_secret, otp_mode, hotp_counter, last_access, is_admin, created_on";

/// Raw row data from the journalists table, before parsing into domain types.
#[derive(Debug)]
pub struct JournalistRow {
    pub id: String,
    pub username: String,
    pub pw_salt: Vec<u8>,
    pub pw_hash: Vec<u8>,
    pub pw_profile: String,
    pub otp_secret: String,
    pub otp_mode: String,
    pub hotp_counter: i64,
    pub last_access: Option<String>,
    pub is_admin: bool,
    pub created_on: String,
}

impl JournalistRow {
    /// Read a row selected with [`JOURNALIST_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            pw_salt: row.get(2)?,
            pw_hash: row.get(3)?,
            pw_profile: row.get(4)?,
            otp_secret: row.get(5)?,
            otp_mode: row.get(6)?,
            hotp_counter: row.get(7)?,
            last_access: row.get(8)?,
            is_admin: row.get(9)?,
            created_on: row.get(10)?,
        })
    }
}

pub(super) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| TiplineError::Storage(format!("Invalid timestamp: {}", e)))?
        .with_timezone(&Utc))
}

pub(super) fn parse_millis(value: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| TiplineError::Storage(format!("Invalid attempt timestamp: {}", value)))
}

impl TryFrom<JournalistRow> for Journalist {
    type Error = TiplineError;

    fn try_from(row: JournalistRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| TiplineError::Storage(format!("Invalid journalist UUID: {}", e)))?;
        let profile = KdfProfile::parse(&row.pw_profile)?;
        let mode = OtpMode::parse(&row.otp_mode)?;
        let secret = OtpSecret::from_base32(&row.otp_secret)
            .map_err(|e| TiplineError::Storage(format!("Invalid OTP secret: {}", e)))?;
        let hotp_counter = u64::try_from(row.hotp_counter)
            .map_err(|_| TiplineError::Storage("Negative HOTP counter".to_string()))?;
        let last_access = row.last_access.as_deref().map(parse_timestamp).transpose()?;
        let created_on = parse_timestamp(&row.created_on)?;

        Ok(Journalist {
            id,
            username: row.username,
            password: PasswordHash {
                salt: row.pw_salt,
                hash: row.pw_hash,
                profile,
            },
            otp: OtpState {
                mode,
                secret,
                hotp_counter,
                last_access,
            },
            is_admin: row.is_admin,
            created_on,
        })
    }
}

/// Raw row data from the key_pairs table.
#[derive(Debug)]
pub struct KeyPairRow {
    pub identity_ref: String,
    pub public_key: String,
    pub locked_private_key: Vec<u8>,
    pub created_at: String,
}

impl TryFrom<KeyPairRow> for StoredKeyPair {
    type Error = TiplineError;

    fn try_from(row: KeyPairRow) -> Result<Self> {
        Ok(StoredKeyPair {
            identity_ref: FilesystemId::parse(&row.identity_ref)?,
            public_key: row.public_key,
            locked_private_key: row.locked_private_key,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

pub(super) const SOURCE_COLUMNS: &str = "filesystem_id, designation, pending, flagged, \
     starred, interaction_count, created_at, last_updated";

/// Raw row data from the sources table.
#[derive(Debug)]
pub struct SourceRow {
    pub filesystem_id: String,
    pub designation: String,
    pub pending: bool,
    pub flagged: bool,
    pub starred: bool,
    pub interaction_count: i64,
    pub created_at: String,
    pub last_updated: String,
}

impl SourceRow {
    /// Read a row selected with [`SOURCE_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            filesystem_id: row.get(0)?,
            designation: row.get(1)?,
            pending: row.get(2)?,
            flagged: row.get(3)?,
            starred: row.get(4)?,
            interaction_count: row.get(5)?,
            created_at: row.get(6)?,
            last_updated: row.get(7)?,
        })
    }
}

impl TryFrom<SourceRow> for SourceRecord {
    type Error = TiplineError;

    fn try_from(row: SourceRow) -> Result<Self> {
        let interaction_count = u64::try_from(row.interaction_count).map_err(|_| {
            TiplineError::Storage(format!(
                "Negative interaction count: {}",
                row.interaction_count
            ))
        })?;
        Ok(SourceRecord {
            filesystem_id: FilesystemId::parse(&row.filesystem_id)?,
            designation: row.designation,
            pending: row.pending,
            flagged: row.flagged,
            starred: row.starred,
            interaction_count,
            created_at: parse_timestamp(&row.created_at)?,
            last_updated: parse_timestamp(&row.last_updated)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> JournalistRow {
        JournalistRow {
            id: Uuid::now_v7().to_string(),
            username: "journalist".to_string(),
            pw_salt: vec![1; 32],
            pw_hash: vec![2; 32],
            pw_profile: "testing".to_string(),
            otp_secret: "JBSWY3DPEHPK3PXP".to_string(),
            otp_mode: "hotp".to_string(),
            hotp_counter: 4,
            last_access: None,
            is_admin: false,
            created_on: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_journalist_row_converts() {
        let journalist = Journalist::try_from(row()).unwrap();
        assert_eq!(journalist.otp.mode, OtpMode::Hotp);
        assert_eq!(journalist.otp.hotp_counter, 4);
        assert_eq!(journalist.password.profile, KdfProfile::Testing);
        assert!(journalist.last_access().is_none());
    }

    #[test]
    fn test_negative_counter_is_storage_error() {
        let mut bad = row();
        bad.hotp_counter = -1;
        assert!(matches!(
            Journalist::try_from(bad),
            Err(TiplineError::Storage(_))
        ));
    }

    #[test]
    fn test_negative_interaction_count_is_storage_error() {
        let bad = SourceRow {
            filesystem_id: format!("{}=", "A".repeat(103)),
            designation: "brave otter".to_string(),
            pending: false,
            flagged: false,
            starred: false,
            interaction_count: -3,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            last_updated: "2026-01-01T00:00:00+00:00".to_string(),
        };
        assert!(matches!(
            SourceRecord::try_from(bad),
            Err(TiplineError::Storage(_))
        ));
    }

    #[test]
    fn test_unknown_profile_is_storage_error() {
        let mut bad = row();
        bad.pw_profile = "v9".to_string();
        assert!(matches!(
            Journalist::try_from(bad),
            Err(TiplineError::Storage(_))
        ));
    }
}
