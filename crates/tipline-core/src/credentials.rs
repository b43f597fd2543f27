//! Journalist password hashing and verification.
//!
//! Length bounds are checked before any Argon2 work so oversized input can't be used
//! to burn CPU. Hashes record the cost profile they were made with.

use std::fmt;

use subtle::ConstantTimeEq;
use tracing::{debug, instrument};

use crate::config::CredentialsSection;
use crate::error::{Result, TiplineError};
use crate::kdf::{derive_key, random_bytes, KdfProfile};

/// Minimum length for newly set passwords, in characters.
pub const MIN_PASSWORD_LEN: usize = 12;

/// Maximum length accepted anywhere, in characters.
pub const MAX_PASSWORD_LEN: usize = 128;

const SALT_LEN: usize = 32;
const HASH_LEN: usize = 32;

/// Stored password verifier.
#[derive(Clone)]
pub struct PasswordHash {
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
    pub profile: KdfProfile,
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHash")
            .field("profile", &self.profile)
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

/// Validate a new password against the length policy.
///
/// # Examples
///
/// ```
/// use tipline_core::credentials::validate_new_password;
///
/// assert!(validate_new_password("correct horse battery").is_ok());
/// assert!(validate_new_password("short").is_err());
/// ```
pub fn validate_new_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(TiplineError::InvalidPasswordLength { len });
    }
    Ok(())
}

/// Hashes and verifies passwords under a configured profile.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    profile: KdfProfile,
}

impl PasswordHasher {
    pub fn new(profile: KdfProfile) -> Self {
        Self { profile }
    }

    pub fn from_config(section: &CredentialsSection) -> Self {
        Self::new(section.profile)
    }

    /// Compute the verifier for `new_password`.
    ///
    /// Returns `Ok(None)` when `new_password` already matches `current`; nothing
    /// needs to be stored in that case.
    #[instrument(skip_all)]
    pub fn set_password(
        &self,
        current: Option<&PasswordHash>,
        new_password: &str,
    ) -> Result<Option<PasswordHash>> {
        if let Some(current) = current {
            if self.verify_password(new_password, current)? {
                debug!("password unchanged");
                return Ok(None);
            }
        }

        validate_new_password(new_password)?;

        let salt: [u8; SALT_LEN] = random_bytes()?;
        let hash = derive_key(new_password.as_bytes(), &salt, self.profile, HASH_LEN)?;

        debug!(profile = self.profile.as_str(), "password hash generated");
        Ok(Some(PasswordHash {
            salt: salt.to_vec(),
            hash: hash.as_bytes().to_vec(),
            profile: self.profile,
        }))
    }

    /// Check `candidate` against `stored`.
    ///
    /// Only the maximum length is enforced: accounts created before the minimum
    /// existed must still be able to log in.
    #[instrument(skip_all)]
    pub fn verify_password(&self, candidate: &str, stored: &PasswordHash) -> Result<bool> {
        let len = candidate.chars().count();
        if len > MAX_PASSWORD_LEN {
            return Err(TiplineError::InvalidPasswordLength { len });
        }
        if candidate.is_empty() {
            return Ok(false);
        }

        let computed = derive_key(
            candidate.as_bytes(),
            &stored.salt,
            stored.profile,
            stored.hash.len(),
        )?;
        Ok(computed.as_bytes().ct_eq(&stored.hash).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(KdfProfile::Testing)
    }

    fn password_of_len(len: usize) -> String {
        "x".repeat(len)
    }

    #[test]
    fn test_round_trip() {
        let stored = hasher()
            .set_password(None, "correct horse battery staple")
            .unwrap()
            .unwrap();

        assert!(hasher()
            .verify_password("correct horse battery staple", &stored)
            .unwrap());
        assert!(!hasher()
            .verify_password("correct horse battery stapler", &stored)
            .unwrap());
    }

    #[test]
    fn test_length_boundaries() {
        let result = hasher().set_password(None, &password_of_len(11));
        assert!(matches!(
            result,
            Err(TiplineError::InvalidPasswordLength { len: 11 })
        ));

        assert!(hasher().set_password(None, &password_of_len(12)).is_ok());
        assert!(hasher().set_password(None, &password_of_len(128)).is_ok());

        let result = hasher().set_password(None, &password_of_len(129));
        assert!(matches!(
            result,
            Err(TiplineError::InvalidPasswordLength { len: 129 })
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 12 characters, 24 bytes
        let password = "éééééééééééé";
        assert!(validate_new_password(password).is_ok());
    }

    #[test]
    fn test_unchanged_password_is_noop() {
        let stored = hasher()
            .set_password(None, "a very long passphrase")
            .unwrap()
            .unwrap();
        let again = hasher()
            .set_password(Some(&stored), "a very long passphrase")
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_new_password_gets_fresh_salt() {
        let first = hasher()
            .set_password(None, "first passphrase here")
            .unwrap()
            .unwrap();
        let second = hasher()
            .set_password(Some(&first), "second passphrase here")
            .unwrap()
            .unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
        assert!(!hasher()
            .verify_password("first passphrase here", &second)
            .unwrap());
    }

    #[test]
    fn test_same_password_different_salts() {
        let a = hasher().set_password(None, "same passphrase!").unwrap().unwrap();
        let b = hasher().set_password(None, "same passphrase!").unwrap().unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_verify_rejects_overlong_candidate() {
        let stored = hasher()
            .set_password(None, "reasonable passphrase")
            .unwrap()
            .unwrap();
        let result = hasher().verify_password(&password_of_len(129), &stored);
        assert!(matches!(
            result,
            Err(TiplineError::InvalidPasswordLength { len: 129 })
        ));
    }

    #[test]
    fn test_verify_allows_short_legacy_passwords() {
        // Hash created before the minimum length policy existed.
        let salt = [7u8; SALT_LEN];
        let hash = derive_key(b"legacy", &salt, KdfProfile::Testing, HASH_LEN).unwrap();
        let stored = PasswordHash {
            salt: salt.to_vec(),
            hash: hash.as_bytes().to_vec(),
            profile: KdfProfile::Testing,
        };

        assert!(hasher().verify_password("legacy", &stored).unwrap());
        assert!(!hasher().verify_password("", &stored).unwrap());
    }

    #[test]
    fn test_verify_uses_stored_profile() {
        let stored = hasher()
            .set_password(None, "profile pinned pass")
            .unwrap()
            .unwrap();
        // A hasher configured for a newer profile still verifies old hashes.
        let upgraded = PasswordHasher::new(KdfProfile::V1);
        assert!(upgraded
            .verify_password("profile pinned pass", &stored)
            .unwrap());
    }

    #[test]
    fn test_debug_redacts_hash() {
        let stored = hasher()
            .set_password(None, "debug redaction test")
            .unwrap()
            .unwrap();
        let output = format!("{:?}", stored);
        assert!(output.contains("REDACTED"));
        assert!(!output.contains(&hex::encode(&stored.hash[..4])));
    }
}
