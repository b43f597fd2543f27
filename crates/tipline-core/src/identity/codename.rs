//! Codename → filesystem id derivation.
//!
//! The filesystem id is the only persistent handle on a source. It is an Argon2id
//! digest of the codename under a fixed, deployment-wide salt, so the codename alone
//! regenerates it and nothing per-source has to be stored next to it.

use std::fmt;

use data_encoding::BASE32;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::config::IdentitySection;
use crate::error::{Result, TiplineError};
use crate::kdf::{derive_key, KdfProfile};

/// Don't hash (or create) excessively long codenames. Bounds attacker-driven KDF cost.
pub const MAX_CODENAME_LEN: usize = 128;

const FILESYSTEM_ID_DOMAIN: &[u8] = b"tipline/filesystem-id/v1";
const KEY_PASSPHRASE_DOMAIN: &[u8] = b"tipline/key-passphrase/v1";

const FILESYSTEM_ID_BYTES: usize = 64;
const KEY_PASSPHRASE_BYTES: usize = 32;

/// Base32 length of a 64-byte digest: 103 symbols plus one pad character.
pub const FILESYSTEM_ID_LEN: usize = 104;

/// Characters accepted anywhere user input flows into hashing or file paths.
const SAFE_PUNCTUATION: &str = " !#%$&)(+*-;:=?@";

/// Reject `text` unless every character is in the safe set.
pub fn sanitize(text: &str) -> Result<&str> {
    let safe = text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SAFE_PUNCTUATION.contains(c));
    if safe {
        Ok(text)
    } else {
        Err(TiplineError::InvalidInput(format!("invalid input: {}", text)))
    }
}

/// A source's secret codename. Shown once, never persisted.
#[derive(Clone)]
pub struct Codename(Zeroizing<String>);

impl Codename {
    pub fn new(codename: impl Into<String>) -> Self {
        Self(Zeroizing::new(codename.into()))
    }

    /// Access the secret. Avoid storing or logging this value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn words(&self) -> Vec<&str> {
        self.0.split_whitespace().collect()
    }
}

impl fmt::Debug for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Codename([REDACTED])")
    }
}

/// Persistent pseudonym of a source: fixed-length, base32 alphabet only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilesystemId(String);

impl FilesystemId {
    /// Validate a stored id read back from persistence.
    pub fn parse(value: &str) -> Result<Self> {
        let well_formed = value.len() == FILESYSTEM_ID_LEN
            && value.ends_with('=')
            && value.as_bytes()[..FILESYSTEM_ID_LEN - 1]
                .iter()
                .all(|&b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b));
        if !well_formed {
            return Err(TiplineError::InvalidInput(
                "malformed filesystem id".to_string(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilesystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic, expensive one-way mapping from codenames.
#[derive(Clone)]
pub struct CodenameHasher {
    profile: KdfProfile,
    pepper: Zeroizing<Vec<u8>>,
}

impl CodenameHasher {
    pub fn new(profile: KdfProfile, pepper: Option<&str>) -> Self {
        Self {
            profile,
            pepper: Zeroizing::new(pepper.map(|p| p.as_bytes().to_vec()).unwrap_or_default()),
        }
    }

    pub fn from_config(section: &IdentitySection) -> Self {
        Self::new(section.kdf, section.pepper.as_deref())
    }

    /// Derive the filesystem id for `codename`.
    ///
    /// Over-long or unsafe codenames are rejected before any hashing happens.
    ///
    /// # Arguments
    ///
    /// * `codename` - The source's codename, exactly as they typed it
    ///
    /// # Returns
    ///
    /// A [`FILESYSTEM_ID_LEN`]-character base32 id. The same codename, profile and
    /// pepper always give the same id.
    ///
    /// # Errors
    ///
    /// Returns `TiplineError::InvalidInput` if the codename is longer than
    /// [`MAX_CODENAME_LEN`] or contains characters outside the safe set.
    ///
    /// # Examples
    ///
    /// ```
    /// use tipline_core::identity::{CodenameHasher, FILESYSTEM_ID_LEN};
    /// use tipline_core::kdf::KdfProfile;
    ///
    /// let hasher = CodenameHasher::new(KdfProfile::Testing, None);
    /// let id = hasher.derive_filesystem_id("quiet heron brave otter").unwrap();
    /// assert_eq!(id.as_str().len(), FILESYSTEM_ID_LEN);
    /// assert_eq!(id, hasher.derive_filesystem_id("quiet heron brave otter").unwrap());
    /// ```
    #[instrument(skip_all)]
    pub fn derive_filesystem_id(&self, codename: &str) -> Result<FilesystemId> {
        let codename = validate_codename(codename)?;
        let digest = derive_key(
            codename.as_bytes(),
            &self.salt(FILESYSTEM_ID_DOMAIN),
            self.profile,
            FILESYSTEM_ID_BYTES,
        )?;
        let id = FilesystemId(BASE32.encode(digest.as_bytes()));
        debug!(profile = self.profile.as_str(), "derived filesystem id");
        Ok(id)
    }

    /// Derive the passphrase that locks the source's private key.
    ///
    /// Uses a separate domain so knowing the filesystem id reveals nothing about it.
    #[instrument(skip_all)]
    pub fn derive_key_passphrase(&self, codename: &str) -> Result<SecretString> {
        let codename = validate_codename(codename)?;
        let key = derive_key(
            codename.as_bytes(),
            &self.salt(KEY_PASSPHRASE_DOMAIN),
            self.profile,
            KEY_PASSPHRASE_BYTES,
        )?;
        Ok(SecretString::from(BASE32.encode(key.as_bytes())))
    }

    fn salt(&self, domain: &[u8]) -> Zeroizing<Vec<u8>> {
        let mut salt = Zeroizing::new(Vec::with_capacity(domain.len() + self.pepper.len()));
        salt.extend_from_slice(domain);
        salt.extend_from_slice(&self.pepper);
        salt
    }
}

impl fmt::Debug for CodenameHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodenameHasher")
            .field("profile", &self.profile)
            .field("pepper", &"[REDACTED]")
            .finish()
    }
}

fn validate_codename(codename: &str) -> Result<&str> {
    let len = codename.chars().count();
    if len > MAX_CODENAME_LEN {
        return Err(TiplineError::InvalidInput(format!(
            "codename too long (max {} characters)",
            MAX_CODENAME_LEN
        )));
    }
    if codename.trim().is_empty() {
        return Err(TiplineError::InvalidInput(
            "codename cannot be empty".to_string(),
        ));
    }
    // Don't echo the codename back in the error.
    sanitize(codename).map_err(|_| {
        TiplineError::InvalidInput("codename contains unsupported characters".to_string())
    })
}
