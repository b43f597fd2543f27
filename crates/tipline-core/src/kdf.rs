//! Key derivation using Argon2id.
//!
//! Both the codename → filesystem id mapping and journalist password hashes run
//! through this module. Argon2id is memory-hard, which keeps offline guessing of
//! codenames and passwords expensive even on GPUs.

use std::fmt;

use argon2::Argon2;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, TiplineError};

/// Argon2id memory cost for the standard profile (64 MiB).
const STANDARD_MEMORY_KB: u32 = 64 * 1024;
const STANDARD_ITERATIONS: u32 = 3;
const STANDARD_PARALLELISM: u32 = 1;

/// Smallest parameters Argon2 accepts. Only reachable through configuration.
const TESTING_MEMORY_KB: u32 = 8;
const TESTING_ITERATIONS: u32 = 1;
const TESTING_PARALLELISM: u32 = 1;

/// Argon2 requires at least 8 bytes of salt.
const MIN_SALT_LEN: usize = 8;

/// Versioned cost profile.
///
/// Stored alongside every password hash so raising the cost later does not
/// invalidate existing hashes: they keep verifying under the profile they were
/// created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KdfProfile {
    /// Argon2id, 64 MiB, 3 iterations, 1 lane.
    #[default]
    V1,
    /// Minimal cost for deterministic test suites.
    Testing,
}

impl KdfProfile {
    /// Stable tag persisted with hashes.
    pub fn as_str(&self) -> &'static str {
        match self {
            KdfProfile::V1 => "v1",
            KdfProfile::Testing => "testing",
        }
    }

    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "v1" => Ok(KdfProfile::V1),
            "testing" => Ok(KdfProfile::Testing),
            other => Err(TiplineError::Storage(format!(
                "Unknown KDF profile: {}",
                other
            ))),
        }
    }

    fn params(&self, output_len: usize) -> Result<argon2::Params> {
        let (memory, iterations, parallelism) = match self {
            KdfProfile::V1 => (STANDARD_MEMORY_KB, STANDARD_ITERATIONS, STANDARD_PARALLELISM),
            KdfProfile::Testing => (TESTING_MEMORY_KB, TESTING_ITERATIONS, TESTING_PARALLELISM),
        };
        argon2::Params::new(memory, iterations, parallelism, Some(output_len))
            .map_err(|e| TiplineError::Crypto(format!("Failed to create Argon2 params: {}", e)))
    }
}

/// Key material derived from a secret.
///
/// Zeroized on drop; `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: Vec<u8>,
}

impl DerivedKey {
    /// Get a reference to the raw key bytes.
    ///
    /// Avoid storing or logging this value.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive `output_len` bytes from `secret` and `salt` with Argon2id.
///
/// Same secret + salt + profile always produces the same key.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    profile: KdfProfile,
    output_len: usize,
) -> Result<DerivedKey> {
    if secret.is_empty() {
        return Err(TiplineError::InvalidInput(
            "Secret cannot be empty".to_string(),
        ));
    }

    if salt.len() < MIN_SALT_LEN {
        return Err(TiplineError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LEN
        )));
    }

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        profile.params(output_len)?,
    );

    let mut bytes = vec![0u8; output_len];
    argon2
        .hash_password_into(secret, salt, &mut bytes)
        .map_err(|e| TiplineError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(DerivedKey { bytes })
}

/// Fill a fresh buffer with OS randomness.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| TiplineError::Crypto(format!("Failed to gather randomness: {}", e)))?;
    Ok(bytes)
}
