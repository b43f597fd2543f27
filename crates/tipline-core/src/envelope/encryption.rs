//! age encryption primitives.
//!
//! Two kinds of payload pass through here: submissions, encrypted to one or more
//! X25519 recipients, and source private keys, locked under a passphrase derived
//! from the source's codename.

use std::io::{self, Read, Write};
use std::iter;

use age::secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::error::{Result, TiplineError};

/// Highest scrypt work factor accepted when unlocking a stored key.
pub const MAX_UNLOCK_WORK_FACTOR: u8 = 30;

/// Encrypt everything `plaintext` yields to all of `recipients`.
///
/// # Errors
///
/// Returns `TiplineError::Crypto` if `recipients` is empty or encryption fails.
pub fn encrypt_to_recipients<R: Read>(
    plaintext: &mut R,
    recipients: &[age::x25519::Recipient],
) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(TiplineError::Crypto("no recipients requested".to_string()));
    }

    let encryptor = age::Encryptor::with_recipients(
        recipients.iter().map(|r| r as &dyn age::Recipient),
    )
    .map_err(|e| TiplineError::Crypto(format!("Failed to create encryptor: {}", e)))?;

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| TiplineError::Crypto(format!("Failed to create encryptor: {}", e)))?;

    io::copy(plaintext, &mut writer)
        .map_err(|e| TiplineError::Crypto(format!("Encryption write failed: {}", e)))?;

    writer
        .finish()
        .map_err(|e| TiplineError::Crypto(format!("Encryption finish failed: {}", e)))?;

    Ok(encrypted)
}

/// Decrypt `ciphertext` with an X25519 identity.
pub fn decrypt_with_identity(
    ciphertext: &[u8],
    identity: &age::x25519::Identity,
) -> Result<Vec<u8>> {
    let decryptor = age::Decryptor::new(ciphertext)
        .map_err(|e| TiplineError::Crypto(format!("Failed to create decryptor: {}", e)))?;

    let mut reader = decryptor
        .decrypt(iter::once(identity as &dyn age::Identity))
        .map_err(|e| TiplineError::Crypto(format!("Decryption failed: {}", e)))?;

    let mut decrypted = Vec::new();
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| TiplineError::Crypto(format!("Failed to read decrypted data: {}", e)))?;

    Ok(decrypted)
}

/// Lock an identity's secret key string under `passphrase`.
pub fn lock_identity(
    identity: &age::x25519::Identity,
    passphrase: SecretString,
    work_factor: u8,
) -> Result<Vec<u8>> {
    let mut recipient = age::scrypt::Recipient::new(passphrase);
    recipient.set_work_factor(work_factor);

    let encryptor = age::Encryptor::with_recipients(iter::once(&recipient as &dyn age::Recipient))
        .map_err(|e| TiplineError::KeyGeneration(format!("Failed to create encryptor: {}", e)))?;

    let secret = identity.to_string();
    let mut locked = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut locked)
        .map_err(|e| TiplineError::KeyGeneration(format!("Failed to lock key: {}", e)))?;
    writer
        .write_all(secret.expose_secret().as_bytes())
        .map_err(|e| TiplineError::KeyGeneration(format!("Failed to lock key: {}", e)))?;
    writer
        .finish()
        .map_err(|e| TiplineError::KeyGeneration(format!("Failed to lock key: {}", e)))?;

    Ok(locked)
}

/// Recover an identity locked by [`lock_identity`].
///
/// # Errors
///
/// Returns `TiplineError::Crypto` if the passphrase is wrong or the blob is corrupt.
pub fn unlock_identity(locked: &[u8], passphrase: SecretString) -> Result<age::x25519::Identity> {
    let decryptor = age::Decryptor::new(locked)
        .map_err(|e| TiplineError::Crypto(format!("Failed to read locked key: {}", e)))?;

    let mut identity = age::scrypt::Identity::new(passphrase);
    identity.set_max_work_factor(MAX_UNLOCK_WORK_FACTOR);

    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| TiplineError::Crypto(format!("Failed to unlock key: {}", e)))?;

    let mut secret = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut secret)
        .map_err(|e| TiplineError::Crypto(format!("Failed to unlock key: {}", e)))?;

    let secret = std::str::from_utf8(&secret)
        .map_err(|_| TiplineError::Crypto("Locked key is not valid UTF-8".to_string()))?;
    secret
        .trim()
        .parse::<age::x25519::Identity>()
        .map_err(|e| TiplineError::Crypto(format!("Locked key is malformed: {}", e)))
}

/// Parse an `age1...` recipient string.
pub fn parse_recipient(value: &str) -> Result<age::x25519::Recipient> {
    value
        .trim()
        .parse::<age::x25519::Recipient>()
        .map_err(|e| TiplineError::Crypto(format!("Invalid recipient: {}", e)))
}
