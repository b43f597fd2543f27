//! Source key pairs and submission encryption.
//!
//! Each source gets an age X25519 key pair. The public half is stored as-is; the
//! private half is stored locked under a passphrase derived from the source's
//! codename, so nothing on the server can decrypt a reply without the codename.
//!
//! Key lifecycle operations and decryptions for the same source are serialized
//! with a per-source reader/writer lock. A lock lives in the table only while some
//! caller holds or waits on it.

pub mod encryption;

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::config::TiplineConfig;
use crate::error::{Result, TiplineError};
use crate::identity::{CodenameHasher, FilesystemId};
use crate::storage::{KeyPairStore, StoredKeyPair};

pub use age::x25519::{Identity, Recipient};
pub use encryption::parse_recipient;

/// What to encrypt.
pub enum Plaintext<'a> {
    Bytes(&'a [u8]),
    /// Streamed through the encryptor without buffering the plaintext.
    Reader(Box<dyn Read + 'a>),
}

impl<'a> From<&'a [u8]> for Plaintext<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Plaintext::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for Plaintext<'a> {
    fn from(text: &'a str) -> Self {
        Plaintext::Bytes(text.as_bytes())
    }
}

/// Who can decrypt.
#[derive(Clone)]
pub enum Recipients {
    One(Recipient),
    Many(Vec<Recipient>),
}

impl Recipients {
    fn into_vec(self) -> Vec<Recipient> {
        match self {
            Recipients::One(recipient) => vec![recipient],
            Recipients::Many(recipients) => recipients,
        }
    }
}

/// Key-pair lifecycle and age encryption for sources.
pub struct CryptoEnvelope {
    store: Arc<dyn KeyPairStore>,
    clock: Arc<dyn Clock>,
    hasher: CodenameHasher,
    journalist_recipients: Vec<Recipient>,
    lock_work_factor: u8,
    locks: Mutex<HashMap<FilesystemId, Arc<RwLock<()>>>>,
}

impl CryptoEnvelope {
    /// # Errors
    ///
    /// Returns `TiplineError::Config` if a configured journalist recipient does
    /// not parse.
    pub fn new(
        store: Arc<dyn KeyPairStore>,
        clock: Arc<dyn Clock>,
        config: &TiplineConfig,
    ) -> Result<Self> {
        let journalist_recipients = config
            .envelope
            .journalist_recipients
            .iter()
            .map(|value| {
                parse_recipient(value).map_err(|_| {
                    TiplineError::Config(format!("Invalid journalist recipient: {}", value))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            store,
            clock,
            hasher: CodenameHasher::from_config(&config.identity),
            journalist_recipients,
            lock_work_factor: config.envelope.key_lock_work_factor,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn journalist_recipients(&self) -> &[Recipient] {
        &self.journalist_recipients
    }

    /// Run `f` holding the shared side of `identity_ref`'s lock.
    fn with_read_lock<T>(
        &self,
        identity_ref: &FilesystemId,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let lock = self.acquire_lock(identity_ref)?;
        let result = match lock.read() {
            Ok(_guard) => f(),
            Err(_) => Err(TiplineError::Crypto("Key lock poisoned".to_string())),
        };
        self.release_lock(identity_ref, lock)?;
        result
    }

    /// Run `f` holding the exclusive side of `identity_ref`'s lock.
    fn with_write_lock<T>(
        &self,
        identity_ref: &FilesystemId,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let lock = self.acquire_lock(identity_ref)?;
        let result = match lock.write() {
            Ok(_guard) => f(),
            Err(_) => Err(TiplineError::Crypto("Key lock poisoned".to_string())),
        };
        self.release_lock(identity_ref, lock)?;
        result
    }

    fn lock_table(&self) -> Result<MutexGuard<'_, HashMap<FilesystemId, Arc<RwLock<()>>>>> {
        self.locks
            .lock()
            .map_err(|_| TiplineError::Crypto("Key lock table poisoned".to_string()))
    }

    fn acquire_lock(&self, identity_ref: &FilesystemId) -> Result<Arc<RwLock<()>>> {
        let mut locks = self.lock_table()?;
        Ok(locks
            .entry(identity_ref.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone())
    }

    /// Drop the caller's handle and evict the entry once only the table holds it.
    ///
    /// Handles are only cloned under the table mutex, so a count of one here means
    /// no other caller can be waiting on this lock.
    fn release_lock(&self, identity_ref: &FilesystemId, lock: Arc<RwLock<()>>) -> Result<()> {
        drop(lock);
        let mut locks = self.lock_table()?;
        if locks
            .get(identity_ref)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(identity_ref);
        }
        Ok(())
    }

    /// Create the key pair for a source and return its public key.
    ///
    /// `codename` must be the codename `identity_ref` was derived from; the private
    /// key is locked under the passphrase derived from it.
    ///
    /// # Errors
    ///
    /// Returns `TiplineError::KeyGeneration` if a pair exists and `overwrite` is
    /// false, and `TiplineError::InvalidInput` if `codename` does not derive
    /// `identity_ref`.
    #[instrument(skip(self, identity_ref, codename), fields(identity = %identity_ref))]
    pub fn generate_key_pair(
        &self,
        identity_ref: &FilesystemId,
        codename: &str,
        overwrite: bool,
    ) -> Result<Recipient> {
        if &self.hasher.derive_filesystem_id(codename)? != identity_ref {
            return Err(TiplineError::InvalidInput(
                "codename does not match identity".to_string(),
            ));
        }

        self.with_write_lock(identity_ref, || {
            if !overwrite && self.store.get_key_pair(identity_ref)?.is_some() {
                return Err(TiplineError::KeyGeneration(
                    "Key pair already exists for this identity".to_string(),
                ));
            }

            let identity = Identity::generate();
            let public = identity.to_public();
            let passphrase = self.hasher.derive_key_passphrase(codename)?;
            let locked_private_key =
                encryption::lock_identity(&identity, passphrase, self.lock_work_factor)?;

            self.store.put_key_pair(
                &StoredKeyPair {
                    identity_ref: identity_ref.clone(),
                    public_key: public.to_string(),
                    locked_private_key,
                    created_at: self.clock.now(),
                },
                overwrite,
            )?;

            info!("generated source key pair");
            Ok(public)
        })
    }

    /// Remove a source's key pair. Deleting a missing pair is not an error.
    #[instrument(skip(self, identity_ref), fields(identity = %identity_ref))]
    pub fn delete_key_pair(&self, identity_ref: &FilesystemId) -> Result<()> {
        let removed =
            self.with_write_lock(identity_ref, || self.store.delete_key_pair(identity_ref))?;
        debug!(removed, "delete key pair");
        Ok(())
    }

    /// The source's public key, if a pair exists.
    pub fn public_key(&self, identity_ref: &FilesystemId) -> Result<Option<Recipient>> {
        let pair = self.with_read_lock(identity_ref, || self.store.get_key_pair(identity_ref))?;
        pair.map(|pair| {
            parse_recipient(&pair.public_key).map_err(|e| {
                TiplineError::Storage(format!("Stored public key is invalid: {}", e))
            })
        })
        .transpose()
    }

    /// Recipients for a submission from `identity_ref`: the source's own key
    /// followed by every configured journalist key.
    ///
    /// # Errors
    ///
    /// Returns `TiplineError::Crypto` if the source has no key pair.
    pub fn submission_recipients(&self, identity_ref: &FilesystemId) -> Result<Recipients> {
        let source = self
            .public_key(identity_ref)?
            .ok_or_else(|| TiplineError::Crypto("no key pair for this identity".to_string()))?;

        let mut recipients = Vec::with_capacity(1 + self.journalist_recipients.len());
        recipients.push(source);
        recipients.extend(self.journalist_recipients.iter().cloned());
        Ok(Recipients::Many(recipients))
    }

    /// Encrypt `plaintext` to `recipients`, optionally also writing the ciphertext
    /// to `output`.
    ///
    /// The output file is replaced atomically; readers never see a partial file.
    ///
    /// # Arguments
    ///
    /// * `plaintext` - Bytes in memory, or a reader streamed through the encryptor
    /// * `recipients` - One key, or several; any one of them can decrypt
    /// * `output` - Where to also write the ciphertext, if anywhere
    ///
    /// # Returns
    ///
    /// The age ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `TiplineError::Crypto("no recipients requested")` for an empty
    /// recipient list, and `TiplineError::Storage` if the output file cannot be
    /// written.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use tipline_core::envelope::Identity;
    /// use tipline_core::{CryptoEnvelope, FixedClock, Recipients, SqliteStore, TiplineConfig};
    ///
    /// let envelope = CryptoEnvelope::new(
    ///     Arc::new(SqliteStore::open_in_memory().unwrap()),
    ///     Arc::new(FixedClock::at_unix(0)),
    ///     &TiplineConfig::for_testing(),
    /// )
    /// .unwrap();
    ///
    /// let journalist = Identity::generate();
    /// let ciphertext = envelope
    ///     .encrypt("tip".into(), Recipients::One(journalist.to_public()), None)
    ///     .unwrap();
    /// let plaintext = envelope.decrypt_with_identity(&journalist, &ciphertext).unwrap();
    /// assert_eq!(plaintext, b"tip");
    /// ```
    #[instrument(skip_all)]
    pub fn encrypt(
        &self,
        plaintext: Plaintext<'_>,
        recipients: Recipients,
        output: Option<&Path>,
    ) -> Result<Vec<u8>> {
        let recipients = recipients.into_vec();
        let ciphertext = match plaintext {
            Plaintext::Bytes(mut bytes) => {
                encryption::encrypt_to_recipients(&mut bytes, &recipients)?
            }
            Plaintext::Reader(mut reader) => {
                encryption::encrypt_to_recipients(&mut reader, &recipients)?
            }
        };

        if let Some(path) = output {
            crate::fs::write_atomic(path, &ciphertext)?;
            debug!(path = %path.display(), "wrote ciphertext");
        }

        debug!(recipients = recipients.len(), "encrypted");
        Ok(ciphertext)
    }

    /// Decrypt a message addressed to the source holding `codename`.
    ///
    /// # Errors
    ///
    /// Returns `TiplineError::Crypto` if no key pair exists for the codename, the
    /// key cannot be unlocked, or the ciphertext is not addressed to it.
    #[instrument(skip_all)]
    pub fn decrypt(&self, codename: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let identity_ref = self.hasher.derive_filesystem_id(codename)?;

        self.with_read_lock(&identity_ref, || {
            let pair = self.store.get_key_pair(&identity_ref)?.ok_or_else(|| {
                TiplineError::Crypto("no key pair for this codename".to_string())
            })?;

            let passphrase = self.hasher.derive_key_passphrase(codename)?;
            let identity = encryption::unlock_identity(&pair.locked_private_key, passphrase)?;
            encryption::decrypt_with_identity(ciphertext, &identity)
        })
    }

    /// Decrypt with a caller-held identity, e.g. a journalist's own key.
    pub fn decrypt_with_identity(&self, identity: &Identity, ciphertext: &[u8]) -> Result<Vec<u8>> {
        encryption::decrypt_with_identity(ciphertext, identity)
    }
}
