//! Runtime configuration.
//!
//! Loaded from TOML. Every section has defaults so a partial file (or none at all)
//! yields a hardened production setup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TiplineError};
use crate::kdf::KdfProfile;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TiplineConfig {
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub credentials: CredentialsSection,
    #[serde(default)]
    pub login: LoginSection,
    #[serde(default)]
    pub envelope: EnvelopeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub words_in_codename: usize,
    pub default_locale: String,
    /// Deployment-wide pepper mixed into codename hashing. Same for every source.
    pub pepper: Option<String>,
    pub kdf: KdfProfile,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            words_in_codename: 7,
            default_locale: "en".to_string(),
            pepper: None,
            kdf: KdfProfile::V1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsSection {
    /// Profile used for newly set passwords.
    pub profile: KdfProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSection {
    /// Enables throttling and TOTP reuse detection.
    pub hardening: bool,
    pub throttle_window_secs: u64,
    pub max_attempts_per_window: u64,
    pub hotp_look_ahead: u64,
    pub totp_step_secs: u64,
}

impl Default for LoginSection {
    fn default() -> Self {
        Self {
            hardening: true,
            throttle_window_secs: 60,
            max_attempts_per_window: 5,
            hotp_look_ahead: 20,
            totp_step_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSection {
    /// age X25519 recipients (journalist keys) added to every submission.
    pub journalist_recipients: Vec<String>,
    /// scrypt log2(N) for locking source private keys.
    pub key_lock_work_factor: u8,
}

impl Default for EnvelopeSection {
    fn default() -> Self {
        Self {
            journalist_recipients: Vec::new(),
            key_lock_work_factor: 14,
        }
    }
}

impl TiplineConfig {
    /// Cheapest settings that still exercise every code path. Hardening stays on.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.identity.kdf = KdfProfile::Testing;
        config.credentials.profile = KdfProfile::Testing;
        config.envelope.key_lock_work_factor = 2;
        config
    }

    /// Reject values the rest of the crate cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.identity.words_in_codename == 0 {
            return Err(TiplineError::Config(
                "identity.words_in_codename must be at least 1".to_string(),
            ));
        }
        if self.identity.default_locale.trim().is_empty() {
            return Err(TiplineError::Config(
                "identity.default_locale cannot be empty".to_string(),
            ));
        }
        if self.login.throttle_window_secs == 0 {
            return Err(TiplineError::Config(
                "login.throttle_window_secs must be positive".to_string(),
            ));
        }
        if self.login.totp_step_secs == 0 {
            return Err(TiplineError::Config(
                "login.totp_step_secs must be positive".to_string(),
            ));
        }
        if self.login.hotp_look_ahead == 0 {
            return Err(TiplineError::Config(
                "login.hotp_look_ahead must be at least 1".to_string(),
            ));
        }
        if !(1..=30).contains(&self.envelope.key_lock_work_factor) {
            return Err(TiplineError::Config(
                "envelope.key_lock_work_factor must be between 1 and 30".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn parse_config(contents: &str) -> Result<TiplineConfig> {
    let config: TiplineConfig = toml::from_str(contents)
        .map_err(|e| TiplineError::Config(format!("Failed to parse config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

pub fn read_config(path: &Path) -> Result<TiplineConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TiplineError::Config(format!("Failed to read config {}: {}", path.display(), e))
    })?;
    parse_config(&contents)
}

pub fn write_config(path: &Path, config: &TiplineConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            TiplineError::Config(format!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    let contents = toml::to_string_pretty(config)
        .map_err(|e| TiplineError::Config(format!("TOML error: {}", e)))?;
    crate::fs::write_atomic(path, contents.as_bytes())
}
