//! One-time token verification.
//!
//! TOTP accepts the current step and one step either side to absorb clock skew; with
//! hardening on, a token whose step sits within one step of the last successful login
//! is reported as reused. HOTP scans a look-ahead window from the stored counter.
//!
//! Verification never mutates anything. An accepted HOTP token comes back with a
//! [`CounterAdvance`] the caller must apply as a compare-and-swap against storage.

pub mod code;

use std::fmt;

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::config::LoginSection;
use crate::error::{Result, TiplineError};
use crate::kdf::random_bytes;

pub use code::{hotp, normalize_token, timecode, tokens_match, TOKEN_DIGITS};

const SECRET_BYTES: usize = 20;

/// Which kind of token a journalist's device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpMode {
    Totp,
    Hotp,
}

impl OtpMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpMode::Totp => "totp",
            OtpMode::Hotp => "hotp",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "totp" => Ok(OtpMode::Totp),
            "hotp" => Ok(OtpMode::Hotp),
            other => Err(TiplineError::Storage(format!("Unknown OTP mode: {}", other))),
        }
    }
}

/// Base32 shared secret (uppercase, unpadded).
#[derive(Clone)]
pub struct OtpSecret(Zeroizing<String>);

impl OtpSecret {
    /// Fresh random secret for a TOTP authenticator app.
    pub fn generate() -> Result<Self> {
        let bytes: Zeroizing<[u8; SECRET_BYTES]> = Zeroizing::new(random_bytes()?);
        Ok(Self(Zeroizing::new(BASE32_NOPAD.encode(&bytes[..]))))
    }

    /// Accept a stored or user-entered base32 secret.
    pub fn from_base32(value: &str) -> Result<Self> {
        let normalized: String = value
            .split_whitespace()
            .collect::<String>()
            .trim_end_matches('=')
            .to_ascii_uppercase();
        BASE32_NOPAD
            .decode(normalized.as_bytes())
            .map_err(|e| TiplineError::InvalidInput(format!("Invalid OTP secret: {}", e)))?;
        if normalized.is_empty() {
            return Err(TiplineError::InvalidInput(
                "OTP secret cannot be empty".to_string(),
            ));
        }
        Ok(Self(Zeroizing::new(normalized)))
    }

    /// Secret of a hardware HOTP token, as printed in hex (spaces allowed).
    pub fn from_hotp_hex(value: &str) -> Result<Self> {
        let compact: String = value.split_whitespace().collect();
        let bytes = Zeroizing::new(
            hex::decode(&compact)
                .map_err(|e| TiplineError::InvalidInput(format!("Invalid HOTP secret: {}", e)))?,
        );
        if bytes.is_empty() {
            return Err(TiplineError::InvalidInput(
                "HOTP secret cannot be empty".to_string(),
            ));
        }
        Ok(Self(Zeroizing::new(BASE32_NOPAD.encode(&bytes))))
    }

    /// Access the secret. Avoid storing or logging this value outside persistence.
    pub fn as_base32(&self) -> &str {
        &self.0
    }

    fn key_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        BASE32_NOPAD
            .decode(self.0.as_bytes())
            .map(Zeroizing::new)
            .map_err(|e| TiplineError::Storage(format!("Corrupt OTP secret: {}", e)))
    }

    /// Code for an explicit counter or TOTP step, e.g. to confirm a device during
    /// enrollment.
    pub fn code_at(&self, counter: u64) -> Result<String> {
        hotp(&self.key_bytes()?, counter)
    }

    /// Lowercase groups of four, easier to type into an authenticator by hand.
    pub fn formatted(&self) -> String {
        self.0
            .to_ascii_lowercase()
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for OtpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpSecret([REDACTED])")
    }
}

/// Everything the verifier needs to know about one journalist's second factor.
#[derive(Debug, Clone)]
pub struct OtpState {
    pub mode: OtpMode,
    pub secret: OtpSecret,
    pub hotp_counter: u64,
    pub last_access: Option<DateTime<Utc>>,
}

impl OtpState {
    pub fn totp(secret: OtpSecret) -> Self {
        Self {
            mode: OtpMode::Totp,
            secret,
            hotp_counter: 0,
            last_access: None,
        }
    }

    pub fn hotp(secret: OtpSecret) -> Self {
        Self {
            mode: OtpMode::Hotp,
            secret,
            hotp_counter: 0,
            last_access: None,
        }
    }

    /// `otpauth://` URI for enrolling an authenticator app.
    pub fn provisioning_uri(&self, username: &str, issuer: &str) -> String {
        let issuer = urlencoding::encode(issuer);
        let label = format!("{}:{}", issuer, urlencoding::encode(username));
        let mut uri = format!(
            "otpauth://{}/{}?secret={}&issuer={}",
            self.mode.as_str(),
            label,
            self.secret.as_base32(),
            issuer
        );
        if self.mode == OtpMode::Hotp {
            uri.push_str(&format!("&counter={}", self.hotp_counter));
        }
        uri
    }
}

/// Counter update an accepted HOTP token requires.
///
/// Apply only if the stored counter still equals `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterAdvance {
    pub expected: u64,
    pub next: u64,
}

/// Outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpVerification {
    Accepted {
        counter_advance: Option<CounterAdvance>,
    },
    Rejected,
}

impl OtpVerification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, OtpVerification::Accepted { .. })
    }
}

/// Stateless verifier; all state comes in through [`OtpState`].
#[derive(Debug, Clone, Copy)]
pub struct OtpVerifier {
    hardening: bool,
    step_secs: u64,
    look_ahead: u64,
}

impl OtpVerifier {
    pub fn new(hardening: bool) -> Self {
        let defaults = LoginSection::default();
        Self {
            hardening,
            step_secs: defaults.totp_step_secs,
            look_ahead: defaults.hotp_look_ahead,
        }
    }

    pub fn from_config(section: &LoginSection) -> Self {
        Self {
            hardening: section.hardening,
            step_secs: section.totp_step_secs,
            look_ahead: section.hotp_look_ahead,
        }
    }

    pub fn step_secs(&self) -> u64 {
        self.step_secs
    }

    /// Verify `token` for `state` at `now`.
    ///
    /// Malformed tokens and reused TOTP tokens are errors; a well-formed token that
    /// simply doesn't match is `Ok(Rejected)`.
    #[instrument(skip_all, fields(mode = state.mode.as_str()))]
    pub fn verify(
        &self,
        state: &OtpState,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpVerification> {
        let token = normalize_token(token)?;
        let key = state.secret.key_bytes()?;

        match state.mode {
            OtpMode::Totp => self.verify_totp(state, &key, &token, now),
            OtpMode::Hotp => self.verify_hotp(state, &key, &token),
        }
    }

    fn verify_totp(
        &self,
        state: &OtpState,
        key: &[u8],
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpVerification> {
        let current = timecode(now, self.step_secs);

        // Check every candidate step; no early exit.
        let mut matched_step = None;
        for step in current.saturating_sub(1)..=current.saturating_add(1) {
            if tokens_match(&hotp(key, step)?, token) && matched_step.is_none() {
                matched_step = Some(step);
            }
        }

        let Some(step) = matched_step else {
            debug!("totp token did not match");
            return Ok(OtpVerification::Rejected);
        };

        if self.hardening {
            if let Some(last_access) = state.last_access {
                let last_step = timecode(last_access, self.step_secs);
                if step.abs_diff(last_step) <= 1 {
                    warn!("totp token reuse rejected");
                    return Err(TiplineError::BadToken(
                        "Token valid, but reused, or token precedes or proceeds a used token"
                            .to_string(),
                    ));
                }
            }
        }

        Ok(OtpVerification::Accepted {
            counter_advance: None,
        })
    }

    fn verify_hotp(&self, state: &OtpState, key: &[u8], token: &str) -> Result<OtpVerification> {
        let start = state.hotp_counter;
        let end = start.saturating_add(self.look_ahead);

        for counter in start..end {
            if tokens_match(&hotp(key, counter)?, token) {
                debug!(skipped = counter - start, "hotp token matched");
                return Ok(OtpVerification::Accepted {
                    counter_advance: Some(CounterAdvance {
                        expected: start,
                        next: counter + 1,
                    }),
                });
            }
        }

        debug!("hotp token outside look-ahead window");
        Ok(OtpVerification::Rejected)
    }
}
