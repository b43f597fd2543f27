//! Journalist login.
//!
//! A login runs its checks in a fixed order and stops at the first failure:
//!
//! 1. the username must exist
//! 2. with hardening on, the attempt is recorded and throttled
//! 3. the one-time token must verify (HOTP counters advance here)
//! 4. the password must verify
//!
//! The token is checked before the password, so a consumed HOTP token stays
//! consumed even when the password turns out to be wrong.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::TiplineConfig;
use crate::credentials::PasswordHasher;
use crate::error::{Result, TiplineError};
use crate::otp::{OtpMode, OtpSecret, OtpState, OtpVerification, OtpVerifier};
use crate::storage::{Journalist, JournalistStore, NewJournalist};
use crate::throttle::LoginThrottle;

/// Upper bound on re-verifications after losing an HOTP counter race.
const MAX_COUNTER_RETRIES: usize = 8;

/// Where a login attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Start,
    ThrottleCheck,
    TokenCheck,
    PasswordCheck,
    Authenticated,
}

impl LoginStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStage::Start => "start",
            LoginStage::ThrottleCheck => "throttle_check",
            LoginStage::TokenCheck => "token_check",
            LoginStage::PasswordCheck => "password_check",
            LoginStage::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticates journalists and manages their credentials.
pub struct LoginSessionManager {
    store: Arc<dyn JournalistStore>,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
    verifier: OtpVerifier,
    throttle: LoginThrottle,
    hardening: bool,
}

impl LoginSessionManager {
    pub fn new(
        store: Arc<dyn JournalistStore>,
        clock: Arc<dyn Clock>,
        config: &TiplineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            hasher: PasswordHasher::from_config(&config.credentials),
            verifier: OtpVerifier::from_config(&config.login),
            throttle: LoginThrottle::from_config(&config.login),
            hardening: config.login.hardening,
        }
    }

    pub fn hardening(&self) -> bool {
        self.hardening
    }

    /// Authenticate at the clock's current time.
    pub fn login(&self, username: &str, password: &str, token: &str) -> Result<Journalist> {
        self.login_at(username, password, token, self.clock.now())
    }

    /// Authenticate at an explicit time.
    ///
    /// With hardening on, a TOTP login records its access as a compare-and-swap
    /// against the `last_access` the token was checked against, so two logins
    /// replaying one token at the same moment cannot both succeed.
    ///
    /// # Arguments
    ///
    /// * `username` - The journalist's username, matched exactly
    /// * `password` - The candidate password
    /// * `token` - A six-digit TOTP or HOTP code; spaces are ignored
    /// * `now` - The time the attempt is made at
    ///
    /// # Returns
    ///
    /// The authenticated journalist, with `last_access` set to `now`.
    ///
    /// # Errors
    ///
    /// In check order: `InvalidUsername`, `LoginThrottled` (hardening only),
    /// `BadToken`, then `InvalidPasswordLength` or `WrongPassword`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use tipline_core::{
    ///     FixedClock, LoginSessionManager, SqliteStore, TiplineConfig, TiplineError,
    /// };
    ///
    /// let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    /// let clock = Arc::new(FixedClock::at_unix(1_700_000_000));
    /// let manager = LoginSessionManager::new(store, clock, &TiplineConfig::for_testing());
    ///
    /// let result = manager.login("nobody", "correct horse battery", "123456");
    /// assert!(matches!(result, Err(TiplineError::InvalidUsername(_))));
    /// ```
    #[instrument(skip(self, password, token))]
    pub fn login_at(
        &self,
        username: &str,
        password: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Journalist> {
        let mut journalist = self
            .store
            .find_by_username(username)?
            .ok_or_else(|| {
                self.rejected(
                    LoginStage::Start,
                    TiplineError::InvalidUsername(format!("invalid username '{}'", username)),
                )
            })?;

        if self.hardening {
            self.throttle
                .record_attempt(self.store.as_ref(), &journalist.id, now)
                .map_err(|e| self.rejected(LoginStage::ThrottleCheck, e))?;
        }

        self.check_token(&mut journalist, token, now)
            .map_err(|e| self.rejected(LoginStage::TokenCheck, e))?;

        let valid = self
            .hasher
            .verify_password(password, &journalist.password)
            .map_err(|e| self.rejected(LoginStage::PasswordCheck, e))?;
        if !valid {
            return Err(self.rejected(LoginStage::PasswordCheck, TiplineError::WrongPassword));
        }

        self.record_access(&journalist, now)?;
        journalist.otp.last_access = Some(now);

        info!(stage = %LoginStage::Authenticated, journalist_id = %journalist.id, "login succeeded");
        Ok(journalist)
    }

    /// Verify the token, applying any HOTP counter advance as a compare-and-swap.
    ///
    /// On a lost swap the journalist is reloaded and the token checked again
    /// against the fresh counter, so two logins racing on one token cannot both
    /// succeed.
    fn check_token(&self, journalist: &mut Journalist, token: &str, now: DateTime<Utc>) -> Result<()> {
        for _ in 0..MAX_COUNTER_RETRIES {
            match self.verifier.verify(&journalist.otp, token, now)? {
                OtpVerification::Rejected => {
                    return Err(TiplineError::BadToken("Invalid token.".to_string()));
                }
                OtpVerification::Accepted {
                    counter_advance: None,
                } => return Ok(()),
                OtpVerification::Accepted {
                    counter_advance: Some(advance),
                } => {
                    if self.store.advance_hotp_counter(&journalist.id, advance)? {
                        journalist.otp.hotp_counter = advance.next;
                        return Ok(());
                    }
                    debug!("hotp counter moved underneath us, re-verifying");
                    *journalist = self.reload(&journalist.id)?;
                }
            }
        }
        Err(TiplineError::BadToken(
            "Token verification contended, try again.".to_string(),
        ))
    }

    /// Record a successful login. For a hardened TOTP login the swap fails if
    /// another login used a token after this one was verified.
    fn record_access(&self, journalist: &Journalist, now: DateTime<Utc>) -> Result<()> {
        if !(self.hardening && journalist.otp.mode == OtpMode::Totp) {
            return self.store.update_last_access(&journalist.id, now);
        }
        if self
            .store
            .swap_last_access(&journalist.id, journalist.otp.last_access, now)?
        {
            return Ok(());
        }
        Err(self.rejected(
            LoginStage::TokenCheck,
            TiplineError::BadToken(
                "Token valid, but reused, or token precedes or proceeds a used token".to_string(),
            ),
        ))
    }

    fn reload(&self, id: &Uuid) -> Result<Journalist> {
        self.store
            .get_journalist(id)?
            .ok_or_else(|| TiplineError::NotFound(format!("journalist {}", id)))
    }

    fn rejected(&self, stage: LoginStage, err: TiplineError) -> TiplineError {
        warn!(stage = %stage, error = %err, "login rejected");
        err
    }

    // --- Account management ---

    /// Create an account with a fresh TOTP secret.
    #[instrument(skip(self, password))]
    pub fn create_journalist(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<Journalist> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TiplineError::InvalidUsername(
                "Username cannot be empty".to_string(),
            ));
        }

        let password = self
            .hasher
            .set_password(None, password)?
            .ok_or_else(|| TiplineError::InvalidInput("Password not set".to_string()))?;

        self.store.insert_journalist(&NewJournalist {
            username: username.to_string(),
            password,
            otp: OtpState::totp(OtpSecret::generate()?),
            is_admin,
            created_on: self.clock.now(),
        })
    }

    /// Change a password. Returns `false` if it was already `new_password`.
    #[instrument(skip(self, new_password))]
    pub fn set_password(&self, id: &Uuid, new_password: &str) -> Result<bool> {
        let journalist = self.reload(id)?;
        match self
            .hasher
            .set_password(Some(&journalist.password), new_password)?
        {
            Some(hash) => {
                self.store.update_password(id, &hash)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Switch to TOTP with a newly generated secret, returned for enrollment.
    #[instrument(skip(self))]
    pub fn regenerate_totp_secret(&self, id: &Uuid) -> Result<OtpSecret> {
        let journalist = self.reload(id)?;
        let secret = OtpSecret::generate()?;
        let mut otp = OtpState::totp(secret.clone());
        otp.last_access = journalist.otp.last_access;
        self.store.update_otp(id, &otp)?;
        Ok(secret)
    }

    /// Switch to a hardware HOTP token given its hex secret. The counter restarts at 0.
    #[instrument(skip(self, hex_secret))]
    pub fn set_hotp_secret(&self, id: &Uuid, hex_secret: &str) -> Result<()> {
        let journalist = self.reload(id)?;
        let mut otp = OtpState::hotp(OtpSecret::from_hotp_hex(hex_secret)?);
        otp.last_access = journalist.otp.last_access;
        self.store.update_otp(id, &otp)
    }

    /// Drop attempt records that can no longer affect any throttle window.
    pub fn prune_login_attempts(&self) -> Result<usize> {
        let window = chrono::Duration::seconds(
            i64::try_from(self.throttle.window_secs()).unwrap_or(i64::MAX),
        );
        let now = self.clock.now();
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.store.prune_login_attempts(cutoff)
    }
}
