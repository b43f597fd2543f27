//! Per-journalist login rate limiting.
//!
//! Every attempt is recorded, successful or not, and the count inside the sliding
//! window decides whether the attempt may proceed. The append and the count happen
//! in one storage transaction, so concurrent attempts can't both observe a count
//! below the limit.

use chrono::{DateTime, Duration, Utc};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::LoginSection;
use crate::error::{Result, TiplineError};
use crate::storage::JournalistStore;

/// Sliding-window attempt limiter.
#[derive(Debug, Clone, Copy)]
pub struct LoginThrottle {
    window_secs: u64,
    max_attempts: u64,
}

impl LoginThrottle {
    /// Defaults: five attempts per sixty seconds.
    pub fn new(window_secs: u64, max_attempts: u64) -> Self {
        Self {
            window_secs,
            max_attempts,
        }
    }

    pub fn from_config(section: &LoginSection) -> Self {
        Self::new(section.throttle_window_secs, section.max_attempts_per_window)
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Record an attempt at `now` and fail if the window now holds too many.
    ///
    /// The rejected attempt is still recorded: hammering during a lockout keeps
    /// the window full.
    #[instrument(skip(self, store))]
    pub fn record_attempt(
        &self,
        store: &dyn JournalistStore,
        journalist_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let window = Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX));
        let since = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let attempts = store.record_login_attempt(journalist_id, now, since)?;

        if attempts > self.max_attempts {
            warn!(attempts, "login throttled");
            return Err(TiplineError::LoginThrottled {
                attempts,
                window_secs: self.window_secs,
            });
        }
        Ok(())
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(60, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::PasswordHash;
    use crate::kdf::KdfProfile;
    use crate::otp::{OtpSecret, OtpState};
    use crate::storage::{NewJournalist, SqliteStore};

    fn setup() -> (SqliteStore, Uuid, Uuid) {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for name in ["alice", "bob"] {
            let created = store
                .insert_journalist(&NewJournalist {
                    username: name.to_string(),
                    password: PasswordHash {
                        salt: vec![0; 32],
                        hash: vec![0; 32],
                        profile: KdfProfile::Testing,
                    },
                    otp: OtpState::totp(OtpSecret::from_base32("JBSWY3DPEHPK3PXP").unwrap()),
                    is_admin: false,
                    created_on: Utc::now(),
                })
                .unwrap();
            ids.push(created.id);
        }
        (store, ids[0], ids[1])
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_sixth_attempt_in_window_is_throttled() {
        let (store, alice, _) = setup();
        let throttle = LoginThrottle::default();

        for i in 0..5 {
            throttle.record_attempt(&store, &alice, at(i)).unwrap();
        }
        let result = throttle.record_attempt(&store, &alice, at(5));
        assert!(matches!(
            result,
            Err(TiplineError::LoginThrottled {
                attempts: 6,
                window_secs: 60
            })
        ));
    }

    #[test]
    fn test_old_attempts_fall_out_of_window() {
        let (store, alice, _) = setup();
        let throttle = LoginThrottle::default();

        for i in 0..5 {
            throttle.record_attempt(&store, &alice, at(i)).unwrap();
        }
        // Attempts at 0..4 are all at least 60s old at t=64.
        throttle.record_attempt(&store, &alice, at(64)).unwrap();
    }

    #[test]
    fn test_throttle_is_per_journalist() {
        let (store, alice, bob) = setup();
        let throttle = LoginThrottle::default();

        for i in 0..6 {
            let _ = throttle.record_attempt(&store, &alice, at(i));
        }
        assert!(throttle.record_attempt(&store, &bob, at(6)).is_ok());
    }

    #[test]
    fn test_rejected_attempts_are_recorded() {
        let (store, alice, _) = setup();
        let throttle = LoginThrottle::new(60, 1);

        throttle.record_attempt(&store, &alice, at(0)).unwrap();
        assert!(throttle.record_attempt(&store, &alice, at(1)).is_err());
        assert_eq!(store.login_attempts(&alice).unwrap().len(), 2);
    }
}
