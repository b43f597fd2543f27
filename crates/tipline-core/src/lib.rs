//! # Tipline Core
//!
//! Identity and credential core for an anonymous tip line: sources are known
//! only by an identifier derived from a secret codename, journalists log in with
//! a password plus a one-time token, and submissions are encrypted so that only
//! the source's codename or a journalist's key can open them.
//!
//! ## Architecture
//!
//! - **identity**: codenames, filesystem ids, designations
//! - **credentials**: journalist password hashing
//! - **otp**: TOTP/HOTP verification and provisioning
//! - **throttle**: per-journalist login rate limiting
//! - **login**: the ordered login transaction and account management
//! - **envelope**: source key pairs and age encryption
//! - **storage**: persistence traits and the SQLite implementation
//! - **submission**: naming, counting and ordering stored artifacts
//!
//! Time is read through [`clock::Clock`] and configuration comes from
//! [`config::TiplineConfig`].

pub mod clock;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod fs;
pub mod identity;
pub mod kdf;
pub mod login;
pub mod otp;
pub mod storage;
pub mod submission;
pub mod throttle;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TiplineConfig;
pub use credentials::{PasswordHash, PasswordHasher};
pub use envelope::{CryptoEnvelope, Plaintext, Recipients};
pub use error::{Result, TiplineError};
pub use identity::{Codename, CodenameGenerator, CodenameHasher, FilesystemId, SourceIdentity};
pub use login::{LoginSessionManager, LoginStage};
pub use otp::{OtpMode, OtpSecret, OtpState, OtpVerification, OtpVerifier};
pub use storage::{JournalistStore, KeyPairStore, SourceStore, SqliteStore};
pub use throttle::LoginThrottle;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
