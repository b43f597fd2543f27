//! Error types for Tipline core operations.
//!
//! Every variant is a per-request outcome; nothing here is fatal to the process.
//! Login failures keep their specific kind all the way to the caller, which decides
//! what (if anything) to show the user.

use thiserror::Error;

/// Result type alias for Tipline operations.
pub type Result<T> = std::result::Result<T, TiplineError>;

/// Core error type for Tipline operations.
#[derive(Debug, Error)]
pub enum TiplineError {
    /// No journalist with the given username
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Too many login attempts inside the throttle window
    #[error("Login throttled ({attempts} attempts in last {window_secs} seconds)")]
    LoginThrottled { attempts: u64, window_secs: u64 },

    /// Malformed, invalid or reused one-time token
    #[error("Bad token: {0}")]
    BadToken(String),

    /// Password did not match the stored hash
    #[error("Invalid password")]
    WrongPassword,

    /// Password length outside the accepted policy
    #[error("{}", password_length_message(*len))]
    InvalidPasswordLength { len: usize },

    /// Invalid user input (unsafe characters, over-long codenames, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Encryption or decryption error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Keypair creation refused or failed
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Configuration could not be read, parsed or validated
    #[error("Config error: {0}")]
    Config(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// Generic resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

fn password_length_message(len: usize) -> String {
    use crate::credentials::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};

    if len > MAX_PASSWORD_LEN {
        format!("Password too long (len={})", len)
    } else {
        format!(
            "Password needs to be at least {} characters",
            MIN_PASSWORD_LEN
        )
    }
}
