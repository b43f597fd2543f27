//! Persistence for journalists, login attempts, sources and key pairs.
//!
//! The traits in [`traits`] are what the services depend on; [`SqliteStore`] is
//! the bundled implementation.

pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::SqliteStore;
pub use traits::{JournalistStore, KeyPairStore, SourceStore};
pub use types::{Journalist, LoginAttempt, NewJournalist, SourceRecord, StoredKeyPair};
