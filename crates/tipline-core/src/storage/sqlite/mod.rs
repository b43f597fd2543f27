//! SQLite storage backend.
//!
//! One connection behind a mutex. Multi-statement operations run inside a
//! transaction so they stay atomic even when the database file is shared with
//! another process.

mod row;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::credentials::PasswordHash;
use crate::error::{Result, TiplineError};
use crate::identity::FilesystemId;
use crate::otp::{CounterAdvance, OtpState};
use crate::storage::traits::{JournalistStore, KeyPairStore, SourceStore};
use crate::storage::types::{
    Journalist, LoginAttempt, NewJournalist, SourceRecord, StoredKeyPair,
};

use row::{
    parse_millis, JournalistRow, KeyPairRow, SourceRow, JOURNALIST_COLUMNS, SOURCE_COLUMNS,
};

/// Current on-disk schema version.
pub const FORMAT_VERSION: &str = "1";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS journalists (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        pw_salt BLOB NOT NULL,
        pw_hash BLOB NOT NULL,
        pw_profile TEXT NOT NULL,
        otp_secret TEXT NOT NULL,
        otp_mode TEXT NOT NULL,
        hotp_counter INTEGER NOT NULL DEFAULT 0,
        last_access TEXT,
        is_admin INTEGER NOT NULL DEFAULT 0,
        created_on TEXT NOT NULL
    );

    -- Timestamps are unix milliseconds so window queries compare numerically.
    CREATE TABLE IF NOT EXISTS journalist_login_attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        journalist_id TEXT NOT NULL,
        timestamp INTEGER NOT NULL,

        FOREIGN KEY(journalist_id) REFERENCES journalists(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_login_attempts_journalist
        ON journalist_login_attempts(journalist_id, timestamp);

    CREATE TABLE IF NOT EXISTS sources (
        filesystem_id TEXT PRIMARY KEY,
        designation TEXT NOT NULL,
        pending INTEGER NOT NULL DEFAULT 1,
        flagged INTEGER NOT NULL DEFAULT 0,
        starred INTEGER NOT NULL DEFAULT 0,
        interaction_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        last_updated TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS key_pairs (
        identity_ref TEXT PRIMARY KEY,
        public_key TEXT NOT NULL,
        locked_private_key BLOB NOT NULL,
        created_at TEXT NOT NULL
    );
"#;

/// SQLite-backed implementation of every store trait.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::init(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'format_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match version.as_deref() {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('format_version', ?)",
                    [FORMAT_VERSION],
                )?;
            }
            Some(FORMAT_VERSION) => {}
            Some(other) => {
                return Err(TiplineError::Storage(format!(
                    "Unsupported format version: {}",
                    other
                )));
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TiplineError::Storage("SQLite connection poisoned".to_string()))
    }

    fn query_journalist(&self, clause: &str, param: &str) -> Result<Option<Journalist>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM journalists WHERE {} = ?", JOURNALIST_COLUMNS, clause);
        let row = conn
            .query_row(&sql, [param], JournalistRow::from_row)
            .optional()?;
        row.map(Journalist::try_from).transpose()
    }

    fn expect_one(changed: usize, id: &Uuid) -> Result<()> {
        if changed == 0 {
            return Err(TiplineError::NotFound(format!("journalist {}", id)));
        }
        Ok(())
    }

    fn expect_source(changed: usize, filesystem_id: &FilesystemId) -> Result<()> {
        if changed == 0 {
            return Err(TiplineError::NotFound(format!("source {}", filesystem_id)));
        }
        Ok(())
    }
}

fn counter_to_sql(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| TiplineError::Storage("HOTP counter out of range".to_string()))
}

impl JournalistStore for SqliteStore {
    fn insert_journalist(&self, journalist: &NewJournalist) -> Result<Journalist> {
        let conn = self.lock_conn()?;
        let id = Uuid::now_v7();

        let result = conn.execute(
            r#"
            INSERT INTO journalists
                (id, username, pw_salt, pw_hash, pw_profile, otp_secret, otp_mode,
                 hotp_counter, last_access, is_admin, created_on)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                id.to_string(),
                journalist.username,
                journalist.password.salt,
                journalist.password.hash,
                journalist.password.profile.as_str(),
                journalist.otp.secret.as_base32(),
                journalist.otp.mode.as_str(),
                counter_to_sql(journalist.otp.hotp_counter)?,
                journalist.otp.last_access.map(|t| t.to_rfc3339()),
                journalist.is_admin,
                journalist.created_on.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(TiplineError::InvalidUsername(format!(
                    "Username \"{}\" already taken.",
                    journalist.username
                )));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Journalist {
            id,
            username: journalist.username.clone(),
            password: journalist.password.clone(),
            otp: journalist.otp.clone(),
            is_admin: journalist.is_admin,
            created_on: journalist.created_on,
        })
    }

    fn get_journalist(&self, id: &Uuid) -> Result<Option<Journalist>> {
        self.query_journalist("id", &id.to_string())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<Journalist>> {
        self.query_journalist("username", username)
    }

    fn update_password(&self, id: &Uuid, password: &PasswordHash) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE journalists SET pw_salt = ?, pw_hash = ?, pw_profile = ? WHERE id = ?",
            rusqlite::params![
                password.salt,
                password.hash,
                password.profile.as_str(),
                id.to_string()
            ],
        )?;
        Self::expect_one(changed, id)
    }

    fn update_otp(&self, id: &Uuid, otp: &OtpState) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE journalists SET otp_secret = ?, otp_mode = ?, hotp_counter = ? WHERE id = ?",
            rusqlite::params![
                otp.secret.as_base32(),
                otp.mode.as_str(),
                counter_to_sql(otp.hotp_counter)?,
                id.to_string()
            ],
        )?;
        Self::expect_one(changed, id)
    }

    #[instrument(skip(self))]
    fn advance_hotp_counter(&self, id: &Uuid, advance: CounterAdvance) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE journalists SET hotp_counter = ? WHERE id = ? AND hotp_counter = ?",
            rusqlite::params![
                counter_to_sql(advance.next)?,
                id.to_string(),
                counter_to_sql(advance.expected)?
            ],
        )?;
        debug!(applied = changed == 1, "hotp counter swap");
        Ok(changed == 1)
    }

    fn update_last_access(&self, id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE journalists SET last_access = ? WHERE id = ?",
            rusqlite::params![at.to_rfc3339(), id.to_string()],
        )?;
        Self::expect_one(changed, id)
    }

    fn swap_last_access(
        &self,
        id: &Uuid,
        expected: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE journalists SET last_access = ? WHERE id = ? AND last_access IS ?",
            rusqlite::params![
                at.to_rfc3339(),
                id.to_string(),
                expected.map(|t| t.to_rfc3339())
            ],
        )?;
        debug!(applied = changed == 1, "last access swap");
        Ok(changed == 1)
    }

    fn record_login_attempt(
        &self,
        id: &Uuid,
        at: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO journalist_login_attempts (journalist_id, timestamp) VALUES (?, ?)",
            rusqlite::params![id.to_string(), at.timestamp_millis()],
        )?;
        let count: i64 = tx.query_row(
            r#"
            SELECT COUNT(*) FROM journalist_login_attempts
            WHERE journalist_id = ? AND timestamp > ?
            "#,
            rusqlite::params![id.to_string(), since.timestamp_millis()],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn login_attempts(&self, id: &Uuid) -> Result<Vec<LoginAttempt>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT timestamp FROM journalist_login_attempts
            WHERE journalist_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map([id.to_string()], |row| row.get::<_, i64>(0))?;

        let mut attempts = Vec::new();
        for millis in rows {
            attempts.push(LoginAttempt {
                journalist_id: *id,
                timestamp: parse_millis(millis?)?,
            });
        }
        Ok(attempts)
    }

    fn prune_login_attempts(&self, before: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM journalist_login_attempts WHERE timestamp <= ?",
            [before.timestamp_millis()],
        )?;
        debug!(removed, "pruned login attempts");
        Ok(removed)
    }
}

impl KeyPairStore for SqliteStore {
    fn get_key_pair(&self, identity_ref: &FilesystemId) -> Result<Option<StoredKeyPair>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT identity_ref, public_key, locked_private_key, created_at
                FROM key_pairs
                WHERE identity_ref = ?
                "#,
                [identity_ref.as_str()],
                |row| {
                    Ok(KeyPairRow {
                        identity_ref: row.get(0)?,
                        public_key: row.get(1)?,
                        locked_private_key: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        row.map(StoredKeyPair::try_from).transpose()
    }

    fn put_key_pair(&self, key_pair: &StoredKeyPair, overwrite: bool) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT identity_ref FROM key_pairs WHERE identity_ref = ?",
                [key_pair.identity_ref.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() && !overwrite {
            return Err(TiplineError::KeyGeneration(
                "Key pair already exists for this identity".to_string(),
            ));
        }

        tx.execute(
            r#"
            INSERT OR REPLACE INTO key_pairs
                (identity_ref, public_key, locked_private_key, created_at)
            VALUES (?, ?, ?, ?)
            "#,
            rusqlite::params![
                key_pair.identity_ref.as_str(),
                key_pair.public_key,
                key_pair.locked_private_key,
                key_pair.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn delete_key_pair(&self, identity_ref: &FilesystemId) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM key_pairs WHERE identity_ref = ?",
            [identity_ref.as_str()],
        )?;
        Ok(removed > 0)
    }
}

impl SourceStore for SqliteStore {
    fn insert_source(&self, source: &SourceRecord) -> Result<()> {
        let conn = self.lock_conn()?;
        let result = conn.execute(
            &format!(
                "INSERT INTO sources ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                SOURCE_COLUMNS
            ),
            rusqlite::params![
                source.filesystem_id.as_str(),
                source.designation,
                source.pending,
                source.flagged,
                source.starred,
                counter_to_sql(source.interaction_count)?,
                source.created_at.to_rfc3339(),
                source.last_updated.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(TiplineError::InvalidInput(
                    "Source already exists for this codename".to_string(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_source(&self, filesystem_id: &FilesystemId) -> Result<Option<SourceRecord>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM sources WHERE filesystem_id = ?",
            SOURCE_COLUMNS
        );
        let row = conn
            .query_row(&sql, [filesystem_id.as_str()], SourceRow::from_row)
            .optional()?;
        row.map(SourceRecord::try_from).transpose()
    }

    fn delete_source(&self, filesystem_id: &FilesystemId) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM sources WHERE filesystem_id = ?",
            [filesystem_id.as_str()],
        )?;
        Ok(removed > 0)
    }

    #[instrument(skip(self, filesystem_id))]
    fn next_interaction(&self, filesystem_id: &FilesystemId, at: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            r#"
            UPDATE sources
            SET interaction_count = interaction_count + 1, last_updated = ?
            WHERE filesystem_id = ?
            "#,
            rusqlite::params![at.to_rfc3339(), filesystem_id.as_str()],
        )?;
        Self::expect_source(changed, filesystem_id)?;
        let count: i64 = tx.query_row(
            "SELECT interaction_count FROM sources WHERE filesystem_id = ?",
            [filesystem_id.as_str()],
            |row| row.get(0),
        )?;

        tx.commit()?;
        debug!(count, "next interaction");
        u64::try_from(count)
            .map_err(|_| TiplineError::Storage(format!("Negative interaction count: {}", count)))
    }

    fn mark_active(&self, filesystem_id: &FilesystemId) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE sources SET pending = 0 WHERE filesystem_id = ? AND pending = 1",
            [filesystem_id.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn set_flagged(&self, filesystem_id: &FilesystemId, flagged: bool) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE sources SET flagged = ? WHERE filesystem_id = ?",
            rusqlite::params![flagged, filesystem_id.as_str()],
        )?;
        Self::expect_source(changed, filesystem_id)
    }

    fn set_starred(&self, filesystem_id: &FilesystemId, starred: bool) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE sources SET starred = ? WHERE filesystem_id = ?",
            rusqlite::params![starred, filesystem_id.as_str()],
        )?;
        Self::expect_source(changed, filesystem_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::KdfProfile;
    use crate::otp::{OtpMode, OtpSecret};
    use chrono::Duration;

    fn new_journalist(username: &str) -> NewJournalist {
        NewJournalist {
            username: username.to_string(),
            password: PasswordHash {
                salt: vec![1; 32],
                hash: vec![2; 32],
                profile: KdfProfile::Testing,
            },
            otp: OtpState::totp(OtpSecret::from_base32("JBSWY3DPEHPK3PXP").unwrap()),
            is_admin: false,
            created_on: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn fs_id(fill: char) -> FilesystemId {
        FilesystemId::parse(&format!("{}=", fill.to_string().repeat(103))).unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store.insert_journalist(&new_journalist("alice")).unwrap();

        let found = store.find_by_username("alice").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.otp.mode, OtpMode::Totp);
        assert_eq!(found.otp.secret.as_base32(), "JBSWY3DPEHPK3PXP");
        assert_eq!(found.password.hash, vec![2; 32]);
        assert!(store.find_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_journalist(&new_journalist("alice")).unwrap();
        let result = store.insert_journalist(&new_journalist("alice"));
        assert!(matches!(result, Err(TiplineError::InvalidUsername(_))));
    }

    #[test]
    fn test_counter_swap_is_conditional() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store.insert_journalist(&new_journalist("alice")).unwrap();

        let first = CounterAdvance { expected: 0, next: 7 };
        assert!(store.advance_hotp_counter(&created.id, first).unwrap());
        // Same expectation again loses: the counter is already 7.
        assert!(!store.advance_hotp_counter(&created.id, first).unwrap());

        let found = store.get_journalist(&created.id).unwrap().unwrap();
        assert_eq!(found.otp.hotp_counter, 7);
    }

    #[test]
    fn test_attempt_window_counts_only_recent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let alice = store.insert_journalist(&new_journalist("alice")).unwrap();
        let bob = store.insert_journalist(&new_journalist("bob")).unwrap();
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        store
            .record_login_attempt(&alice.id, t0, t0 - Duration::seconds(60))
            .unwrap();
        store
            .record_login_attempt(&bob.id, t0, t0 - Duration::seconds(60))
            .unwrap();

        let later = t0 + Duration::seconds(61);
        let count = store
            .record_login_attempt(&alice.id, later, later - Duration::seconds(60))
            .unwrap();
        assert_eq!(count, 1);

        assert_eq!(store.login_attempts(&alice.id).unwrap().len(), 2);
        assert_eq!(store.prune_login_attempts(t0).unwrap(), 2);
        assert_eq!(store.login_attempts(&alice.id).unwrap().len(), 1);
    }

    #[test]
    fn test_last_access_swap_needs_expected_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        let alice = store.insert_journalist(&new_journalist("alice")).unwrap();
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let t1 = DateTime::from_timestamp(1_700_000_100, 0).unwrap();

        assert!(store.swap_last_access(&alice.id, None, t0).unwrap());
        assert!(!store.swap_last_access(&alice.id, None, t1).unwrap());
        assert!(store.swap_last_access(&alice.id, Some(t0), t1).unwrap());

        let reloaded = store.get_journalist(&alice.id).unwrap().unwrap();
        assert_eq!(reloaded.last_access(), Some(t1));
    }

    #[test]
    fn test_updates_on_missing_journalist_are_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.update_last_access(&Uuid::now_v7(), Utc::now());
        assert!(matches!(result, Err(TiplineError::NotFound(_))));
    }

    #[test]
    fn test_key_pair_overwrite_rules() {
        let store = SqliteStore::open_in_memory().unwrap();
        let pair = StoredKeyPair {
            identity_ref: fs_id('A'),
            public_key: "age1example".to_string(),
            locked_private_key: vec![9; 16],
            created_at: Utc::now(),
        };

        store.put_key_pair(&pair, false).unwrap();
        assert!(matches!(
            store.put_key_pair(&pair, false),
            Err(TiplineError::KeyGeneration(_))
        ));
        store.put_key_pair(&pair, true).unwrap();

        assert!(store.get_key_pair(&pair.identity_ref).unwrap().is_some());
        assert!(store.delete_key_pair(&pair.identity_ref).unwrap());
        assert!(!store.delete_key_pair(&pair.identity_ref).unwrap());
        assert!(store.get_key_pair(&pair.identity_ref).unwrap().is_none());
    }

    #[test]
    fn test_source_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = SourceRecord::new(
            fs_id('B'),
            "brave otter".to_string(),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );

        store.insert_source(&record).unwrap();
        assert!(matches!(
            store.insert_source(&record),
            Err(TiplineError::InvalidInput(_))
        ));
        assert_eq!(store.get_source(&record.filesystem_id).unwrap(), Some(record.clone()));
        assert!(store.delete_source(&record.filesystem_id).unwrap());
        assert!(store.get_source(&record.filesystem_id).unwrap().is_none());
    }

    #[test]
    fn test_source_interactions_and_flags() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let later = DateTime::from_timestamp(1_700_000_600, 0).unwrap();
        let id = fs_id('C');
        store
            .insert_source(&SourceRecord::new(id.clone(), "quiet heron".to_string(), created))
            .unwrap();

        assert_eq!(store.next_interaction(&id, created).unwrap(), 1);
        assert_eq!(store.next_interaction(&id, later).unwrap(), 2);

        assert!(store.mark_active(&id).unwrap());
        assert!(!store.mark_active(&id).unwrap());
        store.set_flagged(&id, true).unwrap();
        store.set_starred(&id, true).unwrap();

        let record = store.get_source(&id).unwrap().unwrap();
        assert_eq!(record.interaction_count, 2);
        assert_eq!(record.last_updated, later);
        assert_eq!(record.created_at, created);
        assert!(!record.pending);
        assert!(record.flagged);
        assert!(record.starred);
    }

    #[test]
    fn test_source_updates_need_a_source() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = fs_id('D');
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert!(matches!(
            store.next_interaction(&id, now),
            Err(TiplineError::NotFound(_))
        ));
        assert!(matches!(
            store.set_flagged(&id, true),
            Err(TiplineError::NotFound(_))
        ));
        assert!(!store.mark_active(&id).unwrap());
    }

    #[test]
    fn test_concurrent_interactions_are_distinct() {
        let store = std::sync::Arc::new(SqliteStore::open_in_memory().unwrap());
        let id = fs_id('E');
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        store
            .insert_source(&SourceRecord::new(id.clone(), "brave heron".to_string(), now))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || store.next_interaction(&id, now).unwrap())
            })
            .collect();
        let mut numbers: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tipline.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_journalist(&new_journalist("alice")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.find_by_username("alice").unwrap().is_some());
    }
}
