//! SQLite-backed credential and session storage.
//!
//! Tables:
//! - `users`: id, username, kdf_params, salt, password_hash, created_at
//! - `sessions`: token_hash, reference, created_at, expires_at
//!
//! The unique-username constraint is enforced by SQLite itself, so two
//! concurrent registrations resolve deterministically: one row lands, the
//! other insert fails with a constraint violation.

use std::path::Path;

use parking_lot::Mutex;

use super::{CredentialRecord, CredentialStore, NewCredentialRecord};
use crate::credential::{KdfParams, StoredCredential};
use crate::error::StoreError;
use crate::session::SessionStore;

/// SQLite-backed store for credential records and session entries.
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        let conn = rusqlite::Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                kdf_params TEXT NOT NULL,
                salt TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                reference TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn record_from_row(
        id: String,
        username: String,
        params_json: &str,
        salt: String,
        hash: String,
        created_at: i64,
    ) -> Result<CredentialRecord, StoreError> {
        let params: KdfParams = serde_json::from_str(params_json)
            .map_err(|e| anyhow::anyhow!("corrupt kdf_params for user {id}: {e}"))?;
        Ok(CredentialRecord {
            id,
            username,
            credential: StoredCredential { params, salt, hash },
            created_at,
        })
    }
}

impl CredentialStore for SqliteStore {
    fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let conn = self.conn.lock();
        let row: Result<(String, String, String, String, i64), _> = conn.query_row(
            "SELECT id, kdf_params, salt, password_hash, created_at
             FROM users WHERE username = ?1",
            rusqlite::params![username],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        );

        match row {
            Ok((id, params_json, salt, hash, created_at)) => Ok(Some(Self::record_from_row(
                id,
                username.to_string(),
                &params_json,
                salt,
                hash,
                created_at,
            )?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Backend(e.into())),
        }
    }

    fn find_by_id(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let conn = self.conn.lock();
        let row: Result<(String, String, String, String, i64), _> = conn.query_row(
            "SELECT username, kdf_params, salt, password_hash, created_at
             FROM users WHERE id = ?1",
            rusqlite::params![id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        );

        match row {
            Ok((username, params_json, salt, hash, created_at)) => Ok(Some(
                Self::record_from_row(id.to_string(), username, &params_json, salt, hash, created_at)?,
            )),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Backend(e.into())),
        }
    }

    fn insert(&self, new: NewCredentialRecord) -> Result<CredentialRecord, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = super::epoch_secs() as i64;
        let params_json = serde_json::to_string(&new.credential.params)
            .map_err(|e| anyhow::anyhow!("kdf_params encoding failed: {e}"))?;

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (id, username, kdf_params, salt, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                id,
                new.username,
                params_json,
                new.credential.salt,
                new.credential.hash,
                created_at,
            ],
        );

        match result {
            Ok(_) => Ok(CredentialRecord {
                id,
                username: new.username,
                credential: new.credential,
                created_at,
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateUsername)
            }
            Err(e) => Err(StoreError::Backend(e.into())),
        }
    }
}

impl SessionStore for SqliteStore {
    fn put(
        &self,
        token_hash: &str,
        payload: &str,
        created_at: u64,
        expires_at: u64,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO sessions (token_hash, reference, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![token_hash, payload, created_at as i64, expires_at as i64],
        )?;
        Ok(())
    }

    fn fetch(&self, token_hash: &str, now: u64) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock();
        let row: Result<String, _> = conn.query_row(
            "SELECT reference FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
            rusqlite::params![token_hash, now as i64],
            |row| row.get(0),
        );

        match row {
            Ok(payload) => Ok(Some(payload)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, token_hash: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            rusqlite::params![token_hash],
        )?;
        Ok(deleted > 0)
    }

    fn purge_expired(&self, now: u64) -> anyhow::Result<u64> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            rusqlite::params![now as i64],
        )?;
        Ok(deleted as u64)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
