//! Credential persistence boundary.
//!
//! The core never owns user records; it talks to a [`CredentialStore`]
//! injected at construction. Two implementations ship: an in-memory store
//! for tests and embedding, and a SQLite-backed one.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::credential::StoredCredential;
use crate::error::StoreError;
use crate::identity::Identity;

/// A persisted credential record: identity fields plus derived material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: String,
    pub username: String,
    pub credential: StoredCredential,
    pub created_at: i64,
}

impl CredentialRecord {
    /// Project the identity view: everything except credential material.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }
}

/// A record as submitted for insertion; the store mints the id.
#[derive(Debug, Clone)]
pub struct NewCredentialRecord {
    pub username: String,
    pub credential: StoredCredential,
}

/// Storage contract for credential records.
///
/// Usernames are unique and case-sensitive. Implementations must resolve
/// concurrent inserts of the same username deterministically: exactly one
/// succeeds, the other gets [`StoreError::DuplicateUsername`].
pub trait CredentialStore: Send + Sync {
    fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError>;
    fn find_by_id(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError>;
    fn insert(&self, new: NewCredentialRecord) -> Result<CredentialRecord, StoreError>;
}

/// Current Unix epoch in seconds.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
