//! In-memory credential store.
//!
//! Registration runs under the write lock, so concurrent inserts of the
//! same username serialize: the first wins, the second sees a duplicate.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{CredentialRecord, CredentialStore, NewCredentialRecord};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, CredentialRecord>,
    /// username -> record id (usernames are case-sensitive).
    by_username: HashMap<String, String>,
}

/// Process-local credential store backed by a `parking_lot::RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete a record by id. Returns whether a record was removed.
    ///
    /// Account deletion is external to the auth core; this exists so
    /// embedders and tests can model a deleted account whose session
    /// reference must stop resolving.
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.by_id.remove(id) {
            Some(record) => {
                inner.by_username.remove(&record.username);
                true
            }
            None => false,
        }
    }
}

impl CredentialStore for MemoryStore {
    fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .by_username
            .get(username)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.inner.read().by_id.get(id).cloned())
    }

    fn insert(&self, new: NewCredentialRecord) -> Result<CredentialRecord, StoreError> {
        let mut inner = self.inner.write();
        if inner.by_username.contains_key(&new.username) {
            return Err(StoreError::DuplicateUsername);
        }
        let record = CredentialRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: new.username,
            credential: new.credential,
            created_at: super::epoch_secs() as i64,
        };
        inner
            .by_username
            .insert(record.username.clone(), record.id.clone());
        inner.by_id.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::credential::{KdfParams, StoredCredential};

    fn test_credential() -> StoredCredential {
        StoredCredential {
            params: KdfParams::default(),
            salt: "00".repeat(16),
            hash: "ab".repeat(64),
        }
    }

    fn new_record(username: &str) -> NewCredentialRecord {
        NewCredentialRecord {
            username: username.to_string(),
            credential: test_credential(),
        }
    }

    #[test]
    fn insert_and_find() {
        let store = MemoryStore::new();
        let record = store.insert(new_record("alice")).unwrap();
        assert!(!record.id.is_empty());

        let by_name = store.find_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name, record);

        let by_id = store.find_by_id(&record.id).unwrap().unwrap();
        assert_eq!(by_id, record);
    }

    #[test]
    fn duplicate_username_rejected() {
        let store = MemoryStore::new();
        store.insert(new_record("alice")).unwrap();
        let err = store.insert(new_record("alice")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let store = MemoryStore::new();
        store.insert(new_record("Alice")).unwrap();
        store.insert(new_record("alice")).unwrap();
        assert!(store.find_by_username("Alice").unwrap().is_some());
        assert!(store.find_by_username("alice").unwrap().is_some());
        assert!(store.find_by_username("ALICE").unwrap().is_none());
    }

    #[test]
    fn concurrent_inserts_have_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.insert(new_record("carol")))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::DuplicateUsername)))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(duplicates, 1);
    }

    #[test]
    fn remove_drops_both_indexes() {
        let store = MemoryStore::new();
        let record = store.insert(new_record("alice")).unwrap();

        assert!(store.remove(&record.id));
        assert!(store.find_by_id(&record.id).unwrap().is_none());
        assert!(store.find_by_username("alice").unwrap().is_none());
        assert!(!store.remove(&record.id));
    }

    #[test]
    fn find_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.find_by_username("ghost").unwrap().is_none());
        assert!(store.find_by_id("no-such-id").unwrap().is_none());
    }
}
