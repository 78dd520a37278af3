//! Opaque session tokens bridging verified identities and request handling.
//!
//! A token is 32 random bytes, hex-encoded, revealed to the caller exactly
//! once; the store only ever sees its SHA-256 hash. The stored payload is
//! the serialized [`SessionReference`] and nothing else — credential
//! material never crosses into session storage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::TryRngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;
use crate::identity::SessionReference;
use crate::store::epoch_secs;

/// Token byte length before hex encoding (32 bytes = 64 hex chars).
const TOKEN_BYTES: usize = 32;

/// Default session duration: 30 days (seconds).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 24 * 3600;

/// Opaque key-value contract for serialized session references.
///
/// Keys are token hashes; the store never sees a plaintext token and never
/// interprets the payload.
pub trait SessionStore: Send + Sync {
    fn put(
        &self,
        token_hash: &str,
        payload: &str,
        created_at: u64,
        expires_at: u64,
    ) -> anyhow::Result<()>;

    /// Fetch an unexpired payload.
    fn fetch(&self, token_hash: &str, now: u64) -> anyhow::Result<Option<String>>;

    fn remove(&self, token_hash: &str) -> anyhow::Result<bool>;

    /// Drop expired entries, returning how many were removed.
    fn purge_expired(&self, now: u64) -> anyhow::Result<u64>;
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    /// token_hash -> (payload, expires_at)
    entries: RwLock<HashMap<String, (String, u64)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(
        &self,
        token_hash: &str,
        payload: &str,
        _created_at: u64,
        expires_at: u64,
    ) -> anyhow::Result<()> {
        self.entries
            .write()
            .insert(token_hash.to_string(), (payload.to_string(), expires_at));
        Ok(())
    }

    fn fetch(&self, token_hash: &str, now: u64) -> anyhow::Result<Option<String>> {
        Ok(self
            .entries
            .read()
            .get(token_hash)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(payload, _)| payload.clone()))
    }

    fn remove(&self, token_hash: &str) -> anyhow::Result<bool> {
        Ok(self.entries.write().remove(token_hash).is_some())
    }

    fn purge_expired(&self, now: u64) -> anyhow::Result<u64> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

/// Issues, resolves, and revokes session tokens against an injected store.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl_secs: u64,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, ttl_secs: Option<u64>) -> Self {
        Self {
            store,
            ttl_secs: ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS),
        }
    }

    /// Issue a token for a session reference.
    /// Returns the plaintext token (only revealed once).
    pub fn issue(&self, reference: &SessionReference) -> Result<String, AuthError> {
        let token = generate_token()?;
        let token_hash = hash_token(&token);
        let payload = serde_json::to_string(reference)
            .map_err(|e| AuthError::Store(anyhow::anyhow!("session reference encoding: {e}")))?;
        let now = epoch_secs();
        self.store
            .put(&token_hash, &payload, now, now + self.ttl_secs)
            .map_err(AuthError::Store)?;
        tracing::debug!(user_id = %reference.user_id, "session issued");
        Ok(token)
    }

    /// Resolve a token back to its session reference.
    ///
    /// `Ok(None)` for unknown, expired, or undecodable entries — all of
    /// which mean "not authenticated", never an error.
    pub fn resolve(&self, token: &str) -> Result<Option<SessionReference>, AuthError> {
        let token_hash = hash_token(token);
        let Some(payload) = self
            .store
            .fetch(&token_hash, epoch_secs())
            .map_err(AuthError::Store)?
        else {
            return Ok(None);
        };
        match serde_json::from_str::<SessionReference>(&payload) {
            Ok(reference) => Ok(Some(reference)),
            Err(e) => {
                tracing::warn!(error = %e, "undecodable session payload, treating as unauthenticated");
                Ok(None)
            }
        }
    }

    /// Revoke a token (logout). A pure state transition: the entry is
    /// discarded and the credential hasher is never involved.
    pub fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        self.store
            .remove(&hash_token(token))
            .map_err(AuthError::Store)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<u64, AuthError> {
        self.store
            .purge_expired(epoch_secs())
            .map_err(AuthError::Store)
    }
}

/// Generate a random session token (hex-encoded).
fn generate_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::Entropy(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Hash a session token (SHA-256, single pass — tokens are already
/// high-entropy).
fn hash_token(token: &str) -> String {
    let mut h = Sha256::new();
    h.update(token.as_bytes());
    hex::encode(h.finalize())
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SESSION_REF_VERSION;

    fn reference(user_id: &str) -> SessionReference {
        SessionReference {
            version: SESSION_REF_VERSION,
            user_id: user_id.to_string(),
        }
    }

    fn manager(ttl_secs: u64) -> (Arc<MemorySessionStore>, SessionManager) {
        let store = Arc::new(MemorySessionStore::new());
        let manager = SessionManager::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Some(ttl_secs),
        );
        (store, manager)
    }

    #[test]
    fn issue_then_resolve_round_trip() {
        let (_store, manager) = manager(3600);
        let token = manager.issue(&reference("user-1")).unwrap();
        assert_eq!(token.len(), TOKEN_BYTES * 2);

        let resolved = manager.resolve(&token).unwrap();
        assert_eq!(resolved, Some(reference("user-1")));
    }

    #[test]
    fn tokens_are_unique_per_issue() {
        let (_store, manager) = manager(3600);
        let t1 = manager.issue(&reference("user-1")).unwrap();
        let t2 = manager.issue(&reference("user-1")).unwrap();
        assert_ne!(t1, t2);
        assert!(manager.resolve(&t1).unwrap().is_some());
        assert!(manager.resolve(&t2).unwrap().is_some());
    }

    #[test]
    fn unknown_token_resolves_to_none() {
        let (_store, manager) = manager(3600);
        assert_eq!(manager.resolve("not-a-real-token").unwrap(), None);
    }

    #[test]
    fn revoke_is_logout() {
        let (_store, manager) = manager(3600);
        let token = manager.issue(&reference("user-1")).unwrap();

        assert!(manager.resolve(&token).unwrap().is_some());
        assert!(manager.revoke(&token).unwrap());
        assert_eq!(manager.resolve(&token).unwrap(), None);
        assert!(!manager.revoke(&token).unwrap());
    }

    #[test]
    fn zero_ttl_sessions_are_born_expired() {
        let (_store, manager) = manager(0);
        let token = manager.issue(&reference("user-1")).unwrap();
        assert_eq!(manager.resolve(&token).unwrap(), None);
        assert_eq!(manager.purge_expired().unwrap(), 1);
    }

    #[test]
    fn undecodable_payload_is_unauthenticated() {
        let (store, manager) = manager(3600);
        let token = manager.issue(&reference("user-1")).unwrap();
        let token_hash = hash_token(&token);

        // Simulate a corrupted store entry.
        let now = epoch_secs();
        store.put(&token_hash, "not json", now, now + 3600).unwrap();
        assert_eq!(manager.resolve(&token).unwrap(), None);
    }

    #[test]
    fn full_login_cycle_against_sqlite() {
        use crate::credential::KdfParams;
        use crate::identity::{AuthOutcome, Broker};
        use crate::store::SqliteStore;

        let tmp = tempfile::TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(&tmp.path().join("auth.db")).unwrap());
        let params = KdfParams {
            iterations: 1_000,
            ..KdfParams::default()
        };
        let broker = Broker::new(Arc::clone(&store) as _, params);
        let sessions = SessionManager::new(Arc::clone(&store) as _, Some(3600));

        // Anonymous -> Authenticated
        broker.register_blocking("alice", "correct-horse").unwrap();
        let outcome = broker
            .authenticate_blocking("alice", "correct-horse")
            .unwrap();
        let AuthOutcome::Authenticated(identity) = outcome else {
            panic!("expected authenticated outcome");
        };

        // Identity crosses into the session layer as a reference only.
        let token = sessions.issue(&broker.serialize_identity(&identity)).unwrap();

        // Subsequent request: token -> reference -> identity.
        let restored = sessions.resolve(&token).unwrap().unwrap();
        let resolved = broker.resolve_identity(&restored).unwrap().unwrap();
        assert_eq!(resolved, identity);

        // Logout -> Anonymous.
        assert!(sessions.revoke(&token).unwrap());
        assert_eq!(sessions.resolve(&token).unwrap(), None);
    }

    #[test]
    fn store_only_sees_hashed_tokens() {
        let (store, manager) = manager(3600);
        let token = manager.issue(&reference("user-1")).unwrap();
        assert!(store.fetch(&token, epoch_secs()).unwrap().is_none());
        assert!(store
            .fetch(&hash_token(&token), epoch_secs())
            .unwrap()
            .is_some());
    }
}
