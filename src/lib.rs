//! Session-authentication core.
//!
//! Provides:
//! - Credential hashing (PBKDF2-HMAC-SHA512, per-credential random salt,
//!   derivation parameters stored alongside every hash so the work factor
//!   can be raised without breaking old records)
//! - A [`Broker`] that authenticates against a pluggable [`CredentialStore`]
//!   and maps verified identities to version-tagged [`SessionReference`]s
//! - Opaque session tokens (random hex, SHA-256 hashed at rest,
//!   time-limited) via [`SessionManager`]
//!
//! ## Design Decisions
//! - An authentication attempt yields a tagged [`AuthOutcome`], never an
//!   error: wrong password and unknown username are expected outcomes and
//!   must stay distinguishable from a store outage. The two rejection
//!   causes are indistinguishable to callers (anti-enumeration).
//! - Hash comparison is constant-time; unknown-username rejections burn a
//!   dummy derivation so their timing matches wrong-password rejections.
//! - Collaborators arrive by injection; the crate reads no global state.
//! - Key derivation is deliberately slow, so the broker's async facades run
//!   it on the tokio blocking pool.

pub mod credential;
pub mod error;
pub mod identity;
pub mod session;
pub mod store;

pub use credential::{KdfParams, KdfScheme, StoredCredential};
pub use error::{AuthError, StoreError};
pub use identity::{AuthOutcome, Broker, Identity, SessionReference};
pub use session::{MemorySessionStore, SessionManager, SessionStore};
pub use store::{
    CredentialRecord, CredentialStore, MemoryStore, NewCredentialRecord, SqliteStore,
};
