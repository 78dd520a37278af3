//! Error taxonomy for the authentication core.
//!
//! Authentication outcomes (wrong password, unknown user) are not errors;
//! they surface as a `Rejected` outcome. The variants here are the cases a
//! caller must handle differently: bad input, a registration collision, and
//! infrastructure failure. Plaintext passwords never appear in any variant.

use thiserror::Error;

/// Failure modes of the credential hasher and session identity broker.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed caller input (empty password, oversized username, ...).
    #[error("invalid input: {0}")]
    Validation(String),

    /// Registration collided with an existing username.
    #[error("username is already taken")]
    DuplicateUsername,

    /// The OS secure random source failed. Fatal: the operation aborts
    /// rather than fall back to a weaker source.
    #[error("secure random source unavailable: {0}")]
    Entropy(String),

    /// The credential or session store is unavailable. Never downgraded to
    /// a rejected login: an outage must stay distinguishable from a wrong
    /// password.
    #[error("auth store failure: {0}")]
    Store(#[source] anyhow::Error),
}

/// Failure at the persistence boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-username constraint violated. Exactly one of two concurrent
    /// inserts with the same username gets this.
    #[error("username is already taken")]
    DuplicateUsername,

    /// Backend unavailable or corrupt.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            StoreError::Backend(e) => AuthError::Store(e),
        }
    }
}
