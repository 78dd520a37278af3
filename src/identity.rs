//! Session identity brokering.
//!
//! The broker is the single owner of the login decision: it looks a user up
//! in the injected [`CredentialStore`], verifies the password, and reports a
//! tagged [`AuthOutcome`]. It is also the only layer allowed to turn an
//! absent lookup into `Rejected`; store failures always propagate as errors
//! so an outage can never masquerade as a wrong password.
//!
//! Verified identities cross into the session layer only as a
//! [`SessionReference`] — the record id plus a schema version, never any
//! credential material.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::credential::{self, KdfParams};
use crate::error::AuthError;
use crate::store::{CredentialStore, NewCredentialRecord};

/// Current session reference schema version.
pub const SESSION_REF_VERSION: u16 = 1;

/// Maximum accepted username length.
const MAX_USERNAME_LEN: usize = 64;

/// Minimum accepted password length at registration.
const MIN_PASSWORD_LEN: usize = 8;

/// A verified principal. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub created_at: i64,
}

/// Minimal, version-tagged pointer to an identity, fit for session storage.
///
/// Sufficient to re-fetch the exact credential record and nothing more; the
/// version tag allows the session schema to migrate without breaking old
/// entries silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReference {
    pub version: u16,
    pub user_id: String,
}

/// Outcome of an authentication attempt.
///
/// Unknown username and wrong password both surface as `Rejected`, and the
/// two are indistinguishable to the caller. Infrastructure failure is an
/// [`AuthError`], never an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Identity),
    Rejected,
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Rejected => None,
        }
    }
}

/// Session identity broker. Collaborators and hashing parameters are
/// injected at construction; the broker reads no ambient state.
#[derive(Clone)]
pub struct Broker {
    store: Arc<dyn CredentialStore>,
    params: KdfParams,
}

impl Broker {
    pub fn new(store: Arc<dyn CredentialStore>, params: KdfParams) -> Self {
        Self { store, params }
    }

    /// Register a new user and return the stored identity.
    ///
    /// CPU-bound (runs the key derivation); inside an async context prefer
    /// [`Broker::register`].
    pub fn register_blocking(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("username cannot be empty".into()));
        }
        if username.len() > MAX_USERNAME_LEN {
            return Err(AuthError::Validation(
                "username too long (max 64 characters)".into(),
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(
                "password must be at least 8 characters".into(),
            ));
        }

        let cred = credential::generate(password, &self.params)?;
        let record = self.store.insert(NewCredentialRecord {
            username: username.to_string(),
            credential: cred,
        })?;
        tracing::info!(user_id = %record.id, username = %record.username, "user registered");
        Ok(record.identity())
    }

    /// Authenticate a username/password pair.
    ///
    /// Unknown username and wrong password both return `Rejected`; the
    /// unknown-username path burns an equivalent derivation so it is not
    /// observably faster. Store failures propagate as [`AuthError::Store`].
    pub fn authenticate_blocking(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Ok(AuthOutcome::Rejected);
        }

        match self.store.find_by_username(username.trim())? {
            Some(record) => {
                if credential::verify(password, &record.credential) {
                    tracing::info!(user_id = %record.id, "login accepted");
                    Ok(AuthOutcome::Authenticated(record.identity()))
                } else {
                    tracing::debug!(user_id = %record.id, "login rejected: password mismatch");
                    Ok(AuthOutcome::Rejected)
                }
            }
            None => {
                credential::dummy_verify(password, &self.params);
                tracing::debug!("login rejected: unknown username");
                Ok(AuthOutcome::Rejected)
            }
        }
    }

    /// Async facade for [`Broker::register_blocking`]; the derivation runs
    /// on the blocking pool.
    pub async fn register(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let broker = self.clone();
        let (username, password) = (username.to_string(), password.to_string());
        tokio::task::spawn_blocking(move || broker.register_blocking(&username, &password))
            .await
            .map_err(|e| AuthError::Store(anyhow::anyhow!("auth task failed: {e}")))?
    }

    /// Async facade for [`Broker::authenticate_blocking`]; the derivation
    /// runs on the blocking pool so one login cannot stall the event loop.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let broker = self.clone();
        let (username, password) = (username.to_string(), password.to_string());
        tokio::task::spawn_blocking(move || broker.authenticate_blocking(&username, &password))
            .await
            .map_err(|e| AuthError::Store(anyhow::anyhow!("auth task failed: {e}")))?
    }

    /// Produce the session-storable reference for a verified identity.
    /// Pure and total: the record id plus the current schema version.
    pub fn serialize_identity(&self, identity: &Identity) -> SessionReference {
        SessionReference {
            version: SESSION_REF_VERSION,
            user_id: identity.id.clone(),
        }
    }

    /// Resolve a stored reference back to a full identity.
    ///
    /// `Ok(None)` means "no longer authenticated" — a deleted account or a
    /// reference from an unknown schema version — not an error. Store
    /// failures propagate.
    pub fn resolve_identity(
        &self,
        reference: &SessionReference,
    ) -> Result<Option<Identity>, AuthError> {
        if reference.version != SESSION_REF_VERSION {
            tracing::warn!(
                version = reference.version,
                "session reference from unknown schema version"
            );
            return Ok(None);
        }
        Ok(self
            .store
            .find_by_id(&reference.user_id)?
            .map(|record| record.identity()))
    }
}

// ── Tests ───────────────────────────────────────────────────────────
