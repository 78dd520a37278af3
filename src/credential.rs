//! One-way password credential derivation and verification.
//!
//! Passwords are stretched with PBKDF2-HMAC-SHA512 over a per-credential
//! random salt. The derivation parameters travel with every stored
//! credential, so records hashed under an older work factor keep verifying
//! after the default is raised.

use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha512;

use crate::error::AuthError;

/// Salt byte length (hex-encoded to twice this many characters).
pub const SALT_BYTES: usize = 16;

/// Default PBKDF2 iteration count (v1 work factor).
pub const DEFAULT_ITERATIONS: u32 = 210_000;

/// Default derived-key length in bytes.
pub const DEFAULT_OUTPUT_LEN: usize = 64;

/// Key-derivation primitive. A stronger scheme gets a new variant; records
/// hashed under an old one keep verifying under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfScheme {
    Pbkdf2HmacSha512,
}

/// Full derivation parameters, persisted alongside each hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub scheme: KdfScheme,
    pub iterations: u32,
    pub output_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            scheme: KdfScheme::Pbkdf2HmacSha512,
            iterations: DEFAULT_ITERATIONS,
            output_len: DEFAULT_OUTPUT_LEN,
        }
    }
}

/// A derived credential as it is persisted: parameters, salt, hash.
/// Holds no plaintext and cannot be inverted to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub params: KdfParams,
    /// Hex-encoded random salt, unique per credential.
    pub salt: String,
    /// Hex-encoded derived key.
    pub hash: String,
}

/// Derive a fresh credential for `password` under `params`.
///
/// The salt comes from the OS CSPRNG; if that source fails the whole
/// operation fails with [`AuthError::Entropy`].
pub fn generate(password: &str, params: &KdfParams) -> Result<StoredCredential, AuthError> {
    if password.is_empty() {
        return Err(AuthError::Validation("password cannot be empty".into()));
    }
    let mut salt = [0u8; SALT_BYTES];
    rand::rngs::OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| AuthError::Entropy(e.to_string()))?;
    let hash = derive(password, &salt, params);
    Ok(StoredCredential {
        params: *params,
        salt: hex::encode(salt),
        hash: hex::encode(hash),
    })
}

/// Check `password` against a stored credential.
///
/// Re-derives with the credential's own stored parameters and compares in
/// constant time, so execution time does not depend on where the hashes
/// first differ. Deterministic; no side effects.
pub fn verify(password: &str, stored: &StoredCredential) -> bool {
    let Ok(salt) = hex::decode(&stored.salt) else {
        return false;
    };
    let Ok(expected) = hex::decode(&stored.hash) else {
        return false;
    };
    let candidate = derive(password, &salt, &stored.params);
    constant_time_eq(&candidate, &expected)
}

/// Burn the same derivation work as a real verification, against a fixed
/// salt. Keeps unknown-username rejections timing-equivalent to
/// wrong-password rejections.
pub(crate) fn dummy_verify(password: &str, params: &KdfParams) {
    let _ = derive(password, &[0u8; SALT_BYTES], params);
}

fn derive(password: &str, salt: &[u8], params: &KdfParams) -> Vec<u8> {
    let mut out = vec![0u8; params.output_len];
    match params.scheme {
        KdfScheme::Pbkdf2HmacSha512 => {
            pbkdf2::pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, params.iterations, &mut out);
        }
    }
    out
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Tests ───────────────────────────────────────────────────────────
