//! API key codec: generation, hashing and verification of opaque bearer
//! credentials with a visible lookup prefix.
//!
//! Key format: `sk_` + 43 base64url characters (256 bits of entropy). The
//! visible prefix is the tag plus the first 8 encoded characters; it is
//! selective enough for an indexed unique lookup while revealing nothing
//! about the remaining secret.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

use crate::utils::{hash_secret, verify_secret, Secret, SecretHash};

/// Constant tag marking a bearer value as an API key, so the authenticator
/// can classify credentials without a database round-trip.
pub const KEY_TAG: &str = "sk_";

const SECRET_BYTES: usize = 32;
const VISIBLE_CHARS: usize = 8;

/// A freshly generated key. `secret` is handed to the caller exactly once;
/// only its hash and `prefix` are ever persisted.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub secret: String,
    pub prefix: String,
}

/// Generate a new API key from OS randomness.
pub fn generate() -> GeneratedKey {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let secret = format!("{}{}", KEY_TAG, URL_SAFE_NO_PAD.encode(bytes));
    let prefix = secret[..KEY_TAG.len() + VISIBLE_CHARS].to_string();

    GeneratedKey { secret, prefix }
}

/// Cheap classification check: does this bearer value look like an API key?
pub fn is_api_key(bearer: &str) -> bool {
    bearer.starts_with(KEY_TAG)
}

/// The visible prefix of a presented secret, used for the indexed lookup.
/// Returns None for values too short to be a key.
pub fn visible_prefix(secret: &str) -> Option<&str> {
    let len = KEY_TAG.len() + VISIBLE_CHARS;
    if !secret.starts_with(KEY_TAG) {
        return None;
    }
    secret.get(..len)
}

/// Hash the full secret for persistence (Argon2id, salted).
pub fn hash_key(secret: &str) -> Result<String, anyhow::Error> {
    Ok(hash_secret(&Secret::new(secret.to_string()))?.into_string())
}

/// Verify a presented secret against a stored hash via the hashing
/// primitive's own comparison.
pub fn verify_key(secret: &str, stored_hash: &str) -> bool {
    verify_secret(
        &Secret::new(secret.to_string()),
        &SecretHash::new(stored_hash.to_string()),
    )
    .is_ok()
}
