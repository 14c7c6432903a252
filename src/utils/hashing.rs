//! Argon2 hashing, shared by the password and API-key paths. Both kinds of
//! credential persist only a PHC-format hash string.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Plaintext credential material. Debug output redacts the value, so a
/// stray `{:?}` cannot put it in a log line.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: String) -> Self {
        Self(secret)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// A PHC-format Argon2 hash string, the only credential form that is ever
/// persisted.
#[derive(Debug, Clone)]
pub struct SecretHash(String);

impl SecretHash {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Argon2id with a fresh OS-random salt per call; the salt travels inside
/// the PHC string. The work factor keeps offline brute force of a leaked
/// hash expensive.
pub fn hash_secret(secret: &Secret) -> Result<SecretHash, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(secret.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash secret: {}", e))?
        .to_string();

    Ok(SecretHash::new(hash))
}

/// Check a presented secret against a stored hash. The comparison runs
/// inside the Argon2 verifier; string equality on secrets or hashes is
/// never used.
pub fn verify_secret(secret: &Secret, hash: &SecretHash) -> Result<(), anyhow::Error> {
    let parsed = PasswordHash::new(hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid secret hash format: {}", e))?;

    Argon2::default()
        .verify_password(secret.as_str().as_bytes(), &parsed)
        .map_err(|_| anyhow::anyhow!("Secret verification failed"))
}
