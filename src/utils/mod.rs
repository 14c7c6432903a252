mod hashing;

pub use hashing::{hash_secret, verify_secret, Secret, SecretHash};
