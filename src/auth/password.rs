use sha2::{Digest, Sha256};

/// Unsalted SHA-256 password digests keyed by the process-wide secret.
///
/// `digest = hex(sha256(secret || password))`. There is no per-user salt:
/// stored `*_HASHED_PASSWORD` values depend on this exact layout, so changing
/// it invalidates every configured credential.
#[derive(Clone)]
pub struct PasswordHasher {
    secret: String,
}

impl PasswordHasher {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hash a plaintext password into its stored form.
    pub fn hash(&self, plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(plaintext.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Recompute the digest for `plaintext` and compare it with `stored`.
    pub fn verify(&self, plaintext: &str, stored: &str) -> bool {
        constant_time_eq(self.hash(plaintext).as_bytes(), stored.as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
