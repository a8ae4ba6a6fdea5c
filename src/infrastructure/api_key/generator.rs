//! API key generation
//!
//! Keys have three parts: `mcpd_<key_id>_<secret>`. The key id is a public
//! lookup handle; the secret is shown exactly once at issue time and only its
//! hash is stored.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Fixed scheme prefix for all keys
pub const KEY_PREFIX: &str = "mcpd";

const KEY_ID_BYTES: usize = 16;
const SECRET_BYTES: usize = 32;

/// Result of generating a new API key
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// The full key (only shown once at creation)
    pub key: String,
    /// The public key id embedded in the key
    pub key_id: String,
    /// The hashed key for storage
    pub hash: String,
}

/// Generator for secure API keys
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGenerator;

impl ApiKeyGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a new API key
    pub fn generate(&self) -> GeneratedApiKey {
        let mut id_bytes = [0u8; KEY_ID_BYTES];
        let mut secret_bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut id_bytes);
        rand::thread_rng().fill_bytes(&mut secret_bytes);

        // The id must stay free of '_' so the key splits unambiguously
        let key_id = URL_SAFE_NO_PAD.encode(id_bytes).replace('_', "-");
        let secret = URL_SAFE_NO_PAD.encode(secret_bytes);

        let key = format!("{}_{}_{}", KEY_PREFIX, key_id, secret);
        let hash = self.hash_key(&key);

        GeneratedApiKey { key, key_id, hash }
    }

    /// Build a key from known parts, for deterministic integration tests
    pub fn from_parts(&self, key_id: &str, secret: &str) -> GeneratedApiKey {
        let key = format!("{}_{}_{}", KEY_PREFIX, key_id, secret);
        let hash = self.hash_key(&key);

        GeneratedApiKey {
            key,
            key_id: key_id.to_string(),
            hash,
        }
    }

    /// Hash a full API key for storage
    pub fn hash_key(&self, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let result = hasher.finalize();
        format!("sha256${}", URL_SAFE_NO_PAD.encode(result))
    }

    /// Verify a presented key against a stored hash
    pub fn verify_key(&self, key: &str, stored_hash: &str) -> bool {
        let computed_hash = self.hash_key(key);
        constant_time_compare(&computed_hash, stored_hash)
    }

    /// Extract the public key id from a presented key.
    ///
    /// Returns `None` when the key does not follow the three-part format.
    pub fn extract_key_id(key: &str) -> Option<&str> {
        let rest = key.strip_prefix(KEY_PREFIX)?.strip_prefix('_')?;

        let (key_id, secret) = rest.split_once('_')?;
        if key_id.is_empty() || secret.is_empty() {
            return None;
        }

        Some(key_id)
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut result = 0u8;

    for i in 0..a.len() {
        result |= a_bytes[i] ^ b_bytes[i];
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key() {
        let generator = ApiKeyGenerator::new();
        let generated = generator.generate();

        assert!(generated.key.starts_with("mcpd_"));
        assert!(generated.hash.starts_with("sha256$"));
        assert!(!generated.key_id.contains('_'));
        // 16 bytes base64-encoded = 22 chars
        assert_eq!(generated.key_id.len(), 22);
    }

    #[test]
    fn test_key_uniqueness() {
        let generator = ApiKeyGenerator::new();
        let key1 = generator.generate();
        let key2 = generator.generate();

        assert_ne!(key1.key, key2.key);
        assert_ne!(key1.key_id, key2.key_id);
        assert_ne!(key1.hash, key2.hash);
    }

    #[test]
    fn test_verify_key() {
        let generator = ApiKeyGenerator::new();
        let generated = generator.generate();

        assert!(generator.verify_key(&generated.key, &generated.hash));
        assert!(!generator.verify_key("mcpd_wrong_key", &generated.hash));
    }

    #[test]
    fn test_hash_deterministic() {
        let generator = ApiKeyGenerator::new();
        let key = "mcpd_abc123_secret456";

        assert_eq!(generator.hash_key(key), generator.hash_key(key));
    }

    #[test]
    fn test_extract_key_id() {
        assert_eq!(
            ApiKeyGenerator::extract_key_id("mcpd_Zk3mPqw9_s3cr3t-value"),
            Some("Zk3mPqw9")
        );
        // Secret may contain underscores; split stops at the first one
        assert_eq!(
            ApiKeyGenerator::extract_key_id("mcpd_abc_sec_ret"),
            Some("abc")
        );
        assert_eq!(ApiKeyGenerator::extract_key_id("mcpd_onlyid"), None);
        assert_eq!(ApiKeyGenerator::extract_key_id("mcpd__secret"), None);
        assert_eq!(ApiKeyGenerator::extract_key_id("other_abc_def"), None);
        assert_eq!(ApiKeyGenerator::extract_key_id("garbage"), None);
    }

    #[test]
    fn test_extracted_id_round_trip() {
        let generator = ApiKeyGenerator::new();
        let generated = generator.generate();

        assert_eq!(
            ApiKeyGenerator::extract_key_id(&generated.key),
            Some(generated.key_id.as_str())
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
