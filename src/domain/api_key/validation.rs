//! Syntactic validation of API key material
//!
//! The gate rejects malformed key material here, before any store lookup.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Maximum length of a presented API key, including the prefix.
pub const MAX_KEY_LENGTH: usize = 128;

/// Maximum length of a key identifier.
pub const MAX_KEY_ID_LENGTH: usize = 64;

static KEY_MATERIAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

static KEY_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("valid regex"));

/// Validation errors for API key material
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiKeyValidationError {
    #[error("API key is empty")]
    Empty,

    #[error("API key exceeds {MAX_KEY_LENGTH} characters")]
    TooLong,

    #[error("API key contains invalid characters")]
    InvalidCharacters,

    #[error("API key identifier is empty")]
    EmptyId,

    #[error("API key identifier exceeds {MAX_KEY_ID_LENGTH} characters")]
    IdTooLong,

    #[error("API key identifier contains invalid characters")]
    IdInvalidCharacters,
}

/// Validate a presented API key before any lookup.
///
/// Only checks shape: non-empty, bounded length, URL-safe alphabet. Whether
/// the key actually exists is the repository's concern.
pub fn validate_presented_key(key: &str) -> Result<(), ApiKeyValidationError> {
    if key.is_empty() {
        return Err(ApiKeyValidationError::Empty);
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(ApiKeyValidationError::TooLong);
    }
    if !KEY_MATERIAL_PATTERN.is_match(key) {
        return Err(ApiKeyValidationError::InvalidCharacters);
    }
    Ok(())
}

/// Validate a key identifier (the derived lookup id, not the secret).
pub fn validate_key_id(id: &str) -> Result<(), ApiKeyValidationError> {
    if id.is_empty() {
        return Err(ApiKeyValidationError::EmptyId);
    }
    if id.len() > MAX_KEY_ID_LENGTH {
        return Err(ApiKeyValidationError::IdTooLong);
    }
    if !KEY_ID_PATTERN.is_match(id) {
        return Err(ApiKeyValidationError::IdInvalidCharacters);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_presented_key() {
        assert!(validate_presented_key("mcpd_abc123_XyZ-_9").is_ok());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert_eq!(
            validate_presented_key(""),
            Err(ApiKeyValidationError::Empty)
        );
    }

    #[test]
    fn test_overlong_key_rejected() {
        let key = "a".repeat(MAX_KEY_LENGTH + 1);
        assert_eq!(
            validate_presented_key(&key),
            Err(ApiKeyValidationError::TooLong)
        );
    }

    #[test]
    fn test_key_with_bad_characters_rejected() {
        assert_eq!(
            validate_presented_key("mcpd_abc;DROP TABLE"),
            Err(ApiKeyValidationError::InvalidCharacters)
        );
        assert_eq!(
            validate_presented_key("mcpd_abc\n"),
            Err(ApiKeyValidationError::InvalidCharacters)
        );
    }

    #[test]
    fn test_key_at_max_length_accepted() {
        let key = "a".repeat(MAX_KEY_LENGTH);
        assert!(validate_presented_key(&key).is_ok());
    }

    #[test]
    fn test_valid_key_id() {
        assert!(validate_key_id("Zk3mP-qw9").is_ok());
    }

    #[test]
    fn test_key_id_with_underscore_rejected() {
        // Underscores delimit the key parts, so they never appear in the id
        assert_eq!(
            validate_key_id("abc_def"),
            Err(ApiKeyValidationError::IdInvalidCharacters)
        );
    }

    #[test]
    fn test_empty_key_id_rejected() {
        assert_eq!(validate_key_id(""), Err(ApiKeyValidationError::EmptyId));
    }
}
