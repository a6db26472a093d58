/// API key generation and verification
///
/// This module provides the cryptographic half of API key authentication.
/// Database lookups live in `models::api_key`.
///
/// # Key Format
///
/// `sk_live_{secret}` where `secret` is 32 random bytes encoded as URL-safe
/// base64 without padding (43 chars).
///
/// - **Lookup prefix**: `sk_live_` + the first 8 chars of the secret, stored
///   in clear and unique, so a key can be found without scanning hashes
/// - **Storage**: the full key is hashed with Argon2id (PHC string); the
///   plaintext is shown exactly once, at creation
///
/// # Example
///
/// ```
/// use saaskit_shared::auth::api_key::{generate_api_key, hash_api_key, key_prefix, verify_api_key};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let generated = generate_api_key();
/// assert!(generated.full_key.starts_with("sk_live_"));
/// assert_eq!(key_prefix(&generated.full_key)?, generated.key_prefix);
///
/// let hash = hash_api_key(&generated.full_key)?;
/// assert!(verify_api_key(&generated.full_key, &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Literal prefix of every API key
pub const KEY_PREFIX: &str = "sk_live_";

/// Number of secret characters included in the lookup prefix
pub const LOOKUP_CHARS: usize = 8;

/// Random bytes in a key secret
const SECRET_BYTES: usize = 32;

/// Error type for API key operations
#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    /// Key does not have the `sk_live_{secret}` shape
    #[error("Invalid API key format")]
    InvalidFormat,

    /// Hashing failed
    #[error("Failed to hash API key: {0}")]
    HashError(String),

    /// Stored hash could not be parsed
    #[error("Invalid API key hash: {0}")]
    InvalidHash(String),
}

/// A freshly generated API key
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// Full plaintext key, returned to the caller once
    pub full_key: String,

    /// Lookup prefix stored alongside the hash
    pub key_prefix: String,
}

/// Generates a new random API key
pub fn generate_api_key() -> GeneratedApiKey {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret = URL_SAFE_NO_PAD.encode(bytes);

    let full_key = format!("{}{}", KEY_PREFIX, secret);
    let key_prefix = format!("{}{}", KEY_PREFIX, &secret[..LOOKUP_CHARS]);

    GeneratedApiKey { full_key, key_prefix }
}

/// Extracts the lookup prefix from a presented key
///
/// Only the shape is checked here, no database access happens.
///
/// # Errors
///
/// Returns `ApiKeyError::InvalidFormat` if the key lacks the `sk_live_`
/// prefix or the secret is shorter than the lookup prefix.
///
/// # Example
///
/// ```
/// use saaskit_shared::auth::api_key::key_prefix;
///
/// assert_eq!(key_prefix("sk_live_abcdefgh1234").unwrap(), "sk_live_abcdefgh");
/// assert!(key_prefix("pk_test_abcdefgh").is_err());
/// ```
pub fn key_prefix(key: &str) -> Result<String, ApiKeyError> {
    let secret = key.strip_prefix(KEY_PREFIX).ok_or(ApiKeyError::InvalidFormat)?;

    let valid_chars = secret
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if secret.len() < LOOKUP_CHARS || !valid_chars {
        return Err(ApiKeyError::InvalidFormat);
    }

    Ok(format!("{}{}", KEY_PREFIX, &secret[..LOOKUP_CHARS]))
}

/// Hashes a full API key with Argon2id
///
/// # Errors
///
/// Returns `ApiKeyError::HashError` if argon2 fails.
pub fn hash_api_key(key: &str) -> Result<String, ApiKeyError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(key.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiKeyError::HashError(e.to_string()))
}

/// Verifies a presented key against a stored Argon2 hash
///
/// Returns `Ok(false)` for a mismatch and an error only if the stored hash is
/// unreadable. Comparison is constant-time inside argon2.
pub fn verify_api_key(key: &str, stored_hash: &str) -> Result<bool, ApiKeyError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| ApiKeyError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(key.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ApiKeyError::InvalidHash(e.to_string())),
    }
}
