/// Identity-provider JWT validation
///
/// End users sign in with the external identity provider, which issues
/// HS256-signed access tokens. This module validates those tokens with the
/// shared secret and exposes their claims.
///
/// # Security
///
/// - **Algorithm**: HS256 only (other algorithms are rejected)
/// - **Audience**: must match the configured audience (`authenticated` by default)
/// - **Expiration**: always enforced
///
/// Token issuance belongs to the identity provider. [`create_token`] exists so
/// tests and local tooling can mint tokens with the same secret.
///
/// # Example
///
/// ```
/// use saaskit_shared::auth::jwt::{create_token, validate_token, IdentityClaims, DEFAULT_AUDIENCE};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let claims = IdentityClaims::new(user_id, Some("owner@example.com".to_string()));
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key", DEFAULT_AUDIENCE)?;
/// assert_eq!(validated.user_id()?, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience the identity provider stamps on end-user access tokens
pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Audience claim does not match
    #[error("Invalid audience")]
    InvalidAudience,

    /// Subject claim is missing or is not a UUID
    #[error("Invalid subject claim: {0}")]
    InvalidSubject(String),
}

/// Claims carried by identity-provider access tokens
///
/// Only the claims the backend relies on are modelled; anything else in the
/// token is ignored during deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject - identity provider user id
    pub sub: String,

    /// Email address of the signed-in user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Audience
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Provider-side role (e.g. "authenticated")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl IdentityClaims {
    /// Creates claims for `user_id` valid for one hour
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        Self::with_expiration(user_id, email, Duration::hours(1))
    }

    /// Creates claims with a custom lifetime
    ///
    /// A negative `expires_in` yields an already-expired token, which is
    /// handy in tests.
    pub fn with_expiration(user_id: Uuid, email: Option<String>, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            email,
            aud: DEFAULT_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            role: Some(DEFAULT_AUDIENCE.to_string()),
        }
    }

    /// Parses the subject claim as a user id
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidSubject` when `sub` is empty or not a UUID.
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        if self.sub.is_empty() {
            return Err(JwtError::InvalidSubject("missing".to_string()));
        }
        Uuid::parse_str(&self.sub).map_err(|e| JwtError::InvalidSubject(e.to_string()))
    }
}

/// Signs claims with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails.
pub fn create_token(claims: &IdentityClaims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates an identity-provider token and extracts its claims
///
/// Verifies the HS256 signature, the expiration and the audience, and that
/// the subject is a well-formed user id.
///
/// # Arguments
///
/// * `token` - Raw bearer token
/// * `secret` - Shared JWT secret of the identity provider
/// * `audience` - Expected `aud` claim
///
/// # Errors
///
/// - `JwtError::Expired` if `exp` is in the past
/// - `JwtError::InvalidAudience` if `aud` does not match
/// - `JwtError::InvalidSubject` if `sub` is not a UUID
/// - `JwtError::ValidationError` for bad signatures and malformed tokens
pub fn validate_token(token: &str, secret: &str, audience: &str) -> Result<IdentityClaims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    validation.validate_exp = true;

    let token_data = decode::<IdentityClaims>(token, &key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidAudience => JwtError::InvalidAudience,
            _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
        }
    })?;

    token_data.claims.user_id()?;
    Ok(token_data.claims)
}
