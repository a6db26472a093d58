/// Request authentication and tenant-context resolution
///
/// Every authenticated request goes through the same two phases:
///
/// 1. [`Credentials::from_headers`] + [`verify`] check the credential's
///    syntax and signature without touching the database. Garbage tokens are
///    rejected before a connection is taken from the pool.
/// 2. [`resolve`] runs on the request's transaction: it loads the user
///    profile (and, for API keys, the key) and then applies the final RLS
///    session parameters. Every later query of the request inherits them.
///
/// # Credentials
///
/// - `Authorization: Bearer <jwt>` issued by the identity provider
/// - `X-API-Key: sk_live_<secret>`
///
/// A bearer token wins when both are present.
///
/// # Example
///
/// ```no_run
/// use axum::http::HeaderMap;
/// use saaskit_shared::auth::context::{resolve, verify, AuthSettings, Credentials};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, headers: HeaderMap, settings: AuthSettings) -> Result<(), Box<dyn std::error::Error>> {
/// let verified = verify(Credentials::from_headers(&headers)?, &settings)?;
///
/// let mut tx = pool.begin().await?;
/// let user = resolve(&mut tx, verified, &settings).await?;
/// // queries on `tx` are now scoped to `user.tenant_id`
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use axum::http::{header::AUTHORIZATION, HeaderMap};
use sqlx::PgConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use super::api_key::{key_prefix, verify_api_key};
use super::jwt::{validate_token, JwtError};
use crate::db::session::{self, SessionParams};
use crate::models::api_key::ApiKey;
use crate::models::user::User;

/// Header carrying API keys
pub const API_KEY_HEADER: &str = "x-api-key";

/// Settings needed to authenticate requests
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Shared HS256 secret of the identity provider
    pub jwt_secret: String,

    /// Expected `aud` claim
    pub audience: String,

    /// Identity-provider user id granted platform-wide superadmin rights
    pub superadmin_user_id: Option<Uuid>,
}

impl AuthSettings {
    fn is_superadmin(&self, user_id: Uuid) -> bool {
        self.superadmin_user_id == Some(user_id)
    }
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token or API key
    #[error("Not authenticated")]
    MissingCredentials,

    /// Authorization header present but not `Bearer <token>`
    #[error("Invalid authorization header format")]
    InvalidFormat,

    /// Token failed validation
    #[error("Could not validate credentials: {0}")]
    InvalidToken(#[from] JwtError),

    /// Key malformed, unknown, or hash mismatch
    #[error("Invalid API key.")]
    InvalidApiKey,

    /// Key past its expiry
    #[error("API key has expired.")]
    ExpiredApiKey,

    /// Valid token but no application profile
    #[error("User profile not found")]
    ProfileNotFound,

    /// Database failure while resolving the context
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unexpected failure (e.g. unreadable key hash)
    #[error("Authentication failed: {0}")]
    Internal(String),
}

/// How a request was authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Jwt,
    ApiKey,
}

/// Raw credentials taken from request headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    ApiKey(String),
}

impl Credentials {
    /// Extracts credentials, preferring a bearer token
    ///
    /// # Errors
    ///
    /// - `MissingCredentials` when neither header is present
    /// - `InvalidFormat` when `Authorization` isn't `Bearer <token>`
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
            let token = value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(AuthError::InvalidFormat)?;
            return Ok(Credentials::Bearer(token.to_string()));
        }

        if let Some(value) = headers.get(API_KEY_HEADER) {
            let key = value.to_str().map_err(|_| AuthError::InvalidApiKey)?.trim();
            if key.is_empty() {
                return Err(AuthError::MissingCredentials);
            }
            return Ok(Credentials::ApiKey(key.to_string()));
        }

        Err(AuthError::MissingCredentials)
    }
}

/// Credentials whose syntax and signature have been checked
#[derive(Debug, Clone)]
pub enum VerifiedCredentials {
    Jwt { user_id: Uuid, email: Option<String> },
    ApiKey { key: String, prefix: String },
}

/// Checks credentials without database access
pub fn verify(credentials: Credentials, settings: &AuthSettings) -> Result<VerifiedCredentials, AuthError> {
    match credentials {
        Credentials::Bearer(token) => {
            let claims = validate_token(&token, &settings.jwt_secret, &settings.audience)?;
            Ok(VerifiedCredentials::Jwt {
                user_id: claims.user_id()?,
                email: claims.email,
            })
        }
        Credentials::ApiKey(key) => {
            let prefix = key_prefix(&key).map_err(|_| AuthError::InvalidApiKey)?;
            Ok(VerifiedCredentials::ApiKey { key, prefix })
        }
    }
}

/// The resolved caller of a request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: Option<String>,

    /// Active tenant; `None` only for a superadmin without a profile
    pub tenant_id: Option<Uuid>,

    pub is_superadmin: bool,
    pub method: AuthMethod,

    /// Application profile, loaded once per request
    pub profile: Option<User>,
}

impl AuthenticatedUser {
    /// Session parameters matching this caller
    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            user_id: Some(self.user_id),
            tenant_id: self.tenant_id,
            is_superadmin: self.is_superadmin,
        }
    }

    /// Role of the caller's profile
    pub fn role_id(&self) -> Option<Uuid> {
        self.profile.as_ref().and_then(|p| p.role_id)
    }
}

/// Resolves verified credentials into a caller and scopes the transaction
///
/// Must be called on a fresh transaction. On success the transaction carries
/// the caller's RLS parameters.
///
/// # Errors
///
/// - `ProfileNotFound` for a non-superadmin JWT user without a profile
/// - `InvalidApiKey` / `ExpiredApiKey` for rejected keys
/// - `Database` on query failures
pub async fn resolve(
    conn: &mut PgConnection,
    verified: VerifiedCredentials,
    settings: &AuthSettings,
) -> Result<AuthenticatedUser, AuthError> {
    let user = match verified {
        VerifiedCredentials::Jwt { user_id, email } => {
            resolve_jwt(conn, user_id, email, settings).await?
        }
        VerifiedCredentials::ApiKey { key, prefix } => resolve_api_key(conn, key, prefix).await?,
    };

    session::apply(conn, &user.session_params()).await?;

    debug!(
        user_id = %user.user_id,
        tenant_id = ?user.tenant_id,
        is_superadmin = user.is_superadmin,
        method = ?user.method,
        "Request authenticated"
    );

    Ok(user)
}

async fn resolve_jwt(
    conn: &mut PgConnection,
    user_id: Uuid,
    email: Option<String>,
    settings: &AuthSettings,
) -> Result<AuthenticatedUser, AuthError> {
    let is_superadmin = settings.is_superadmin(user_id);

    // Only the self-select policy applies until the tenant is known
    let bootstrap = SessionParams {
        user_id: Some(user_id),
        tenant_id: None,
        is_superadmin,
    };
    session::apply(conn, &bootstrap).await?;

    let profile = User::find_by_id(conn, user_id).await?;
    if profile.is_none() && !is_superadmin {
        return Err(AuthError::ProfileNotFound);
    }

    Ok(AuthenticatedUser {
        user_id,
        email: email.or_else(|| profile.as_ref().map(|p| p.email.clone())),
        tenant_id: profile.as_ref().map(|p| p.tenant_id),
        is_superadmin,
        method: AuthMethod::Jwt,
        profile,
    })
}

async fn resolve_api_key(
    conn: &mut PgConnection,
    key: String,
    prefix: String,
) -> Result<AuthenticatedUser, AuthError> {
    // Key lookup happens before any tenant is known
    session::apply(conn, &SessionParams::system()).await?;

    let stored = ApiKey::find_by_prefix(conn, &prefix)
        .await?
        .ok_or(AuthError::InvalidApiKey)?;

    let hash = stored.hashed_key.clone();
    let matches = tokio::task::spawn_blocking(move || verify_api_key(&key, &hash))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    if !matches {
        warn!(key_prefix = %prefix, "API key hash mismatch");
        return Err(AuthError::InvalidApiKey);
    }

    if stored.is_expired() {
        return Err(AuthError::ExpiredApiKey);
    }

    let profile = User::find_by_id(conn, stored.user_id)
        .await?
        .ok_or(AuthError::InvalidApiKey)?;

    ApiKey::touch(conn, stored.id).await?;

    Ok(AuthenticatedUser {
        user_id: profile.id,
        email: Some(profile.email.clone()),
        tenant_id: Some(profile.tenant_id),
        is_superadmin: false,
        method: AuthMethod::ApiKey,
        profile: Some(profile),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, IdentityClaims, DEFAULT_AUDIENCE};
    use axum::http::HeaderValue;

    fn settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: "context-test-secret-of-sufficient-length".to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            superadmin_user_id: None,
        }
    }

    #[test]
    fn test_missing_credentials() {
        let headers = HeaderMap::new();
        assert!(matches!(
            Credentials::from_headers(&headers),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn test_bearer_preferred_over_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("sk_live_abcdefghij"));

        let creds = Credentials::from_headers(&headers).unwrap();
        assert_eq!(creds, Credentials::Bearer("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            Credentials::from_headers(&headers),
            Err(AuthError::InvalidFormat)
        ));
    }

    #[test]
    fn test_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("sk_live_abcdefghij"));
        let creds = Credentials::from_headers(&headers).unwrap();
        assert_eq!(creds, Credentials::ApiKey("sk_live_abcdefghij".to_string()));
    }

    #[test]
    fn test_verify_valid_jwt() {
        let user_id = Uuid::new_v4();
        let claims = IdentityClaims::new(user_id, Some("x@example.com".to_string()));
        let token = create_token(&claims, &settings().jwt_secret).unwrap();

        match verify(Credentials::Bearer(token), &settings()).unwrap() {
            VerifiedCredentials::Jwt { user_id: id, email } => {
                assert_eq!(id, user_id);
                assert_eq!(email.as_deref(), Some("x@example.com"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_verify_rejects_bad_jwt() {
        let result = verify(Credentials::Bearer("nope".to_string()), &settings());
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_verify_rejects_malformed_api_key() {
        let result = verify(Credentials::ApiKey("pk_live_whatever".to_string()), &settings());
        assert!(matches!(result, Err(AuthError::InvalidApiKey)));
    }

    #[test]
    fn test_verify_api_key_prefix() {
        let result = verify(Credentials::ApiKey("sk_live_abcdefghXYZ".to_string()), &settings()).unwrap();
        match result {
            VerifiedCredentials::ApiKey { prefix, .. } => assert_eq!(prefix, "sk_live_abcdefgh"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_session_params_follow_user() {
        let tenant = Uuid::new_v4();
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            email: None,
            tenant_id: Some(tenant),
            is_superadmin: false,
            method: AuthMethod::ApiKey,
            profile: None,
        };
        let params = user.session_params();
        assert_eq!(params.tenant_id, Some(tenant));
        assert!(!params.is_superadmin);
    }
}
