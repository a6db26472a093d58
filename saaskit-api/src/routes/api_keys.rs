/// API key management endpoints
///
/// Keys belong to the user who created them and act with that user's
/// permissions. Only the Argon2 hash is stored; the full key is shown once.
///
/// # Endpoints
///
/// - `POST /api/v1/api-keys` - Create a key
/// - `GET /api/v1/api-keys` - List the caller's keys
/// - `DELETE /api/v1/api-keys/:api_key_id` - Revoke one of the caller's keys

use crate::{
    error::{ApiError, ApiResult},
    extract::Session,
};
use axum::{extract::Path, http::StatusCode, Json};
use saaskit_shared::{
    auth::api_key::{generate_api_key, hash_api_key},
    models::api_key::{ApiKey, CreateApiKey},
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Create API key response
#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    /// Stored key metadata
    pub api_key_details: ApiKey,

    /// The plaintext key
    ///
    /// IMPORTANT: This is the only time the plaintext key is shown.
    pub full_api_key: String,
}

/// Create an API key for the caller
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/api-keys
/// Authorization: Bearer <access_token>
/// ```
///
/// # Response
///
/// ```json
/// {
///   "api_key_details": {
///     "id": "uuid",
///     "key_prefix": "sk_live_abcdefgh",
///     "created_at": "2025-01-03T12:00:00Z",
///     "last_used_at": null,
///     "expires_at": null
///   },
///   "full_api_key": "sk_live_abcdefgh..."
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: The caller has no tenant (superadmin)
pub async fn create_api_key(mut session: Session) -> ApiResult<(StatusCode, Json<CreateApiKeyResponse>)> {
    let tenant_id = session
        .user
        .tenant_id
        .ok_or_else(|| ApiError::BadRequest("Superadmins cannot create API keys.".to_string()))?;

    let generated = generate_api_key();
    let full_key = generated.full_key.clone();
    let hashed_key = tokio::task::spawn_blocking(move || hash_api_key(&full_key))
        .await
        .map_err(|e| ApiError::InternalError(format!("Hashing task failed: {}", e)))??;

    let api_key = ApiKey::create(
        &mut session.tx,
        CreateApiKey {
            tenant_id,
            user_id: session.user.user_id,
            key_prefix: generated.key_prefix,
            hashed_key,
            expires_at: None,
        },
    )
    .await?;

    session.commit().await?;
    info!(api_key_id = %api_key.id, key_prefix = %api_key.key_prefix, "API key created");

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            api_key_details: api_key,
            full_api_key: generated.full_key,
        }),
    ))
}

/// List the caller's API keys
pub async fn list_api_keys(mut session: Session) -> ApiResult<Json<Vec<ApiKey>>> {
    let keys = ApiKey::list_for_user(&mut session.tx, session.user.user_id).await?;
    session.commit().await?;
    Ok(Json(keys))
}

/// Revoke one of the caller's API keys
///
/// # Errors
///
/// - `404 Not Found`: No such key owned by the caller
pub async fn delete_api_key(mut session: Session, Path(api_key_id): Path<Uuid>) -> ApiResult<StatusCode> {
    if !ApiKey::delete_for_user(&mut session.tx, api_key_id, session.user.user_id).await? {
        return Err(ApiError::NotFound("API key not found.".to_string()));
    }

    session.commit().await?;
    info!(api_key_id = %api_key_id, "API key revoked");

    Ok(StatusCode::NO_CONTENT)
}
