/// API key model and database operations
///
/// Only the Argon2 hash of a key is stored. Keys are found by their clear
/// lookup prefix, then verified against the hash (see `auth::api_key`).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE api_keys (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     key_prefix TEXT NOT NULL UNIQUE,
///     hashed_key TEXT NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_used_at TIMESTAMPTZ,
///     expires_at TIMESTAMPTZ
/// );
/// ```
///
/// RLS restricts regular sessions to their own keys; authentication itself
/// runs the prefix lookup with elevated session parameters.
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::auth::api_key::{generate_api_key, hash_api_key};
/// use saaskit_shared::models::api_key::{ApiKey, CreateApiKey};
/// use sqlx::PgConnection;
/// use uuid::Uuid;
///
/// # async fn example(conn: &mut PgConnection, tenant_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let generated = generate_api_key();
/// let key = ApiKey::create(conn, CreateApiKey {
///     tenant_id,
///     user_id,
///     key_prefix: generated.key_prefix.clone(),
///     hashed_key: hash_api_key(&generated.full_key)?,
///     expires_at: None,
/// }).await?;
///
/// println!("Give this to the user once: {}", generated.full_key);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

/// API key row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,

    /// Clear lookup prefix (`sk_live_` + 8 chars)
    pub key_prefix: String,

    /// Argon2 PHC hash of the full key
    #[serde(skip_serializing)]
    pub hashed_key: String,

    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Whether the key is past its expiry
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }
}

/// Input for creating an API key
#[derive(Debug, Clone)]
pub struct CreateApiKey {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub key_prefix: String,
    pub hashed_key: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Stores a new key
    pub async fn create(conn: &mut PgConnection, data: CreateApiKey) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (tenant_id, user_id, key_prefix, hashed_key, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(data.tenant_id)
        .bind(data.user_id)
        .bind(data.key_prefix)
        .bind(data.hashed_key)
        .bind(data.expires_at)
        .fetch_one(conn)
        .await
    }

    /// Finds a key by lookup prefix
    pub async fn find_by_prefix(
        conn: &mut PgConnection,
        key_prefix: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE key_prefix = $1")
            .bind(key_prefix)
            .fetch_optional(conn)
            .await
    }

    /// Lists a user's keys, newest first
    pub async fn list_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(conn)
        .await
    }

    /// Stamps the key as used now
    pub async fn touch(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Deletes a key owned by `user_id`
    ///
    /// # Returns
    ///
    /// false if no such key exists for that user
    pub async fn delete_for_user(
        conn: &mut PgConnection,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
