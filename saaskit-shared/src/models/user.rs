/// User profile model and database operations
///
/// Credentials live with the external identity provider; this table holds
/// the application-side profile, keyed by the provider's user id.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     email TEXT NOT NULL UNIQUE,
///     role_id UUID REFERENCES user_roles(id) ON DELETE SET NULL,
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_data JSONB,
///     terms_accepted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     created_by UUID,
///     updated_by UUID
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::db::session::begin_system;
/// use saaskit_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, tenant_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = begin_system(&pool).await?;
///
/// let user = User::create(&mut tx, CreateUser {
///     id: Uuid::new_v4(),
///     email: "user@example.com".to_string(),
///     tenant_id,
///     ..Default::default()
/// }).await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

/// User profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Identity provider user id
    pub id: Uuid,

    /// Email address (unique across all tenants)
    pub email: String,

    /// Assigned role, if any
    pub role_id: Option<Uuid>,

    pub tenant_id: Uuid,

    /// Free-form profile data
    pub user_data: Option<JsonValue>,

    /// When the user accepted the Terms of Service
    pub terms_accepted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl User {
    /// Whether the user has accepted the Terms of Service
    pub fn has_accepted_terms(&self) -> bool {
        self.terms_accepted_at.is_some()
    }
}

/// Input for creating a user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub id: Uuid,
    pub email: String,
    pub tenant_id: Uuid,
    pub role_id: Option<Uuid>,
    pub user_data: Option<JsonValue>,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}

impl Default for CreateUser {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            email: String::new(),
            tenant_id: Uuid::nil(),
            role_id: None,
            user_data: None,
            terms_accepted_at: None,
            created_by: None,
        }
    }
}

impl User {
    /// Creates a user profile
    ///
    /// # Errors
    ///
    /// Returns a database error if the id or email already exists.
    pub async fn create(conn: &mut PgConnection, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, tenant_id, role_id, user_data, terms_accepted_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(data.id)
        .bind(data.email)
        .bind(data.tenant_id)
        .bind(data.role_id)
        .bind(data.user_data)
        .bind(data.terms_accepted_at)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Finds a user by email address
    pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(conn)
            .await
    }

    /// Lists users visible to the session
    pub async fn list(conn: &mut PgConnection, skip: i64, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC OFFSET $1 LIMIT $2")
            .bind(skip)
            .bind(limit)
            .fetch_all(conn)
            .await
    }

    /// Ids of all users belonging to a tenant
    pub async fn ids_in_tenant(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_all(conn)
            .await
    }

    /// Counts the users of a tenant
    pub async fn count_in_tenant(conn: &mut PgConnection, tenant_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(conn)
            .await
    }

    /// Counts the users of a tenant holding an admin role
    pub async fn count_admins(conn: &mut PgConnection, tenant_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM users u
            JOIN user_roles r ON r.id = u.role_id
            WHERE u.tenant_id = $1 AND r.is_admin_role
            "#,
        )
        .bind(tenant_id)
        .fetch_one(conn)
        .await
    }

    /// Assigns a new role
    pub async fn update_role(
        conn: &mut PgConnection,
        id: Uuid,
        role_id: Uuid,
        updated_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role_id = $2, updated_by = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(role_id)
        .bind(updated_by)
        .fetch_optional(conn)
        .await
    }

    /// Stamps Terms of Service acceptance with the current time
    pub async fn accept_terms(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET terms_accepted_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Deletes a user profile
    ///
    /// # Returns
    ///
    /// true if a row was deleted
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
