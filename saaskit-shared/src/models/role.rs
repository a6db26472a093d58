/// Tenant roles
///
/// A role is a named [`PermissionSet`] within a tenant. The built-in
/// "Admin" role created at onboarding carries every permission and is
/// flagged `is_admin_role`; such roles are immutable through the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::auth::permissions::PermissionSet;

/// Name of the role created for every new tenant
pub const ADMIN_ROLE_NAME: &str = "Admin";

/// Role row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRole {
    pub id: Uuid,
    pub name: String,

    /// Raw permission bitmask
    pub permission_set: i32,

    /// Admin roles grant tenant administration and cannot be edited
    pub is_admin_role: bool,

    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl UserRole {
    /// Decoded permission set
    pub fn permissions(&self) -> PermissionSet {
        PermissionSet(self.permission_set)
    }
}

/// Input for creating a role
#[derive(Debug, Clone)]
pub struct CreateRole {
    pub name: String,
    pub permissions: PermissionSet,
    pub is_admin_role: bool,
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
}

impl CreateRole {
    /// The full-permission Admin role for a new tenant
    pub fn admin(tenant_id: Uuid, created_by: Option<Uuid>) -> Self {
        Self {
            name: ADMIN_ROLE_NAME.to_string(),
            permissions: PermissionSet::TENANT_ADMIN,
            is_admin_role: true,
            tenant_id,
            created_by,
        }
    }
}

/// Input for updating a role
#[derive(Debug, Clone, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub permissions: Option<PermissionSet>,
}

impl UserRole {
    /// Creates a role
    ///
    /// # Errors
    ///
    /// Returns a database error when the name already exists in the tenant
    /// (`uq_user_roles_tenant_name`).
    pub async fn create(conn: &mut PgConnection, data: CreateRole) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, UserRole>(
            r#"
            INSERT INTO user_roles (name, permission_set, is_admin_role, tenant_id, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.permissions.bits())
        .bind(data.is_admin_role)
        .bind(data.tenant_id)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
    }

    /// Finds a role by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserRole>("SELECT * FROM user_roles WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lists roles visible to the session, by name
    pub async fn list(conn: &mut PgConnection, skip: i64, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserRole>("SELECT * FROM user_roles ORDER BY name OFFSET $1 LIMIT $2")
            .bind(skip)
            .bind(limit)
            .fetch_all(conn)
            .await
    }

    /// Updates name and/or permissions
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateRole,
        updated_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserRole>(
            r#"
            UPDATE user_roles
            SET name = COALESCE($2, name),
                permission_set = COALESCE($3, permission_set),
                updated_by = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.permissions.map(PermissionSet::bits))
        .bind(updated_by)
        .fetch_optional(conn)
        .await
    }

    /// Number of users currently holding the role
    pub async fn assigned_user_count(conn: &mut PgConnection, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(id)
            .fetch_one(conn)
            .await
    }

    /// Deletes a role
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_roles WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
