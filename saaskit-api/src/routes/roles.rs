/// Role management endpoints
///
/// Roles carry their permissions as a bitmask. Requests name permissions
/// (`"ITEMS_READ"`), responses include both the bitmask and the names.
///
/// # Endpoints
///
/// - `GET /api/v1/roles` - List roles (ROLES_READ)
/// - `POST /api/v1/roles` - Create a role (ROLES_CREATE)
/// - `GET /api/v1/roles/:role_id` - Get a role (ROLES_READ)
/// - `PUT /api/v1/roles/:role_id` - Update a role (ROLES_UPDATE)
/// - `DELETE /api/v1/roles/:role_id` - Delete a role (ROLES_DELETE)

use crate::{
    error::{ApiError, ApiResult},
    extract::{Session, ValidatedJson},
    routes::Pagination,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use saaskit_shared::{
    auth::{
        authorization::require_permission,
        permissions::{Permission, PermissionSet},
    },
    models::role::{CreateRole, UpdateRole, UserRole},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Role create request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// Permission names, e.g. `["ITEMS_READ", "ITEMS_CREATE"]`
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Role update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub permissions: Option<Vec<String>>,
}

/// Role as returned by the API
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub permission_set: i32,
    pub permissions: Vec<String>,
    pub is_admin_role: bool,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRole> for RoleResponse {
    fn from(role: UserRole) -> Self {
        Self {
            permissions: role.permissions().names(),
            id: role.id,
            name: role.name,
            permission_set: role.permission_set,
            is_admin_role: role.is_admin_role,
            tenant_id: role.tenant_id,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

fn role_not_found() -> ApiError {
    ApiError::NotFound("Role not found.".to_string())
}

/// List roles visible to the caller
pub async fn list_roles(
    mut session: Session,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let page = page.checked()?;
    require_permission(&mut session.tx, &session.user, Permission::RolesRead).await?;

    let roles = UserRole::list(&mut session.tx, page.skip, page.limit).await?;
    session.commit().await?;

    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// Create a role in the caller's tenant
///
/// # Errors
///
/// - `409 Conflict`: Name already used in the tenant
/// - `422 Unprocessable Entity`: Unknown permission name
pub async fn create_role(
    mut session: Session,
    ValidatedJson(req): ValidatedJson<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    require_permission(&mut session.tx, &session.user, Permission::RolesCreate).await?;
    let tenant_id = session.tenant_id()?;
    let permissions = PermissionSet::from_names(&req.permissions)?;

    let role = UserRole::create(
        &mut session.tx,
        CreateRole {
            name: req.name,
            permissions,
            is_admin_role: false,
            tenant_id,
            created_by: Some(session.user.user_id),
        },
    )
    .await?;

    session.commit().await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

/// Get a role
pub async fn get_role(mut session: Session, Path(role_id): Path<Uuid>) -> ApiResult<Json<RoleResponse>> {
    require_permission(&mut session.tx, &session.user, Permission::RolesRead).await?;

    let role = UserRole::find_by_id(&mut session.tx, role_id)
        .await?
        .ok_or_else(role_not_found)?;

    session.commit().await?;
    Ok(Json(role.into()))
}

/// Update a role's name or permissions
///
/// # Errors
///
/// - `403 Forbidden`: The role is an admin role
/// - `404 Not Found`: Role doesn't exist
pub async fn update_role(
    mut session: Session,
    Path(role_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    require_permission(&mut session.tx, &session.user, Permission::RolesUpdate).await?;

    let role = UserRole::find_by_id(&mut session.tx, role_id)
        .await?
        .ok_or_else(role_not_found)?;
    if role.is_admin_role {
        return Err(ApiError::Forbidden(
            "Admin role permissions cannot be updated via this endpoint.".to_string(),
        ));
    }

    let permissions = req
        .permissions
        .as_ref()
        .map(PermissionSet::from_names)
        .transpose()?;

    let role = UserRole::update(
        &mut session.tx,
        role_id,
        UpdateRole {
            name: req.name,
            permissions,
        },
        session.user.user_id,
    )
    .await?
    .ok_or_else(role_not_found)?;

    session.commit().await?;
    Ok(Json(role.into()))
}

/// Delete a role
///
/// # Errors
///
/// - `400 Bad Request`: Users are still assigned to the role
/// - `403 Forbidden`: The role is an admin role
/// - `404 Not Found`: Role doesn't exist
pub async fn delete_role(mut session: Session, Path(role_id): Path<Uuid>) -> ApiResult<StatusCode> {
    require_permission(&mut session.tx, &session.user, Permission::RolesDelete).await?;

    let role = UserRole::find_by_id(&mut session.tx, role_id)
        .await?
        .ok_or_else(role_not_found)?;
    if role.is_admin_role {
        return Err(ApiError::Forbidden("Admin role cannot be deleted.".to_string()));
    }

    if UserRole::assigned_user_count(&mut session.tx, role_id).await? > 0 {
        return Err(ApiError::BadRequest(
            "Cannot delete role while users are assigned to it.".to_string(),
        ));
    }

    UserRole::delete(&mut session.tx, role_id).await?;
    session.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_decodes_permissions() {
        let now = Utc::now();
        let permissions =
            PermissionSet::from_names(["ITEMS_READ", "ITEMS_CREATE"]).unwrap();
        let role = UserRole {
            id: Uuid::new_v4(),
            name: "Editor".to_string(),
            permission_set: permissions.bits(),
            is_admin_role: false,
            tenant_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        };

        let response = RoleResponse::from(role);
        assert_eq!(response.permission_set, permissions.bits());
        assert!(response.permissions.contains(&"ITEMS_READ".to_string()));
        assert!(response.permissions.contains(&"ITEMS_CREATE".to_string()));
        assert_eq!(response.permissions.len(), 2);
    }

    #[test]
    fn test_unknown_permission_is_rejected() {
        let err: ApiError = PermissionSet::from_names(["ITEMS_READ", "FLY"]).unwrap_err().into();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }
}
