/// User management endpoints
///
/// Lists are scoped by row-level security: tenant users see their own
/// tenant, the superadmin sees everyone.
///
/// # Endpoints
///
/// - `GET /api/v1/users` - List users
/// - `GET /api/v1/users/me` - The caller's profile
/// - `POST /api/v1/users/invite` - Invite a user (USERS_INVITE, `max_users` entitlement)
/// - `PUT /api/v1/users/:user_id` - Change a user's role (USERS_UPDATE_ROLE)
/// - `DELETE /api/v1/users/:user_id` - Remove a user (USERS_DELETE)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Session, ValidatedJson},
    routes::Pagination,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use saaskit_shared::{
    auth::{authorization::require_permission, permissions::Permission},
    entitlements::{check_entitlement, MAX_USERS},
    models::{
        audit_log::{AuditAction, AuditLog},
        role::UserRole,
        user::{CreateUser, User},
    },
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

/// Invite request
#[derive(Debug, Deserialize, Validate)]
pub struct InviteUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub role_id: Uuid,
}

/// Role change request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRoleRequest {
    pub role_id: Uuid,
}

/// Whether a role change would leave the tenant without an admin
fn removes_last_admin(current_is_admin: bool, new_is_admin: bool, admin_count: i64) -> bool {
    current_is_admin && !new_is_admin && admin_count <= 1
}

/// List users visible to the caller
pub async fn list_users(
    mut session: Session,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<User>>> {
    let page = page.checked()?;
    let users = User::list(&mut session.tx, page.skip, page.limit).await?;
    session.commit().await?;
    Ok(Json(users))
}

/// Get the caller's own profile
///
/// # Errors
///
/// - `404 Not Found`: A superadmin without a profile
pub async fn get_me(mut session: Session) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&mut session.tx, session.user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Current user not found.".to_string()))?;

    session.commit().await?;
    Ok(Json(user))
}

/// Invite a user into the caller's tenant
///
/// The identity provider creates the account and emails the invite link.
/// The new profile has not accepted the Terms of Service until the user
/// completes the invite.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown role, or the email is already registered
/// - `402 Payment Required`: The plan's `max_users` is reached
/// - `403 Forbidden`: Missing USERS_INVITE
pub async fn invite_user(
    State(state): State<AppState>,
    mut session: Session,
    ValidatedJson(req): ValidatedJson<InviteUserRequest>,
) -> ApiResult<Json<User>> {
    require_permission(&mut session.tx, &session.user, Permission::UsersInvite).await?;
    check_entitlement(&mut session.tx, &session.user, MAX_USERS, 1).await?;
    let tenant_id = session.tenant_id()?;

    let role = UserRole::find_by_id(&mut session.tx, req.role_id).await?;
    if !role.is_some_and(|r| r.tenant_id == tenant_id) {
        return Err(ApiError::BadRequest(
            "Role not found or you do not have permission to assign it.".to_string(),
        ));
    }

    let invited_id = state
        .identity
        .invite_user(&req.email, state.config.identity.accept_invite_url.as_deref())
        .await?;

    let user = User::create(
        &mut session.tx,
        CreateUser {
            id: invited_id,
            email: req.email.clone(),
            tenant_id,
            role_id: Some(req.role_id),
            created_by: Some(session.user.user_id),
            ..Default::default()
        },
    )
    .await?;

    AuditLog::record(
        &mut session.tx,
        tenant_id,
        session.user.user_id,
        AuditAction::UserInvited,
        json!({
            "invited_user_id": user.id,
            "invited_email": user.email,
            "role_id": req.role_id,
        }),
    )
    .await?;

    session.commit().await?;
    info!(user_id = %user.id, tenant_id = %tenant_id, "User invited");

    Ok(Json(user))
}

/// Change a user's role
///
/// # Errors
///
/// - `400 Bad Request`: Targeting oneself, or demoting the tenant's last admin
/// - `403 Forbidden`: Missing USERS_UPDATE_ROLE
/// - `404 Not Found`: User or role doesn't exist
pub async fn update_user_role(
    mut session: Session,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRoleRequest>,
) -> ApiResult<Json<User>> {
    require_permission(&mut session.tx, &session.user, Permission::UsersUpdateRole).await?;

    if user_id == session.user.user_id {
        return Err(ApiError::BadRequest(
            "You cannot update your own role via this endpoint.".to_string(),
        ));
    }

    let target = User::find_by_id(&mut session.tx, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User to update not found.".to_string()))?;

    let new_role = UserRole::find_by_id(&mut session.tx, req.role_id)
        .await?
        .filter(|r| r.tenant_id == target.tenant_id)
        .ok_or_else(|| ApiError::NotFound("Role to assign not found.".to_string()))?;

    let current_is_admin = match target.role_id {
        Some(role_id) => UserRole::find_by_id(&mut session.tx, role_id)
            .await?
            .is_some_and(|r| r.is_admin_role),
        None => false,
    };

    if current_is_admin && !new_role.is_admin_role {
        let admin_count = User::count_admins(&mut session.tx, target.tenant_id).await?;
        if removes_last_admin(current_is_admin, new_role.is_admin_role, admin_count) {
            return Err(ApiError::BadRequest(
                "Cannot remove the last admin from the tenant. Please assign a new admin first.".to_string(),
            ));
        }
    }

    let updated = User::update_role(&mut session.tx, user_id, new_role.id, session.user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User to update not found.".to_string()))?;

    AuditLog::record(
        &mut session.tx,
        target.tenant_id,
        session.user.user_id,
        AuditAction::UserRoleUpdated,
        json!({
            "updated_user_id": updated.id,
            "updated_user_email": updated.email,
            "old_role_id": target.role_id,
            "new_role_id": new_role.id,
        }),
    )
    .await?;

    session.commit().await?;
    info!(user_id = %user_id, role_id = %new_role.id, "User role updated");

    Ok(Json(updated))
}

/// Remove a user
///
/// The profile is deleted here; deleting the identity-provider account is
/// best effort and only logged when it fails.
///
/// # Errors
///
/// - `400 Bad Request`: Deleting oneself
/// - `403 Forbidden`: Missing USERS_DELETE
/// - `404 Not Found`: User doesn't exist
pub async fn delete_user(
    State(state): State<AppState>,
    mut session: Session,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&mut session.tx, &session.user, Permission::UsersDelete).await?;

    if user_id == session.user.user_id {
        return Err(ApiError::BadRequest("Admins cannot delete themselves.".to_string()));
    }

    if !User::delete(&mut session.tx, user_id).await? {
        return Err(ApiError::NotFound("User not found.".to_string()));
    }

    if let Err(e) = state.identity.delete_user(user_id).await {
        warn!(user_id = %user_id, error = %e, "Could not delete identity account; removing profile anyway");
    }

    session.commit().await?;
    info!(user_id = %user_id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
