/// Authorization checks
///
/// Checks run after authentication, on the same RLS-scoped transaction.
///
/// # Permission Model
///
/// 1. **Superadmin**: bypasses every check below
/// 2. **Terms of Service**: must be accepted before anything else is allowed
/// 3. **Role bitmask**: the user's role must contain the required permission
/// 4. **Tenant admin**: tenant settings, billing and audit logs require a
///    role flagged `is_admin_role`
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::auth::authorization::{require_permission, require_terms_accepted};
/// use saaskit_shared::auth::context::AuthenticatedUser;
/// use saaskit_shared::auth::permissions::Permission;
/// use sqlx::PgConnection;
///
/// async fn check(conn: &mut PgConnection, user: &AuthenticatedUser) -> Result<(), Box<dyn std::error::Error>> {
///     require_terms_accepted(user)?;
///     require_permission(conn, user, Permission::ItemsCreate).await?;
///     Ok(())
/// }
/// ```

use sqlx::PgConnection;
use uuid::Uuid;

use super::context::AuthenticatedUser;
use super::permissions::Permission;
use crate::models::role::UserRole;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Terms of Service not accepted yet
    #[error("Terms of Service not accepted.")]
    TermsNotAccepted,

    /// Platform superadmin required
    #[error("Admin privileges required.")]
    NotSuperadmin,

    /// Tenant admin role required
    #[error("Tenant admin privileges required.")]
    NotTenantAdmin,

    /// User has no role
    #[error("User has no assigned role.")]
    NoRole,

    /// Role lacks a permission
    #[error("User lacks '{0}' permission.")]
    MissingPermission(Permission),

    /// Caller is not attached to a tenant
    #[error("User is not associated with a tenant.")]
    NoTenant,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Requires accepted Terms of Service
///
/// Superadmins pass.
pub fn require_terms_accepted(user: &AuthenticatedUser) -> Result<(), AuthzError> {
    if user.is_superadmin {
        return Ok(());
    }

    match &user.profile {
        Some(profile) if profile.has_accepted_terms() => Ok(()),
        _ => Err(AuthzError::TermsNotAccepted),
    }
}

/// Requires the platform superadmin
pub fn require_superadmin(user: &AuthenticatedUser) -> Result<(), AuthzError> {
    if user.is_superadmin {
        Ok(())
    } else {
        Err(AuthzError::NotSuperadmin)
    }
}

/// Returns the caller's tenant
///
/// # Errors
///
/// `NoTenant` for a superadmin acting without a tenant profile.
pub fn require_tenant(user: &AuthenticatedUser) -> Result<Uuid, AuthzError> {
    user.tenant_id.ok_or(AuthzError::NoTenant)
}

async fn load_role(conn: &mut PgConnection, user: &AuthenticatedUser) -> Result<UserRole, AuthzError> {
    let role_id = user.role_id().ok_or(AuthzError::NoRole)?;
    UserRole::find_by_id(conn, role_id).await?.ok_or(AuthzError::NoRole)
}

/// Requires a permission bit on the caller's role
///
/// Superadmins pass.
///
/// # Errors
///
/// - `NoRole` if the user has no (visible) role
/// - `MissingPermission` if the bit is not set
pub async fn require_permission(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    permission: Permission,
) -> Result<(), AuthzError> {
    if user.is_superadmin {
        return Ok(());
    }

    let role = load_role(conn, user).await?;
    if role.permissions().contains(permission) {
        Ok(())
    } else {
        Err(AuthzError::MissingPermission(permission))
    }
}

/// Requires an admin role within the caller's tenant
///
/// Superadmins pass.
pub async fn require_tenant_admin(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
) -> Result<(), AuthzError> {
    if user.is_superadmin {
        return Ok(());
    }

    let role = load_role(conn, user).await.map_err(|e| match e {
        AuthzError::NoRole => AuthzError::NotTenantAdmin,
        other => other,
    })?;

    if role.is_admin_role {
        Ok(())
    } else {
        Err(AuthzError::NotTenantAdmin)
    }
}
