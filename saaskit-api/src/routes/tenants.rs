/// Tenant endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/tenants` - Create a tenant with its admin account (superadmin)
/// - `GET /api/v1/tenants/me` - The caller's tenant (tenant admin)
/// - `PUT /api/v1/tenants/me` - Update the caller's tenant (tenant admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Session, ValidatedJson},
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use saaskit_shared::{
    auth::authorization::{require_superadmin, require_tenant_admin},
    models::{
        role::{CreateRole, UserRole},
        tenant::{CreateTenant, Tenant, UpdateTenant},
        user::{CreateUser, User},
    },
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

/// Message returned when a request arrives without accepted terms
pub const TERMS_REQUIRED: &str = "You must accept the Terms and Conditions to proceed.";

/// Tenant fields shared by every creation path
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTenant {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 3, max = 63, message = "Slug must be 3-63 characters"))]
    pub slug: String,

    pub tenant_data: Option<JsonValue>,

    pub logo_path: Option<String>,
}

/// Superadmin tenant creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub tenant: NewTenant,

    #[validate(email(message = "Invalid email format"))]
    pub admin_email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub admin_password: String,

    pub terms_accepted: bool,
}

/// Tenant update request
///
/// Only provided fields change.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 3, max = 63, message = "Slug must be 3-63 characters"))]
    pub slug: Option<String>,

    pub tenant_data: Option<JsonValue>,

    pub logo_path: Option<String>,
}

impl From<UpdateTenantRequest> for UpdateTenant {
    fn from(req: UpdateTenantRequest) -> Self {
        UpdateTenant {
            name: req.name,
            slug: req.slug,
            tenant_data: req.tenant_data,
            logo_path: req.logo_path,
        }
    }
}

/// Creates a tenant, its Admin role and the admin's profile
///
/// The admin accepts the Terms of Service as part of creation. Must run on
/// a system or superadmin transaction since the tenant doesn't exist yet
/// when its first rows are written.
///
/// # Errors
///
/// `409 Conflict` for a taken slug or email.
pub(crate) async fn create_tenant_with_admin(
    conn: &mut PgConnection,
    tenant: NewTenant,
    admin_id: Uuid,
    admin_email: &str,
    created_by: Uuid,
) -> ApiResult<Tenant> {
    let tenant = Tenant::create(
        conn,
        CreateTenant {
            name: tenant.name,
            slug: tenant.slug,
            tenant_data: tenant.tenant_data,
            logo_path: tenant.logo_path,
            created_by: Some(created_by),
        },
    )
    .await?;

    let role = UserRole::create(conn, CreateRole::admin(tenant.id, Some(created_by))).await?;

    User::create(
        conn,
        CreateUser {
            id: admin_id,
            email: admin_email.to_string(),
            tenant_id: tenant.id,
            role_id: Some(role.id),
            terms_accepted_at: Some(Utc::now()),
            created_by: Some(created_by),
            ..Default::default()
        },
    )
    .await?;

    Tenant::set_admin_user(conn, tenant.id, admin_id).await?;

    info!(
        tenant_id = %tenant.id,
        slug = %tenant.slug,
        admin_user_id = %admin_id,
        "Tenant created"
    );

    Ok(Tenant {
        admin_user_id: Some(admin_id),
        ..tenant
    })
}

/// Create a tenant and its admin account (superadmin)
///
/// The admin account is created at the identity provider first. If the
/// database part then fails, the account is removed again.
///
/// # Errors
///
/// - `400 Bad Request`: Terms not accepted, or the provider rejected the account
/// - `403 Forbidden`: Caller is not the superadmin
/// - `409 Conflict`: Slug or email already in use
pub async fn create_tenant(
    State(state): State<AppState>,
    mut session: Session,
    ValidatedJson(req): ValidatedJson<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<Tenant>)> {
    require_superadmin(&session.user)?;

    if !req.terms_accepted {
        return Err(ApiError::BadRequest(TERMS_REQUIRED.to_string()));
    }

    let admin_id = state
        .identity
        .create_user(&req.admin_email, &req.admin_password)
        .await?;

    let created = create_tenant_with_admin(
        &mut session.tx,
        req.tenant,
        admin_id,
        &req.admin_email,
        session.user.user_id,
    )
    .await;

    let tenant = match created {
        Ok(tenant) => tenant,
        Err(e) => {
            if let Err(cleanup) = state.identity.delete_user(admin_id).await {
                warn!(user_id = %admin_id, error = %cleanup, "Could not remove orphaned identity account");
            }
            return Err(e);
        }
    };

    session.commit().await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

/// Get the caller's tenant (tenant admin)
pub async fn get_my_tenant(mut session: Session) -> ApiResult<Json<Tenant>> {
    require_tenant_admin(&mut session.tx, &session.user).await?;
    let tenant_id = session.tenant_id()?;

    let tenant = Tenant::find_by_id(&mut session.tx, tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tenant not found.".to_string()))?;

    session.commit().await?;
    Ok(Json(tenant))
}

/// Update the caller's tenant (tenant admin)
///
/// # Errors
///
/// - `403 Forbidden`: Not a tenant admin, or the request changes the slug
/// - `404 Not Found`: Tenant doesn't exist
pub async fn update_my_tenant(
    mut session: Session,
    ValidatedJson(req): ValidatedJson<UpdateTenantRequest>,
) -> ApiResult<Json<Tenant>> {
    require_tenant_admin(&mut session.tx, &session.user).await?;
    let tenant_id = session.tenant_id()?;

    if req.slug.is_some() && !session.user.is_superadmin {
        return Err(ApiError::Forbidden(
            "Tenant slug can only be changed by a superadmin.".to_string(),
        ));
    }

    let tenant = Tenant::update(&mut session.tx, tenant_id, req.into(), Some(session.user.user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Tenant not found.".to_string()))?;

    session.commit().await?;
    Ok(Json(tenant))
}
