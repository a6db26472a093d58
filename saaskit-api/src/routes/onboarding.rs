/// Self-service onboarding
///
/// A freshly signed-up user has an identity-provider account but no profile.
/// Onboarding creates their tenant and makes them its admin.
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/onboarding/tenant
/// Authorization: Bearer <access_token>
///
/// { "name": "Acme", "slug": "acme", "terms_accepted": true }
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{TokenIdentity, ValidatedJson},
    routes::tenants::{create_tenant_with_admin, NewTenant, TERMS_REQUIRED},
};
use axum::{extract::State, http::StatusCode, Json};
use saaskit_shared::{db::session::begin_system, models::tenant::Tenant, models::user::User};
use serde::Deserialize;
use validator::Validate;

/// Onboarding request
#[derive(Debug, Deserialize, Validate)]
pub struct OnboardTenantRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub tenant: NewTenant,

    pub terms_accepted: bool,
}

/// Create the caller's first tenant
///
/// Runs on a system session: the caller has no tenant for RLS to scope to.
///
/// # Errors
///
/// - `400 Bad Request`: Terms not accepted, token without email, or the user already has a profile
/// - `401 Unauthorized`: Missing or invalid access token (API keys are refused)
/// - `409 Conflict`: Slug already taken
pub async fn onboard_tenant(
    State(state): State<AppState>,
    identity: TokenIdentity,
    ValidatedJson(req): ValidatedJson<OnboardTenantRequest>,
) -> ApiResult<(StatusCode, Json<Tenant>)> {
    if !req.terms_accepted {
        return Err(ApiError::BadRequest(TERMS_REQUIRED.to_string()));
    }

    let email = identity
        .email
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Access token does not carry an email address.".to_string()))?;

    let mut tx = begin_system(&state.db).await?;

    if User::find_by_id(&mut tx, identity.user_id).await?.is_some() {
        return Err(ApiError::BadRequest("User has already completed onboarding.".to_string()));
    }

    let tenant = create_tenant_with_admin(&mut tx, req.tenant, identity.user_id, email, identity.user_id).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(tenant)))
}
