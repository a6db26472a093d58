/// Superadmin tenant administration
///
/// # Endpoints
///
/// - `GET /api/v1/superadmin/tenants` - List all tenants
/// - `GET /api/v1/superadmin/tenants/:tenant_id` - Get a tenant
/// - `PUT /api/v1/superadmin/tenants/:tenant_id` - Update a tenant, slug included
/// - `DELETE /api/v1/superadmin/tenants/:tenant_id` - Delete a tenant and its data
/// - `POST /api/v1/superadmin/tenants/:tenant_id/assign-plan` - Assign a plan manually

use crate::{
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::{Session, ValidatedJson},
    routes::{tenants::UpdateTenantRequest, Pagination},
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};
use saaskit_shared::{
    auth::authorization::require_superadmin,
    models::{
        plan::Plan,
        tenant::{SubscriptionChange, SubscriptionStatus, Tenant},
    },
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Manual plan assignment
#[derive(Debug, Deserialize, Validate)]
pub struct AssignPlanRequest {
    pub plan_id: Uuid,

    /// One of `active`, `trialing`, `inactive`, `past_due`
    pub subscription_status: String,
}

impl AssignPlanRequest {
    fn status(&self) -> ApiResult<SubscriptionStatus> {
        SubscriptionStatus::from_str(&self.subscription_status)
            .filter(SubscriptionStatus::is_assignable)
            .ok_or_else(|| {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: "subscription_status".to_string(),
                    message: "Status must be one of active, trialing, inactive, past_due".to_string(),
                }])
            })
    }
}

fn tenant_not_found() -> ApiError {
    ApiError::NotFound("Tenant not found.".to_string())
}

pub async fn list_tenants(
    mut session: Session,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Tenant>>> {
    let page = page.checked()?;
    require_superadmin(&session.user)?;

    let tenants = Tenant::list(&mut session.tx, page.skip, page.limit).await?;
    session.commit().await?;
    Ok(Json(tenants))
}

pub async fn get_tenant(mut session: Session, Path(tenant_id): Path<Uuid>) -> ApiResult<Json<Tenant>> {
    require_superadmin(&session.user)?;

    let tenant = Tenant::find_by_id(&mut session.tx, tenant_id)
        .await?
        .ok_or_else(tenant_not_found)?;

    session.commit().await?;
    Ok(Json(tenant))
}

/// Update any tenant
///
/// # Errors
///
/// - `404 Not Found`: Tenant doesn't exist
/// - `409 Conflict`: New slug is taken
pub async fn update_tenant(
    mut session: Session,
    Path(tenant_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTenantRequest>,
) -> ApiResult<Json<Tenant>> {
    require_superadmin(&session.user)?;

    let tenant = Tenant::update(&mut session.tx, tenant_id, req.into(), Some(session.user.user_id))
        .await?
        .ok_or_else(tenant_not_found)?;

    session.commit().await?;
    Ok(Json(tenant))
}

/// Delete a tenant
///
/// Users, roles, items, customers, custom objects, records, API keys and
/// audit logs of the tenant go with it.
pub async fn delete_tenant(mut session: Session, Path(tenant_id): Path<Uuid>) -> ApiResult<StatusCode> {
    require_superadmin(&session.user)?;

    if !Tenant::delete(&mut session.tx, tenant_id).await? {
        return Err(tenant_not_found());
    }

    let deleted_by = session.user.user_id;
    session.commit().await?;
    info!(tenant_id = %tenant_id, deleted_by = %deleted_by, "Tenant deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Assign a plan and status without going through a payment provider
///
/// # Example
///
/// ```text
/// POST /api/v1/superadmin/tenants/{id}/assign-plan
/// {"plan_id": "uuid", "subscription_status": "trialing"}
/// ```
///
/// # Errors
///
/// - `404 Not Found`: Tenant or plan doesn't exist
/// - `422 Unprocessable Entity`: Status isn't assignable
pub async fn assign_plan(
    mut session: Session,
    Path(tenant_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AssignPlanRequest>,
) -> ApiResult<Json<Tenant>> {
    require_superadmin(&session.user)?;
    let status = req.status()?;

    Plan::find_by_id(&mut session.tx, req.plan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Plan not found.".to_string()))?;

    let tenant = Tenant::update_subscription(
        &mut session.tx,
        tenant_id,
        SubscriptionChange {
            plan_id: Some(Some(req.plan_id)),
            status: Some(status),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(tenant_not_found)?;

    session.commit().await?;
    info!(
        tenant_id = %tenant_id,
        plan_id = %req.plan_id,
        status = status.as_str(),
        "Plan assigned manually"
    );

    Ok(Json(tenant))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(status: &str) -> AssignPlanRequest {
        AssignPlanRequest {
            plan_id: Uuid::new_v4(),
            subscription_status: status.to_string(),
        }
    }

    #[test]
    fn test_assignable_statuses() {
        for status in ["active", "trialing", "inactive", "past_due"] {
            assert_eq!(assign(status).status().unwrap().as_str(), status);
        }
    }

    #[test]
    fn test_rejected_statuses() {
        assert!(assign("canceled").status().is_err());
        assert!(assign("paused").status().is_err());
        assert!(assign("ACTIVE").status().is_err());
    }
}
