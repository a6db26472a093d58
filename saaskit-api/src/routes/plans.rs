/// Plan catalogue management (superadmin)
///
/// # Endpoints
///
/// - `GET /api/v1/plans` - All plans, active or not, with entitlements
/// - `POST /api/v1/plans` - Create a plan
/// - `PUT /api/v1/plans/:plan_id` - Update a plan
/// - `POST /api/v1/plans/:plan_id/entitlements` - Add an entitlement
/// - `DELETE /api/v1/plans/entitlements/:entitlement_id` - Remove an entitlement

use crate::{
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::{Session, ValidatedJson},
};
use axum::{extract::Path, http::StatusCode, Json};
use saaskit_shared::{
    auth::authorization::require_superadmin,
    models::plan::{CreatePlan, EntitlementType, Plan, PlanEntitlement, UpdatePlan},
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Plan create request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[serde(default = "default_active")]
    pub is_active: bool,

    /// Dodo product id
    pub external_product_id: Option<String>,

    /// Stripe price id
    pub external_price_id: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Plan update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub is_active: Option<bool>,

    pub external_product_id: Option<String>,

    pub external_price_id: Option<String>,
}

/// Entitlement create request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntitlementRequest {
    #[validate(length(min = 1, max = 100, message = "Feature slug must be 1-100 characters"))]
    pub feature_slug: String,

    /// `FLAG`, `LIMIT` or `METER`
    pub entitlement_type: String,

    #[validate(range(min = 0, message = "Value must be non-negative"))]
    pub value: i32,
}

impl CreateEntitlementRequest {
    fn kind(&self) -> ApiResult<EntitlementType> {
        EntitlementType::from_str(&self.entitlement_type).ok_or_else(|| {
            ApiError::ValidationError(vec![ValidationErrorDetail {
                field: "entitlement_type".to_string(),
                message: format!(
                    "Unknown entitlement type '{}' (expected FLAG, LIMIT or METER)",
                    self.entitlement_type
                ),
            }])
        })
    }
}

/// Plan with the entitlements it grants
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    #[serde(flatten)]
    pub plan: Plan,

    pub entitlements: Vec<PlanEntitlement>,
}

/// Attaches entitlements to plans with a single query
pub(crate) async fn with_entitlements(
    conn: &mut PgConnection,
    plans: Vec<Plan>,
) -> Result<Vec<PlanResponse>, sqlx::Error> {
    let ids: Vec<Uuid> = plans.iter().map(|p| p.id).collect();

    let mut by_plan: HashMap<Uuid, Vec<PlanEntitlement>> = HashMap::new();
    for entitlement in PlanEntitlement::list_for_plans(conn, &ids).await? {
        by_plan.entry(entitlement.plan_id).or_default().push(entitlement);
    }

    Ok(plans
        .into_iter()
        .map(|plan| PlanResponse {
            entitlements: by_plan.remove(&plan.id).unwrap_or_default(),
            plan,
        })
        .collect())
}

fn plan_not_found() -> ApiError {
    ApiError::NotFound("Plan not found.".to_string())
}

pub async fn list_plans(mut session: Session) -> ApiResult<Json<Vec<PlanResponse>>> {
    require_superadmin(&session.user)?;

    let plans = Plan::list(&mut session.tx, false).await?;
    let plans = with_entitlements(&mut session.tx, plans).await?;

    session.commit().await?;
    Ok(Json(plans))
}

/// Create a plan
///
/// # Errors
///
/// - `409 Conflict`: Plan name already exists
pub async fn create_plan(
    mut session: Session,
    ValidatedJson(req): ValidatedJson<CreatePlanRequest>,
) -> ApiResult<(StatusCode, Json<Plan>)> {
    require_superadmin(&session.user)?;

    let plan = Plan::create(
        &mut session.tx,
        CreatePlan {
            name: req.name,
            is_active: req.is_active,
            external_product_id: req.external_product_id,
            external_price_id: req.external_price_id,
        },
    )
    .await?;

    session.commit().await?;
    info!(plan_id = %plan.id, name = %plan.name, "Plan created");

    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_plan(
    mut session: Session,
    Path(plan_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePlanRequest>,
) -> ApiResult<Json<Plan>> {
    require_superadmin(&session.user)?;

    let plan = Plan::update(
        &mut session.tx,
        plan_id,
        UpdatePlan {
            name: req.name,
            is_active: req.is_active,
            external_product_id: req.external_product_id,
            external_price_id: req.external_price_id,
        },
    )
    .await?
    .ok_or_else(plan_not_found)?;

    session.commit().await?;
    Ok(Json(plan))
}

/// Add an entitlement to a plan
///
/// # Errors
///
/// - `404 Not Found`: Plan doesn't exist
/// - `409 Conflict`: The plan already has this feature slug
/// - `422 Unprocessable Entity`: Unknown entitlement type
pub async fn create_entitlement(
    mut session: Session,
    Path(plan_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateEntitlementRequest>,
) -> ApiResult<(StatusCode, Json<PlanEntitlement>)> {
    require_superadmin(&session.user)?;
    let kind = req.kind()?;

    Plan::find_by_id(&mut session.tx, plan_id)
        .await?
        .ok_or_else(plan_not_found)?;

    let entitlement =
        PlanEntitlement::create(&mut session.tx, plan_id, &req.feature_slug, kind, req.value).await?;

    session.commit().await?;
    info!(
        plan_id = %plan_id,
        feature_slug = %entitlement.feature_slug,
        entitlement_type = kind.as_str(),
        "Entitlement added"
    );

    Ok((StatusCode::CREATED, Json(entitlement)))
}

pub async fn delete_entitlement(
    mut session: Session,
    Path(entitlement_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_superadmin(&session.user)?;

    if !PlanEntitlement::delete(&mut session.tx, entitlement_id).await? {
        return Err(ApiError::NotFound("Entitlement not found.".to_string()));
    }

    session.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entitlement(kind: &str, value: i32) -> CreateEntitlementRequest {
        CreateEntitlementRequest {
            feature_slug: "api_calls".to_string(),
            entitlement_type: kind.to_string(),
            value,
        }
    }

    #[test]
    fn test_entitlement_type_parsing() {
        assert_eq!(entitlement("METER", 1000).kind().unwrap(), EntitlementType::Meter);
        assert_eq!(entitlement("FLAG", 1).kind().unwrap(), EntitlementType::Flag);
        assert!(matches!(
            entitlement("meter", 1000).kind(),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_negative_value_rejected() {
        assert!(entitlement("LIMIT", -1).validate().is_err());
        assert!(entitlement("LIMIT", 0).validate().is_ok());
    }

    #[test]
    fn test_plan_defaults_to_active() {
        let req: CreatePlanRequest = serde_json::from_str(r#"{"name": "Pro"}"#).unwrap();
        assert!(req.is_active);
        assert!(req.external_price_id.is_none());
    }
}
