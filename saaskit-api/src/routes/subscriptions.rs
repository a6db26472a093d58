/// Subscription endpoints for tenant admins
///
/// # Endpoints
///
/// - `GET /api/v1/subscriptions/me` - Current plan, status and metered usage
/// - `POST /api/v1/subscriptions/checkout-session` - Start a hosted checkout
/// - `POST /api/v1/subscriptions/customer-portal-session?return_url=...` - Open the billing portal

use crate::{
    app::AppState,
    config::GatewayKind,
    error::{ApiError, ApiResult},
    extract::{Session, ValidatedJson},
    services::payments::CheckoutRequest,
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use saaskit_shared::{
    auth::authorization::require_tenant_admin,
    entitlements::current_usage,
    models::{
        billing::CheckoutSession,
        plan::{EntitlementType, Plan, PlanEntitlement},
        tenant::Tenant,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Usage of one metered feature in the current window
#[derive(Debug, Serialize)]
pub struct MeterUsage {
    pub feature_slug: String,
    pub used: i64,
    pub limit: i32,
}

/// The tenant's subscription
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub plan: Plan,
    pub subscription_status: String,
    pub current_period_ends_at: Option<DateTime<Utc>>,
    pub entitlements: Vec<PlanEntitlement>,
    pub usage: Vec<MeterUsage>,

    /// Live subscription object from the payment provider
    pub payment_provider_data: Option<JsonValue>,
}

/// Checkout request
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutSessionRequest {
    pub plan_id: Uuid,

    #[validate(url(message = "success_url must be a valid URL"))]
    pub success_url: String,

    #[validate(url(message = "cancel_url must be a valid URL"))]
    pub cancel_url: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PortalQuery {
    pub return_url: String,
}

#[derive(Debug, Serialize)]
pub struct PortalSessionResponse {
    pub portal_url: String,
}

async fn current_tenant(session: &mut Session) -> ApiResult<Tenant> {
    let tenant_id = session.tenant_id()?;
    Tenant::find_by_id(&mut session.tx, tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tenant not found.".to_string()))
}

/// Get the caller's subscription
///
/// Provider data is best effort: if the provider can't be reached the
/// response carries `payment_provider_data: null`.
///
/// # Errors
///
/// - `404 Not Found`: The tenant has no plan
pub async fn get_my_subscription(
    State(state): State<AppState>,
    mut session: Session,
) -> ApiResult<Json<SubscriptionResponse>> {
    require_tenant_admin(&mut session.tx, &session.user).await?;

    let tenant = current_tenant(&mut session).await?;
    let no_plan = || ApiError::NotFound("No active subscription plan found for this tenant.".to_string());
    let plan_id = tenant.plan_id.ok_or_else(no_plan)?;
    let plan = Plan::find_by_id(&mut session.tx, plan_id).await?.ok_or_else(no_plan)?;

    let entitlements = PlanEntitlement::list_for_plan(&mut session.tx, plan.id).await?;

    let mut usage = Vec::new();
    for entitlement in entitlements
        .iter()
        .filter(|e| e.kind() == Some(EntitlementType::Meter))
    {
        let used = current_usage(
            &mut session.tx,
            tenant.id,
            &entitlement.feature_slug,
            tenant.current_period_ends_at,
        )
        .await?;
        usage.push(MeterUsage {
            feature_slug: entitlement.feature_slug.clone(),
            used,
            limit: entitlement.value,
        });
    }

    session.commit().await?;

    let payment_provider_data = match tenant.external_subscription_id.as_deref() {
        Some(subscription_id) => match state.payments.subscription_details(subscription_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(tenant_id = %tenant.id, error = %e, "Could not fetch subscription from provider");
                None
            }
        },
        None => None,
    };

    Ok(Json(SubscriptionResponse {
        plan,
        subscription_status: tenant.subscription_status,
        current_period_ends_at: tenant.current_period_ends_at,
        entitlements,
        usage,
        payment_provider_data,
    }))
}

/// Start a hosted checkout for a plan
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/subscriptions/checkout-session
/// {"plan_id": "uuid", "success_url": "https://...", "cancel_url": "https://..."}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Plan isn't configured for the active provider
/// - `404 Not Found`: Plan doesn't exist
/// - `503 Service Unavailable`: Provider rejected the checkout
pub async fn create_checkout_session(
    State(state): State<AppState>,
    mut session: Session,
    ValidatedJson(req): ValidatedJson<CheckoutSessionRequest>,
) -> ApiResult<Json<CheckoutSessionResponse>> {
    require_tenant_admin(&mut session.tx, &session.user).await?;
    let tenant_id = session.tenant_id()?;

    let plan = Plan::find_by_id(&mut session.tx, req.plan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Plan not found.".to_string()))?;

    let plan_reference = state.payments.plan_reference(&plan).ok_or_else(|| {
        ApiError::BadRequest(
            match state.payments.kind() {
                GatewayKind::Stripe => "Plan is not configured for Stripe (missing price ID).",
                GatewayKind::Dodo => "Plan is not configured for Dodo (missing product ID).",
            }
            .to_string(),
        )
    })?;

    let checkout = state
        .payments
        .create_checkout(CheckoutRequest {
            plan_reference,
            success_url: &req.success_url,
            cancel_url: &req.cancel_url,
            customer_email: session.user.email.as_deref(),
            tenant_id,
            user_id: session.user.user_id,
        })
        .await
        .map_err(|e| {
            error!(tenant_id = %tenant_id, plan_id = %plan.id, error = %e, "Checkout creation failed");
            ApiError::ServiceUnavailable(
                "Could not create a checkout session with the payment provider.".to_string(),
            )
        })?;

    CheckoutSession::create_pending(&mut session.tx, &checkout.session_id, tenant_id, plan.id).await?;
    session.commit().await?;

    info!(
        tenant_id = %tenant_id,
        plan_id = %plan.id,
        session_id = %checkout.session_id,
        "Checkout session created"
    );

    Ok(Json(CheckoutSessionResponse {
        checkout_url: checkout.checkout_url,
    }))
}

/// Open the provider's self-service billing portal
///
/// # Errors
///
/// - `400 Bad Request`: Tenant has no Stripe customer id
/// - `501 Not Implemented`: Active provider is Dodo Payments
pub async fn create_customer_portal_session(
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<PortalQuery>,
) -> ApiResult<Json<PortalSessionResponse>> {
    require_tenant_admin(&mut session.tx, &session.user).await?;

    if state.payments.kind() == GatewayKind::Dodo {
        return Err(ApiError::NotImplemented(
            "Customer portal not implemented for Dodo Payments yet.".to_string(),
        ));
    }

    let tenant = current_tenant(&mut session).await?;
    session.commit().await?;

    let customer_id = tenant
        .external_customer_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Tenant is not a paying customer with Stripe.".to_string()))?;

    let portal_url = state
        .payments
        .create_portal_session(customer_id, &query.return_url)
        .await?;

    Ok(Json(PortalSessionResponse { portal_url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_urls_validated() {
        let req = CheckoutSessionRequest {
            plan_id: Uuid::new_v4(),
            success_url: "https://app.example.com/billing/success".to_string(),
            cancel_url: "not a url".to_string(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("cancel_url"));
        assert!(!errors.field_errors().contains_key("success_url"));
    }
}
