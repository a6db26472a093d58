/// Dodo Payments subscription events
///
/// The tenant is found through the customer's email: the email belongs to a
/// user profile, and the profile to a tenant. An event older than the
/// tenant's current period end is stale and skipped.
///
/// | Event | Tenant change |
/// |---|---|
/// | `subscription.active`, `subscription.renewed` | plan by `product_id`, active, subscription id, period end |
/// | `subscription.on_hold`, `subscription.failed` | past_due |
/// | `subscription.cancelled`, `subscription.expired` | inactive |

use chrono::{DateTime, Utc};
use saaskit_shared::models::plan::Plan;
use saaskit_shared::models::tenant::{SubscriptionChange, SubscriptionStatus, Tenant};
use saaskit_shared::models::user::User;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use tracing::info;

use super::{parse_timestamp, WebhookError};

/// The fields of a Dodo event this service uses
#[derive(Debug, Clone, PartialEq)]
pub struct DodoEvent {
    pub event_type: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub subscription_id: Option<String>,
    pub customer_email: Option<String>,
    pub product_id: Option<String>,
    pub period_ends_at: Option<DateTime<Utc>>,
}

fn str_at<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
}

impl DodoEvent {
    /// Reads an event payload
    pub fn from_payload(payload: &JsonValue) -> Self {
        Self {
            event_type: str_at(payload, &["type"]).unwrap_or_default().to_string(),
            timestamp: str_at(payload, &["timestamp"]).and_then(parse_timestamp),
            subscription_id: str_at(payload, &["data", "subscription_id"]).map(str::to_string),
            customer_email: str_at(payload, &["data", "customer", "email"]).map(str::to_string),
            product_id: str_at(payload, &["data", "product_id"]).map(str::to_string),
            period_ends_at: str_at(payload, &["data", "period_ends_at"]).and_then(parse_timestamp),
        }
    }
}

/// Tenant change requested by an event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activate,
    PastDue,
    Inactive,
    Unhandled,
}

pub fn transition(event_type: &str) -> Transition {
    match event_type {
        "subscription.active" | "subscription.renewed" => Transition::Activate,
        "subscription.on_hold" | "subscription.failed" => Transition::PastDue,
        "subscription.cancelled" | "subscription.expired" => Transition::Inactive,
        _ => Transition::Unhandled,
    }
}

/// An event is stale when it predates the period end already stored
pub fn is_stale(event_time: Option<DateTime<Utc>>, period_ends_at: Option<DateTime<Utc>>) -> bool {
    matches!((event_time, period_ends_at), (Some(event), Some(end)) if event < end)
}

/// Applies an event to its tenant
///
/// Runs on a system transaction.
///
/// # Errors
///
/// `Business` when identifiers are missing or the tenant or plan can't be
/// found; `Database` on query failures.
pub async fn process_event(conn: &mut PgConnection, event_id: &str, payload: &JsonValue) -> Result<(), WebhookError> {
    let event = DodoEvent::from_payload(payload);
    info!(event_id, event_type = %event.event_type, "Processing Dodo webhook event");

    let (Some(subscription_id), Some(email)) = (event.subscription_id.clone(), event.customer_email.clone()) else {
        return Err(WebhookError::Business("Webhook missing key identifiers.".to_string()));
    };

    let tenant_not_found = || WebhookError::Business(format!("Tenant for email {} not found.", email));
    let user = User::find_by_email(conn, &email).await?.ok_or_else(tenant_not_found)?;
    let tenant = Tenant::find_by_id(conn, user.tenant_id)
        .await?
        .ok_or_else(tenant_not_found)?;

    if is_stale(event.timestamp, tenant.current_period_ends_at) {
        info!(
            event_id,
            tenant_id = %tenant.id,
            "Skipping stale Dodo webhook event"
        );
        return Ok(());
    }

    let change = match transition(&event.event_type) {
        Transition::Activate => {
            let product_id = event.product_id.clone().unwrap_or_default();
            let plan = Plan::find_by_external_product_id(conn, &product_id)
                .await?
                .ok_or_else(|| {
                    WebhookError::Business(format!("Plan with external_id {} not found.", product_id))
                })?;

            SubscriptionChange {
                plan_id: Some(Some(plan.id)),
                status: Some(SubscriptionStatus::Active),
                current_period_ends_at: event.period_ends_at,
                external_subscription_id: Some(subscription_id),
                ..Default::default()
            }
        }
        Transition::PastDue => SubscriptionChange {
            status: Some(SubscriptionStatus::PastDue),
            ..Default::default()
        },
        Transition::Inactive => SubscriptionChange {
            status: Some(SubscriptionStatus::Inactive),
            ..Default::default()
        },
        Transition::Unhandled => {
            info!(event_id, event_type = %event.event_type, "Unhandled Dodo event type");
            return Ok(());
        }
    };

    Tenant::update_subscription(conn, tenant.id, change).await?;
    info!(
        event_id,
        tenant_id = %tenant.id,
        event_type = %event.event_type,
        "Tenant subscription updated from Dodo event"
    );

    Ok(())
}
